// Message Source Port
// Consumer side of the broker queue, with manual acknowledgment

use async_trait::async_trait;
use thiserror::Error;

/// Consumer errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConsumeError {
    #[error("Broker connection failed: {0}")]
    Connection(String),

    #[error("Channel open failed: {0}")]
    Channel(String),

    #[error("Subscribe to '{queue}' failed: {reason}")]
    Subscribe { queue: String, reason: String },

    #[error("Acknowledgment failed: {0}")]
    Ack(String),

    #[error("Delivery stream error: {0}")]
    Stream(String),
}

/// Opens subscriptions on broker queues
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Start consuming `queue_name` with auto-ack disabled
    async fn subscribe(&self, queue_name: &str) -> Result<Box<dyn Subscription>, ConsumeError>;
}

/// A live consumer on one queue
#[async_trait]
pub trait Subscription: Send {
    /// Wait for the next delivery
    ///
    /// Returns `None` once the broker has closed the subscription.
    async fn next_delivery(&mut self) -> Option<Result<Box<dyn Delivery>, ConsumeError>>;
}

/// One unacknowledged message
#[async_trait]
pub trait Delivery: Send + Sync {
    fn payload(&self) -> &[u8];

    /// Remove the message from the queue
    async fn ack(&self) -> Result<(), ConsumeError>;

    /// Negative-acknowledge; with `requeue` the broker redelivers it
    async fn nack(&self, requeue: bool) -> Result<(), ConsumeError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::port::publisher::{PublishError, Publisher};
    use std::collections::{HashMap, VecDeque};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::sync::Notify;

    #[derive(Default)]
    struct QueueState {
        ready: VecDeque<Vec<u8>>,
        unacked: usize,
    }

    #[derive(Default)]
    struct BrokerState {
        queues: HashMap<String, QueueState>,
        acked: Vec<Vec<u8>>,
        dropped: Vec<Vec<u8>>,
        requeued: usize,
        closed: bool,
    }

    #[derive(Default)]
    struct Inner {
        state: Mutex<BrokerState>,
        notify: Notify,
    }

    /// In-process broker implementing both `Publisher` and `MessageSource`
    ///
    /// Queues are declared on first publish or subscribe. Cloning shares
    /// the same broker.
    #[derive(Clone, Default)]
    pub struct InMemoryBroker {
        inner: Arc<Inner>,
    }

    impl InMemoryBroker {
        pub fn new() -> Self {
            Self::default()
        }

        /// Inject a raw payload, bypassing message encoding
        pub fn push_raw(&self, queue_name: &str, payload: impl Into<Vec<u8>>) {
            {
                let mut state = self.inner.state.lock().unwrap();
                state
                    .queues
                    .entry(queue_name.to_string())
                    .or_default()
                    .ready
                    .push_back(payload.into());
            }
            self.inner.notify.notify_waiters();
        }

        /// End every subscription (simulates the broker going away)
        pub fn close(&self) {
            self.inner.state.lock().unwrap().closed = true;
            self.inner.notify.notify_waiters();
        }

        pub fn is_declared(&self, queue_name: &str) -> bool {
            self.inner
                .state
                .lock()
                .unwrap()
                .queues
                .contains_key(queue_name)
        }

        pub fn ready_count(&self, queue_name: &str) -> usize {
            self.inner
                .state
                .lock()
                .unwrap()
                .queues
                .get(queue_name)
                .map_or(0, |q| q.ready.len())
        }

        pub fn unacked_count(&self, queue_name: &str) -> usize {
            self.inner
                .state
                .lock()
                .unwrap()
                .queues
                .get(queue_name)
                .map_or(0, |q| q.unacked)
        }

        /// Payloads acknowledged, in ack order
        pub fn acked(&self) -> Vec<String> {
            Self::as_strings(&self.inner.state.lock().unwrap().acked)
        }

        /// Payloads negative-acknowledged without requeue
        pub fn dropped(&self) -> Vec<String> {
            Self::as_strings(&self.inner.state.lock().unwrap().dropped)
        }

        pub fn requeued_count(&self) -> usize {
            self.inner.state.lock().unwrap().requeued
        }

        fn as_strings(payloads: &[Vec<u8>]) -> Vec<String> {
            payloads
                .iter()
                .map(|p| String::from_utf8_lossy(p).into_owned())
                .collect()
        }
    }

    #[async_trait]
    impl Publisher for InMemoryBroker {
        async fn publish(&self, message: &str, queue_name: &str) -> Result<(), PublishError> {
            if self.inner.state.lock().unwrap().closed {
                return Err(PublishError::Connection("broker closed".to_string()));
            }
            self.push_raw(queue_name, message.as_bytes().to_vec());
            Ok(())
        }
    }

    #[async_trait]
    impl MessageSource for InMemoryBroker {
        async fn subscribe(
            &self,
            queue_name: &str,
        ) -> Result<Box<dyn Subscription>, ConsumeError> {
            let mut state = self.inner.state.lock().unwrap();
            if state.closed {
                return Err(ConsumeError::Connection("broker closed".to_string()));
            }
            state.queues.entry(queue_name.to_string()).or_default();
            Ok(Box::new(InMemorySubscription {
                inner: Arc::clone(&self.inner),
                queue: queue_name.to_string(),
            }))
        }
    }

    struct InMemorySubscription {
        inner: Arc<Inner>,
        queue: String,
    }

    #[async_trait]
    impl Subscription for InMemorySubscription {
        async fn next_delivery(&mut self) -> Option<Result<Box<dyn Delivery>, ConsumeError>> {
            loop {
                // Registered before checking state so a concurrent publish
                // cannot slip between the check and the wait.
                let notified = self.inner.notify.notified();
                {
                    let mut state = self.inner.state.lock().unwrap();
                    if state.closed {
                        return None;
                    }
                    let queue = state.queues.entry(self.queue.clone()).or_default();
                    if let Some(payload) = queue.ready.pop_front() {
                        queue.unacked += 1;
                        return Some(Ok(Box::new(InMemoryDelivery {
                            inner: Arc::clone(&self.inner),
                            queue: self.queue.clone(),
                            payload,
                            settled: AtomicBool::new(false),
                        })));
                    }
                }
                notified.await;
            }
        }
    }

    struct InMemoryDelivery {
        inner: Arc<Inner>,
        queue: String,
        payload: Vec<u8>,
        settled: AtomicBool,
    }

    impl InMemoryDelivery {
        fn settle(&self) -> Result<(), ConsumeError> {
            if self.settled.swap(true, Ordering::SeqCst) {
                return Err(ConsumeError::Ack("delivery already settled".to_string()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl Delivery for InMemoryDelivery {
        fn payload(&self) -> &[u8] {
            &self.payload
        }

        async fn ack(&self) -> Result<(), ConsumeError> {
            self.settle()?;
            let mut state = self.inner.state.lock().unwrap();
            if let Some(queue) = state.queues.get_mut(&self.queue) {
                queue.unacked -= 1;
            }
            state.acked.push(self.payload.clone());
            Ok(())
        }

        async fn nack(&self, requeue: bool) -> Result<(), ConsumeError> {
            self.settle()?;
            {
                let mut state = self.inner.state.lock().unwrap();
                if requeue {
                    state.requeued += 1;
                } else {
                    state.dropped.push(self.payload.clone());
                }
                if let Some(queue) = state.queues.get_mut(&self.queue) {
                    queue.unacked -= 1;
                    if requeue {
                        queue.ready.push_front(self.payload.clone());
                    }
                }
            }
            if requeue {
                self.inner.notify.notify_waiters();
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mocks::InMemoryBroker;
    use super::*;
    use crate::port::Publisher;
    use std::time::Duration;

    #[tokio::test]
    async fn test_in_memory_broker_delivers_in_publish_order() {
        let broker = InMemoryBroker::new();
        broker.publish("+1#one", "sms").await.unwrap();
        broker.publish("+2#two", "sms").await.unwrap();

        let mut sub = broker.subscribe("sms").await.unwrap();
        let first = sub.next_delivery().await.unwrap().unwrap();
        let second = sub.next_delivery().await.unwrap().unwrap();
        assert_eq!(first.payload(), b"+1#one");
        assert_eq!(second.payload(), b"+2#two");
        assert_eq!(broker.unacked_count("sms"), 2);

        first.ack().await.unwrap();
        second.ack().await.unwrap();
        assert_eq!(broker.acked(), vec!["+1#one", "+2#two"]);
        assert_eq!(broker.unacked_count("sms"), 0);
    }

    #[tokio::test]
    async fn test_subscription_waits_for_publish() {
        let broker = InMemoryBroker::new();
        let mut sub = broker.subscribe("sms").await.unwrap();

        let publisher = broker.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            publisher.publish("+1#late", "sms").await.unwrap();
        });

        let delivery = tokio::time::timeout(Duration::from_secs(2), sub.next_delivery())
            .await
            .expect("delivery should arrive")
            .unwrap()
            .unwrap();
        assert_eq!(delivery.payload(), b"+1#late");
    }

    #[tokio::test]
    async fn test_nack_requeue_redelivers() {
        let broker = InMemoryBroker::new();
        broker.publish("+1#retry", "sms").await.unwrap();
        let mut sub = broker.subscribe("sms").await.unwrap();

        let delivery = sub.next_delivery().await.unwrap().unwrap();
        delivery.nack(true).await.unwrap();
        assert_eq!(broker.requeued_count(), 1);
        assert_eq!(broker.ready_count("sms"), 1);

        let again = sub.next_delivery().await.unwrap().unwrap();
        assert_eq!(again.payload(), b"+1#retry");
        assert!(again.ack().await.is_ok());
        assert!(again.ack().await.is_err());
    }

    #[tokio::test]
    async fn test_close_ends_subscription() {
        let broker = InMemoryBroker::new();
        let mut sub = broker.subscribe("sms").await.unwrap();
        broker.close();
        assert!(sub.next_delivery().await.is_none());
        assert!(broker.publish("+1#x", "sms").await.is_err());
    }
}
