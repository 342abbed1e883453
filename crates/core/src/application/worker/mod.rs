// SMS Worker - drains the notification queue and delivers through the gateway
//
// Delivery semantics are at-most-once by default: a message whose gateway
// call fails is still acknowledged and therefore lost after one attempt.
// `DeliveryFailurePolicy::Requeue` switches failed deliveries to a
// negative-ack with requeue instead, held back by `requeue_delay` so a
// message the gateway keeps refusing cannot spin the worker.

pub mod constants;
mod shutdown;

use constants::*;
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};

use crate::domain::NotificationMessage;
use crate::error::{AppError, Result};
use crate::port::{Delivery, GatewayCredentials, MessageSource, NotificationWorker, SmsGateway};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tokio::time::sleep;
use tracing::{error, info, warn};

/// What to do with a message whose gateway delivery failed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryFailurePolicy {
    /// Acknowledge and forget (at-most-once)
    #[default]
    Drop,
    /// Negative-ack with requeue so the broker redelivers
    Requeue,
}

impl FromStr for DeliveryFailurePolicy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "drop" => Ok(Self::Drop),
            "requeue" => Ok(Self::Requeue),
            other => Err(AppError::Config(format!(
                "unknown delivery failure policy '{}' (expected drop|requeue)",
                other
            ))),
        }
    }
}

/// Final state of one processed message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Gateway accepted the SMS; message acknowledged
    Delivered,
    /// Payload could not be decoded; acknowledged and dropped
    DroppedMalformed,
    /// Gateway failed; acknowledged and dropped under `Drop`
    DroppedAfterFailure,
    /// Gateway failed; returned to the queue under `Requeue`
    Requeued,
}

/// SMS worker settings
#[derive(Debug, Clone)]
pub struct SmsWorkerConfig {
    pub credentials: GatewayCredentials,
    pub failure_policy: DeliveryFailurePolicy,
    /// Maximum deliveries in flight (1 = strictly sequential)
    pub concurrency: usize,
    /// Pause before a failed delivery is handed back under `Requeue`
    pub requeue_delay: Duration,
}

impl SmsWorkerConfig {
    pub fn new(credentials: GatewayCredentials) -> Self {
        Self {
            credentials,
            failure_policy: DeliveryFailurePolicy::default(),
            concurrency: DEFAULT_WORKER_CONCURRENCY,
            requeue_delay: DEFAULT_REQUEUE_DELAY,
        }
    }
}

/// Consumes notification payloads and sends them as SMS
pub struct SmsWorker {
    source: Arc<dyn MessageSource>,
    gateway: Arc<dyn SmsGateway>,
    config: Arc<SmsWorkerConfig>,
}

impl SmsWorker {
    pub fn new(
        source: Arc<dyn MessageSource>,
        gateway: Arc<dyn SmsGateway>,
        config: SmsWorkerConfig,
    ) -> Self {
        Self {
            source,
            gateway,
            config: Arc::new(config),
        }
    }

    /// Decode, deliver and settle a single message
    ///
    /// Errors only when the broker refuses the ack/nack. A pending requeue
    /// delay is cut short by `shutdown`.
    pub async fn process_delivery(
        &self,
        delivery: Box<dyn Delivery>,
        shutdown: ShutdownToken,
    ) -> Result<DeliveryOutcome> {
        Self::process_static(&self.gateway, &self.config, delivery, shutdown).await
    }

    /// Static so spawned tasks need not clone the worker
    async fn process_static(
        gateway: &Arc<dyn SmsGateway>,
        config: &SmsWorkerConfig,
        delivery: Box<dyn Delivery>,
        mut shutdown: ShutdownToken,
    ) -> Result<DeliveryOutcome> {
        let message = match NotificationMessage::decode_bytes(delivery.payload()) {
            Ok(message) => message,
            Err(e) => {
                let err = AppError::MalformedMessage(e.to_string());
                error!(
                    error = %err,
                    payload = %String::from_utf8_lossy(delivery.payload()),
                    "Dropping malformed notification"
                );
                delivery.ack().await?;
                return Ok(DeliveryOutcome::DroppedMalformed);
            }
        };

        info!(recipient = %message.recipient, "Payload received, sending SMS");

        match gateway
            .send(&message.body, &message.recipient, &config.credentials)
            .await
        {
            Ok(()) => {
                delivery.ack().await?;
                info!(recipient = %message.recipient, "SMS delivered");
                Ok(DeliveryOutcome::Delivered)
            }
            Err(e) => match config.failure_policy {
                DeliveryFailurePolicy::Drop => {
                    let err = AppError::DeliveryFailure(e);
                    error!(
                        error = %err,
                        recipient = %message.recipient,
                        "Failed sending SMS, message dropped"
                    );
                    delivery.ack().await?;
                    Ok(DeliveryOutcome::DroppedAfterFailure)
                }
                DeliveryFailurePolicy::Requeue => {
                    warn!(
                        error = %e,
                        recipient = %message.recipient,
                        delay_ms = config.requeue_delay.as_millis() as u64,
                        "Failed sending SMS, requeueing"
                    );
                    tokio::select! {
                        _ = sleep(config.requeue_delay) => {}
                        _ = shutdown.wait() => {}
                    }
                    delivery.nack(true).await?;
                    Ok(DeliveryOutcome::Requeued)
                }
            },
        }
    }

    fn log_joined(joined: std::result::Result<Result<DeliveryOutcome>, JoinError>) {
        match joined {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => error!(error = %e, "Failed settling notification"),
            // The unsettled delivery is redelivered by the broker once the
            // channel closes.
            Err(join_err) if join_err.is_panic() => {
                error!("Delivery task panicked: {:?}", join_err)
            }
            Err(join_err) => warn!("Delivery task cancelled: {:?}", join_err),
        }
    }
}

#[async_trait]
impl NotificationWorker for SmsWorker {
    async fn run(&self, queue_name: &str, mut shutdown: ShutdownToken) -> Result<()> {
        let mut subscription = self.source.subscribe(queue_name).await?;
        let permits = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let mut in_flight: JoinSet<Result<DeliveryOutcome>> = JoinSet::new();

        info!(
            queue_name,
            concurrency = self.config.concurrency,
            failure_policy = ?self.config.failure_policy,
            "SMS worker started"
        );

        loop {
            tokio::select! {
                biased;
                _ = shutdown.wait() => {
                    info!(queue_name, "SMS worker shutting down");
                    break;
                }
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    Self::log_joined(joined);
                }
                permit = Arc::clone(&permits).acquire_owned() => {
                    let Ok(permit) = permit else { break };

                    let next = tokio::select! {
                        _ = shutdown.wait() => {
                            info!(queue_name, "SMS worker interrupted while idle");
                            break;
                        }
                        next = subscription.next_delivery() => next,
                    };

                    match next {
                        Some(Ok(delivery)) => {
                            let gateway = Arc::clone(&self.gateway);
                            let config = Arc::clone(&self.config);
                            let task_shutdown = shutdown.clone();
                            in_flight.spawn(async move {
                                let outcome =
                                    Self::process_static(&gateway, &config, delivery, task_shutdown).await;
                                drop(permit);
                                outcome
                            });
                        }
                        Some(Err(e)) => {
                            error!(error = %e, queue_name, "Failed receiving notification");
                            tokio::select! {
                                _ = sleep(ERROR_RECOVERY_SLEEP_DURATION) => {},
                                _ = shutdown.wait() => {
                                    info!("SMS worker interrupted during error recovery");
                                    break;
                                }
                            }
                        }
                        None => {
                            warn!(queue_name, "Broker closed the notification subscription");
                            break;
                        }
                    }
                }
            }
        }

        // Let in-flight deliveries settle so their acks are not lost
        let drain = async {
            while let Some(joined) = in_flight.join_next().await {
                Self::log_joined(joined);
            }
        };
        if tokio::time::timeout(GRACEFUL_SHUTDOWN_TIMEOUT, drain).await.is_err() {
            warn!(
                remaining = in_flight.len(),
                "In-flight deliveries did not finish before shutdown timeout"
            );
            in_flight.abort_all();
        }

        info!(queue_name, "SMS worker stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::message_source::mocks::InMemoryBroker;
    use crate::port::sms_gateway::mocks::{MockBehavior, MockSmsGateway};
    use crate::port::{DeliveryError, Publisher};

    const QUEUE: &str = "sms_test_queue";

    fn credentials() -> GatewayCredentials {
        GatewayCredentials::new("RUBIX", "bank", "secret")
    }

    fn worker(
        broker: &InMemoryBroker,
        gateway: Arc<MockSmsGateway>,
        policy: DeliveryFailurePolicy,
        concurrency: usize,
    ) -> SmsWorker {
        SmsWorker::new(
            Arc::new(broker.clone()),
            gateway,
            SmsWorkerConfig {
                credentials: credentials(),
                failure_policy: policy,
                concurrency,
                requeue_delay: Duration::from_millis(50),
            },
        )
    }

    async fn next(broker: &InMemoryBroker) -> Box<dyn Delivery> {
        broker
            .subscribe(QUEUE)
            .await
            .unwrap()
            .next_delivery()
            .await
            .unwrap()
            .unwrap()
    }

    /// Token whose sender lives for the rest of the test
    fn idle_token() -> ShutdownToken {
        let (tx, token) = shutdown_channel();
        std::mem::forget(tx);
        token
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !condition() {
                sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[test]
    fn test_failure_policy_parsing() {
        assert_eq!("drop".parse::<DeliveryFailurePolicy>().unwrap(), DeliveryFailurePolicy::Drop);
        assert_eq!(
            "REQUEUE".parse::<DeliveryFailurePolicy>().unwrap(),
            DeliveryFailurePolicy::Requeue
        );
        assert!("retry".parse::<DeliveryFailurePolicy>().is_err());
        assert_eq!(DeliveryFailurePolicy::default(), DeliveryFailurePolicy::Drop);
    }

    #[tokio::test]
    async fn test_successful_delivery_is_acked() {
        let broker = InMemoryBroker::new();
        let gateway = Arc::new(MockSmsGateway::new_success());
        let worker = worker(&broker, gateway.clone(), DeliveryFailurePolicy::Drop, 1);

        broker
            .publish("+233200000000#Ticket number A007. Kindly wait for your turn.", QUEUE)
            .await
            .unwrap();
        let outcome = worker.process_delivery(next(&broker).await, idle_token()).await.unwrap();

        assert_eq!(outcome, DeliveryOutcome::Delivered);
        let sent = gateway.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipient, "+233200000000");
        assert_eq!(sent[0].body, "Ticket number A007. Kindly wait for your turn.");
        assert_eq!(sent[0].sender_id, "RUBIX");
        assert_eq!(broker.acked().len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_payload_is_acked_and_dropped() {
        let broker = InMemoryBroker::new();
        let gateway = Arc::new(MockSmsGateway::new_success());
        let worker = worker(&broker, gateway.clone(), DeliveryFailurePolicy::Requeue, 1);

        broker.push_raw(QUEUE, "no delimiter here");
        let outcome = worker.process_delivery(next(&broker).await, idle_token()).await.unwrap();

        assert_eq!(outcome, DeliveryOutcome::DroppedMalformed);
        assert_eq!(gateway.call_count(), 0);
        assert_eq!(broker.acked(), vec!["no delimiter here"]);
        assert_eq!(broker.ready_count(QUEUE), 0);
    }

    #[tokio::test]
    async fn test_gateway_failure_is_acked_under_drop_policy() {
        let broker = InMemoryBroker::new();
        let gateway = Arc::new(MockSmsGateway::new(MockBehavior::Fail(
            DeliveryError::Timeout(30_000),
        )));
        let worker = worker(&broker, gateway.clone(), DeliveryFailurePolicy::Drop, 1);

        broker.publish("+1#hello", QUEUE).await.unwrap();
        let outcome = worker.process_delivery(next(&broker).await, idle_token()).await.unwrap();

        assert_eq!(outcome, DeliveryOutcome::DroppedAfterFailure);
        assert_eq!(gateway.call_count(), 1);
        assert_eq!(broker.acked(), vec!["+1#hello"]);
        assert_eq!(broker.ready_count(QUEUE), 0);
    }

    #[tokio::test]
    async fn test_gateway_failure_is_requeued_under_requeue_policy() {
        let broker = InMemoryBroker::new();
        let gateway = Arc::new(MockSmsGateway::new_fail("unreachable"));
        let worker = worker(&broker, gateway, DeliveryFailurePolicy::Requeue, 1);

        broker.publish("+1#hello", QUEUE).await.unwrap();
        let started = std::time::Instant::now();
        let outcome = worker.process_delivery(next(&broker).await, idle_token()).await.unwrap();

        assert_eq!(outcome, DeliveryOutcome::Requeued);
        assert!(started.elapsed() >= Duration::from_millis(50));
        assert!(broker.acked().is_empty());
        assert_eq!(broker.ready_count(QUEUE), 1);
    }

    #[tokio::test]
    async fn test_requeue_delay_bounds_redelivery_rate() {
        let broker = InMemoryBroker::new();
        let gateway = Arc::new(MockSmsGateway::new_fail("unreachable"));
        let worker = worker(&broker, gateway.clone(), DeliveryFailurePolicy::Requeue, 1);
        let (tx, token) = shutdown_channel();

        broker.publish("+1#hello", QUEUE).await.unwrap();
        let handle = tokio::spawn(async move { worker.run(QUEUE, token).await });
        sleep(Duration::from_millis(300)).await;
        tx.shutdown();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();

        // 50ms between attempts allows at most 7 in 300ms
        let attempts = gateway.call_count();
        assert!((2..=7).contains(&attempts), "attempts: {}", attempts);
        assert_eq!(broker.ready_count(QUEUE), 1);
        assert!(broker.acked().is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_cuts_requeue_delay_short() {
        let broker = InMemoryBroker::new();
        let gateway = Arc::new(MockSmsGateway::new_fail("unreachable"));
        let worker = SmsWorker::new(
            Arc::new(broker.clone()),
            gateway,
            SmsWorkerConfig {
                failure_policy: DeliveryFailurePolicy::Requeue,
                requeue_delay: Duration::from_secs(60),
                ..SmsWorkerConfig::new(credentials())
            },
        );
        let (tx, token) = shutdown_channel();

        broker.publish("+1#hello", QUEUE).await.unwrap();
        let delivery = next(&broker).await;
        let pending = tokio::spawn(async move { worker.process_delivery(delivery, token).await });
        sleep(Duration::from_millis(20)).await;
        tx.shutdown();

        let outcome = tokio::time::timeout(Duration::from_secs(2), pending)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(outcome, DeliveryOutcome::Requeued);
        assert_eq!(broker.ready_count(QUEUE), 1);
    }

    #[tokio::test]
    async fn test_run_drains_queue_until_shutdown() {
        let broker = InMemoryBroker::new();
        let gateway = Arc::new(MockSmsGateway::new_success());
        let worker = worker(&broker, gateway.clone(), DeliveryFailurePolicy::Drop, 1);
        let (tx, token) = shutdown_channel();

        let handle = tokio::spawn(async move { worker.run(QUEUE, token).await });

        for i in 0..5 {
            broker
                .publish(&format!("+{}#message {}", i, i), QUEUE)
                .await
                .unwrap();
        }
        wait_until(|| broker.acked().len() == 5).await;

        let recipients: Vec<_> = gateway.sent().into_iter().map(|s| s.recipient).collect();
        assert_eq!(recipients, vec!["+0", "+1", "+2", "+3", "+4"]);

        tx.shutdown();
        let result = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_run_returns_when_broker_closes() {
        let broker = InMemoryBroker::new();
        let worker = worker(
            &broker,
            Arc::new(MockSmsGateway::new_success()),
            DeliveryFailurePolicy::Drop,
            1,
        );
        let (_tx, token) = shutdown_channel();

        let handle = tokio::spawn(async move { worker.run(QUEUE, token).await });
        sleep(Duration::from_millis(20)).await;
        broker.close();

        let result = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_run_fails_when_subscribe_fails() {
        let broker = InMemoryBroker::new();
        broker.close();
        let worker = worker(
            &broker,
            Arc::new(MockSmsGateway::new_success()),
            DeliveryFailurePolicy::Drop,
            1,
        );
        let (_tx, token) = shutdown_channel();

        let result = worker.run(QUEUE, token).await;
        assert!(matches!(result, Err(AppError::Consume(_))));
    }

    #[tokio::test]
    async fn test_concurrent_deliveries_all_settle() {
        let broker = InMemoryBroker::new();
        let gateway = Arc::new(MockSmsGateway::new_success().with_latency(Duration::from_millis(20)));
        let worker = worker(&broker, gateway.clone(), DeliveryFailurePolicy::Drop, 4);
        let (tx, token) = shutdown_channel();

        for i in 0..12 {
            broker.publish(&format!("+{}#hi", i), QUEUE).await.unwrap();
        }
        let handle = tokio::spawn(async move { worker.run(QUEUE, token).await });

        wait_until(|| broker.acked().len() == 12).await;
        assert_eq!(gateway.sent().len(), 12);
        assert_eq!(broker.unacked_count(QUEUE), 0);

        tx.shutdown();
        handle.await.unwrap().unwrap();
    }
}
