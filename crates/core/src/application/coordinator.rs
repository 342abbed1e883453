// Rubix Coordinator - ticket issuance and wait-list membership
//
// Locking layout:
// - `epoch` (RwLock) guards the identity of the current generation of state.
//   Ticket issuance and wait-list mutation hold it shared; `reset` swaps in a
//   fresh generation under the exclusive lock, so no caller can observe a
//   counter from one generation next to wait lists from another.
// - `Epoch::wait_lists` (RwLock) guards map membership only; first use of a
//   queue id upgrades to the write lock and re-checks, so racing callers
//   always share one WaitList.
// - Each WaitList has its own lock; unrelated queues never contend.

use super::worker::constants::{DEFAULT_PUBLISH_TIMEOUT, FIRST_TICKET_SEQUENCE, SMS_TASK_QUEUE};
use super::worker::ShutdownToken;
use crate::domain::{CounterId, NotificationMessage, QueueId, Ticket, WaitEntry, WaitList};
use crate::error::{AppError, Result};
use crate::port::ticket_letter::RandomLetterProvider;
use crate::port::{NotificationWorker, PublishError, Publisher, TicketLetterProvider};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Coordinator settings
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Broker queue notifications are published to
    pub notification_queue: String,
    /// Bound on each publish from the request path
    pub publish_timeout: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            notification_queue: SMS_TASK_QUEUE.to_string(),
            publish_timeout: DEFAULT_PUBLISH_TIMEOUT,
        }
    }
}

/// One generation of coordinator state, replaced wholesale on reset
struct Epoch {
    wait_lists: RwLock<HashMap<QueueId, Arc<WaitList>>>,
    next_ticket_sequence: AtomicU64,
}

impl Epoch {
    fn new(queue_ids: impl IntoIterator<Item = QueueId>) -> Self {
        let wait_lists = queue_ids
            .into_iter()
            .map(|id| (id, Arc::new(WaitList::new())))
            .collect();
        Self {
            wait_lists: RwLock::new(wait_lists),
            next_ticket_sequence: AtomicU64::new(FIRST_TICKET_SEQUENCE),
        }
    }

    fn find(&self, queue_id: QueueId) -> Option<Arc<WaitList>> {
        read(&self.wait_lists).get(&queue_id).cloned()
    }

    fn get_or_create(&self, queue_id: QueueId) -> Arc<WaitList> {
        if let Some(wait_list) = self.find(queue_id) {
            return wait_list;
        }
        let mut wait_lists = write(&self.wait_lists);
        Arc::clone(wait_lists.entry(queue_id).or_insert_with(|| {
            info!(queue_id, "Creating wait list for new queue");
            Arc::new(WaitList::new())
        }))
    }
}

/// Single authority over tickets and wait lists
///
/// Owned once by the composition root and shared behind an `Arc`.
pub struct Rubix {
    epoch: RwLock<Arc<Epoch>>,
    publisher: Arc<dyn Publisher>,
    letters: Arc<dyn TicketLetterProvider>,
    config: CoordinatorConfig,
    worker_registered: AtomicBool,
}

impl Rubix {
    pub fn new(
        publisher: Arc<dyn Publisher>,
        letters: Arc<dyn TicketLetterProvider>,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            epoch: RwLock::new(Arc::new(Epoch::new([]))),
            publisher,
            letters,
            config,
            worker_registered: AtomicBool::new(false),
        }
    }

    /// Coordinator with random ticket letters and default settings
    pub fn with_publisher(publisher: Arc<dyn Publisher>) -> Self {
        Self::new(
            publisher,
            Arc::new(RandomLetterProvider),
            CoordinatorConfig::default(),
        )
    }

    /// Create empty wait lists for queues known at startup
    ///
    /// Existing wait lists are left untouched.
    pub fn preload_queues(&self, queue_ids: impl IntoIterator<Item = QueueId>) {
        let epoch = read(&self.epoch);
        let mut created = 0usize;
        let mut wait_lists = write(&epoch.wait_lists);
        for queue_id in queue_ids {
            wait_lists.entry(queue_id).or_insert_with(|| {
                created += 1;
                Arc::new(WaitList::new())
            });
        }
        info!(created, total = wait_lists.len(), "Preloaded wait lists");
    }

    /// Issue the next ticket
    ///
    /// Sequence numbers are global across queues, strictly increasing and
    /// gap-free within one generation.
    pub fn generate_ticket(&self) -> Ticket {
        let epoch = read(&self.epoch);
        let sequence = epoch.next_ticket_sequence.fetch_add(1, Ordering::SeqCst);
        Ticket::new(self.letters.next_letter(), sequence)
    }

    /// Publish the "ticket issued" SMS, then queue the customer
    ///
    /// A customer is never queued without a publish attempt: when the
    /// publish fails or times out the wait list is left unchanged and the
    /// error is returned. No internal retry.
    ///
    /// The wait list is picked after the publish, so a call overlapping a
    /// `reset` queues its ticket into the new generation, next to tickets
    /// renumbered from 1.
    pub async fn add_customer_to_wait_list(
        &self,
        queue_id: QueueId,
        recipient: &str,
        ticket: &str,
    ) -> Result<()> {
        let message = NotificationMessage::ticket_issued(recipient, ticket)?;
        self.publish(&message).await?;

        let epoch = read(&self.epoch);
        let wait_list = epoch.get_or_create(queue_id);
        wait_list.enqueue(WaitEntry::new(recipient, ticket));

        info!(
            queue_id,
            ticket,
            recipient,
            waiting = wait_list.size(),
            "Customer added to wait list"
        );
        Ok(())
    }

    /// Pop the head of the queue's wait list for service at `counter_id`
    ///
    /// The returned entry identifies the served customer (its ticket is
    /// unique). Sends no SMS itself.
    pub fn notify_next_customer(&self, queue_id: QueueId, counter_id: CounterId) -> Result<WaitEntry> {
        let epoch = read(&self.epoch);
        let entry = epoch
            .find(queue_id)
            .and_then(|wait_list| wait_list.dequeue())
            .ok_or(AppError::EmptyQueue { queue_id })?;

        info!(
            queue_id,
            counter_id,
            ticket = %entry.ticket,
            "Customer called to counter"
        );
        Ok(entry)
    }

    /// Drop every wait list and restart ticket numbering at 1
    ///
    /// Queue ids known before the reset keep an (empty) wait list.
    pub fn reset(&self) {
        let mut epoch = write(&self.epoch);
        let queue_ids: Vec<QueueId> = read(&epoch.wait_lists).keys().copied().collect();
        let discarded: usize = read(&epoch.wait_lists).values().map(|w| w.size()).sum();
        *epoch = Arc::new(Epoch::new(queue_ids));

        info!(
            discarded_customers = discarded,
            next_ticket_sequence = FIRST_TICKET_SEQUENCE,
            "Application state reset"
        );
    }

    /// Start the worker's consume loop on the notification queue
    ///
    /// At most once per coordinator; later calls fail with
    /// `WorkerAlreadyRegistered`. Must be called inside a Tokio runtime.
    pub fn register_notification_worker(
        &self,
        worker: Arc<dyn NotificationWorker>,
        shutdown: ShutdownToken,
    ) -> Result<JoinHandle<()>> {
        if self
            .worker_registered
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("Notification worker registration attempted twice");
            return Err(AppError::WorkerAlreadyRegistered);
        }

        let queue_name = self.config.notification_queue.clone();
        info!(queue_name = %queue_name, "Registering notification worker");

        Ok(tokio::spawn(async move {
            if let Err(e) = worker.run(&queue_name, shutdown).await {
                error!(error = %e, queue_name = %queue_name, "Notification worker failed");
            }
        }))
    }

    /// Customers currently waiting on a queue (0 for unknown queues)
    pub fn wait_list_size(&self, queue_id: QueueId) -> usize {
        read(&self.epoch)
            .find(queue_id)
            .map_or(0, |wait_list| wait_list.size())
    }

    /// Waiting customers on a queue, head first
    pub fn waiting_customers(&self, queue_id: QueueId) -> Vec<WaitEntry> {
        read(&self.epoch)
            .find(queue_id)
            .map(|wait_list| wait_list.entries())
            .unwrap_or_default()
    }

    /// Queue ids that currently have a wait list, ascending
    pub fn queue_ids(&self) -> Vec<QueueId> {
        let epoch = read(&self.epoch);
        let mut ids: Vec<QueueId> = read(&epoch.wait_lists).keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Sequence number the next ticket will carry
    pub fn peek_next_ticket_sequence(&self) -> u64 {
        read(&self.epoch)
            .next_ticket_sequence
            .load(Ordering::SeqCst)
    }

    async fn publish(&self, message: &NotificationMessage) -> Result<()> {
        let payload = message.encode();
        let queue_name = &self.config.notification_queue;
        let timeout = self.config.publish_timeout;

        let outcome = tokio::time::timeout(timeout, self.publisher.publish(&payload, queue_name))
            .await
            .unwrap_or_else(|_| Err(PublishError::Timeout(timeout.as_millis() as u64)));

        outcome.map_err(|e| {
            error!(
                error = %e,
                queue_name = %queue_name,
                recipient = %message.recipient,
                "Failed publishing notification"
            );
            AppError::PublishFailure(e)
        })
    }
}

// Guarded sections never leave state half-updated, so poisoning is ignored.
fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}
