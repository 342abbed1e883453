// Wait List Domain Model

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

/// A customer waiting on one queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitEntry {
    /// Phone number (MSISDN) notifications are sent to
    pub recipient: String,
    pub ticket: String,
}

impl WaitEntry {
    pub fn new(recipient: impl Into<String>, ticket: impl Into<String>) -> Self {
        Self {
            recipient: recipient.into(),
            ticket: ticket.into(),
        }
    }
}

/// FIFO of customers waiting on a single queue
///
/// Every wait list carries its own lock, so traffic on one queue never
/// contends with another. `len` mirrors the deque length and is only
/// written while the lock is held, which keeps `size`/`is_empty` lock-free.
#[derive(Debug, Default)]
pub struct WaitList {
    entries: Mutex<VecDeque<WaitEntry>>,
    len: AtomicUsize,
}

impl WaitList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry to the tail
    pub fn enqueue(&self, entry: WaitEntry) {
        let mut entries = self.lock();
        entries.push_back(entry);
        self.len.store(entries.len(), Ordering::Release);
    }

    /// Remove and return the head entry
    ///
    /// Returns `None` when nobody is waiting; callers translate that into
    /// their own "empty queue" condition. The list is left untouched.
    pub fn dequeue(&self) -> Option<WaitEntry> {
        let mut entries = self.lock();
        let head = entries.pop_front();
        self.len.store(entries.len(), Ordering::Release);
        head
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn size(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    /// Snapshot of the waiting entries, head first
    pub fn entries(&self) -> Vec<WaitEntry> {
        self.lock().iter().cloned().collect()
    }

    // A panic while holding the lock cannot leave the deque half-written,
    // so a poisoned lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, VecDeque<WaitEntry>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
