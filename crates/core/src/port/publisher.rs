// Publisher Port (Interface)
// Hands encoded notification payloads to a durable broker queue

use async_trait::async_trait;
use thiserror::Error;

/// Publish errors
///
/// Every variant surfaces to callers as a single "publish failed" condition
/// (`AppError::PublishFailure`); the variant only refines the log line.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    #[error("Broker connection failed: {0}")]
    Connection(String),

    #[error("Channel open failed: {0}")]
    Channel(String),

    #[error("Queue declare failed for '{queue}': {reason}")]
    Declare { queue: String, reason: String },

    #[error("Publish rejected: {0}")]
    Rejected(String),

    #[error("Publish timed out after {0}ms")]
    Timeout(u64),
}

/// Broker publisher
///
/// Implementations must declare `queue_name` (durable) if absent and mark
/// the message persistent. No retries are attempted here.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, message: &str, queue_name: &str) -> Result<(), PublishError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Records every publish and optionally fails or stalls
    #[derive(Default)]
    pub struct RecordingPublisher {
        published: Arc<Mutex<Vec<(String, String)>>>,
        failure: Arc<Mutex<Option<PublishError>>>,
        delay: Option<Duration>,
    }

    impl RecordingPublisher {
        pub fn new() -> Self {
            Self::default()
        }

        /// Sleep before every publish (for timeout tests)
        pub fn with_delay(delay: Duration) -> Self {
            Self {
                delay: Some(delay),
                ..Self::default()
            }
        }

        pub fn set_failure(&self, error: Option<PublishError>) {
            *self.failure.lock().unwrap() = error;
        }

        /// `(queue_name, message)` pairs in publish order
        pub fn published(&self) -> Vec<(String, String)> {
            self.published.lock().unwrap().clone()
        }

        pub fn publish_count(&self) -> usize {
            self.published.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Publisher for RecordingPublisher {
        async fn publish(&self, message: &str, queue_name: &str) -> Result<(), PublishError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if let Some(err) = self.failure.lock().unwrap().clone() {
                return Err(err);
            }
            self.published
                .lock()
                .unwrap()
                .push((queue_name.to_string(), message.to_string()));
            Ok(())
        }
    }
}
