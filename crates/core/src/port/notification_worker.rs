// Notification Worker Port
// Background consumer registered once with the coordinator

use crate::application::worker::ShutdownToken;
use crate::error::Result;
use async_trait::async_trait;

/// Long-running consumer of the notification queue
///
/// `run` returns once `shutdown` fires or the broker ends the subscription.
#[async_trait]
pub trait NotificationWorker: Send + Sync {
    async fn run(&self, queue_name: &str, shutdown: ShutdownToken) -> Result<()>;
}
