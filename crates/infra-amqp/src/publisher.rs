// RabbitMQ Publisher
// reason: lapin confirms + durable queues give the persistence guarantee the
// request path relies on (ADR-001)

use crate::connection::AmqpConnection;
use crate::durable_queue_options;
use async_trait::async_trait;
use lapin::options::{BasicPublishOptions, ConfirmSelectOptions};
use lapin::types::{FieldTable, ShortString};
use lapin::{BasicProperties, Channel};
use rubix_core::port::{PublishError, Publisher};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// AMQP delivery mode 2 = persistent (survives broker restart)
const PERSISTENT_DELIVERY_MODE: u8 = 2;

/// Properties for every notification payload
pub(crate) fn persistent_text_properties() -> BasicProperties {
    BasicProperties::default()
        .with_content_type(ShortString::from("text/plain"))
        .with_delivery_mode(PERSISTENT_DELIVERY_MODE)
}

/// Publishes notification payloads through the default exchange
///
/// Keeps one confirm-mode channel open and reopens it when the broker
/// closes it (e.g. after a failed declare).
pub struct AmqpPublisher {
    connection: AmqpConnection,
    channel: Mutex<Option<Channel>>,
}

impl AmqpPublisher {
    pub fn new(connection: AmqpConnection) -> Self {
        Self {
            connection,
            channel: Mutex::new(None),
        }
    }

    async fn channel(&self) -> Result<Channel, PublishError> {
        let mut slot = self.channel.lock().await;
        if let Some(channel) = slot.as_ref() {
            if channel.status().connected() {
                return Ok(channel.clone());
            }
            debug!("Publisher channel closed, reopening");
        }

        if !self.connection.is_connected() {
            return Err(PublishError::Connection(
                "broker connection is closed".to_string(),
            ));
        }

        let channel = self
            .connection
            .create_channel()
            .await
            .map_err(|e| PublishError::Channel(e.to_string()))?;
        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await
            .map_err(|e| PublishError::Channel(e.to_string()))?;

        *slot = Some(channel.clone());
        Ok(channel)
    }
}

#[async_trait]
impl Publisher for AmqpPublisher {
    async fn publish(&self, message: &str, queue_name: &str) -> Result<(), PublishError> {
        let channel = self.channel().await?;

        channel
            .queue_declare(queue_name, durable_queue_options(), FieldTable::default())
            .await
            .map_err(|e| PublishError::Declare {
                queue: queue_name.to_string(),
                reason: e.to_string(),
            })?;

        let confirmation = channel
            .basic_publish(
                "",
                queue_name,
                BasicPublishOptions::default(),
                message.as_bytes(),
                persistent_text_properties(),
            )
            .await
            .map_err(|e| PublishError::Rejected(e.to_string()))?
            .await
            .map_err(|e| PublishError::Rejected(e.to_string()))?;

        if confirmation.is_nack() {
            warn!(queue_name, "Broker negatively acknowledged publish");
            return Err(PublishError::Rejected("broker nacked message".to_string()));
        }

        debug!(queue_name, bytes = message.len(), "Notification published");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_properties_are_persistent_plain_text() {
        let props = persistent_text_properties();
        assert_eq!(*props.delivery_mode(), Some(2));
        assert_eq!(
            props.content_type().as_ref().map(|s| s.as_str()),
            Some("text/plain")
        );
    }

    #[test]
    fn test_queue_is_declared_durable() {
        let options = durable_queue_options();
        assert!(options.durable);
        assert!(!options.exclusive);
        assert!(!options.auto_delete);
        assert!(!options.passive);
    }
}
