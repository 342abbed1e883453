// RabbitMQ Consumer
// Manual-ack consumer feeding the SMS worker

use crate::connection::AmqpConnection;
use crate::durable_queue_options;
use async_trait::async_trait;
use futures::StreamExt;
use lapin::acker::Acker;
use lapin::options::{BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicQosOptions};
use lapin::types::FieldTable;
use lapin::{Channel, Consumer};
use rubix_core::port::{ConsumeError, Delivery, MessageSource, Subscription};
use tracing::info;

/// Consumer tag unique to this process and subscription
fn consumer_tag() -> String {
    format!("rubix-sms-worker-{}", uuid::Uuid::new_v4())
}

/// Opens dedicated channels for consuming
pub struct AmqpMessageSource {
    connection: AmqpConnection,
}

impl AmqpMessageSource {
    pub fn new(connection: AmqpConnection) -> Self {
        Self { connection }
    }
}

#[async_trait]
impl MessageSource for AmqpMessageSource {
    async fn subscribe(&self, queue_name: &str) -> Result<Box<dyn Subscription>, ConsumeError> {
        if !self.connection.is_connected() {
            return Err(ConsumeError::Connection(
                "broker connection is closed".to_string(),
            ));
        }

        let channel = self
            .connection
            .create_channel()
            .await
            .map_err(|e| ConsumeError::Channel(e.to_string()))?;

        let subscribe_err = |e: lapin::Error| ConsumeError::Subscribe {
            queue: queue_name.to_string(),
            reason: e.to_string(),
        };

        channel
            .basic_qos(
                self.connection.config().prefetch_count,
                BasicQosOptions::default(),
            )
            .await
            .map_err(subscribe_err)?;
        channel
            .queue_declare(queue_name, durable_queue_options(), FieldTable::default())
            .await
            .map_err(subscribe_err)?;

        let tag = consumer_tag();
        let consumer = channel
            .basic_consume(
                queue_name,
                &tag,
                BasicConsumeOptions {
                    no_ack: false,
                    ..BasicConsumeOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(subscribe_err)?;

        info!(queue_name, consumer_tag = %tag, "Consuming notification queue");

        Ok(Box::new(AmqpSubscription {
            consumer,
            _channel: channel,
        }))
    }
}

struct AmqpSubscription {
    consumer: Consumer,
    // Dropping the channel would cancel the consumer
    _channel: Channel,
}

#[async_trait]
impl Subscription for AmqpSubscription {
    async fn next_delivery(&mut self) -> Option<Result<Box<dyn Delivery>, ConsumeError>> {
        let next = self.consumer.next().await?;
        Some(
            next.map(|delivery| {
                Box::new(AmqpDelivery {
                    data: delivery.data,
                    acker: delivery.acker,
                }) as Box<dyn Delivery>
            })
            .map_err(|e| ConsumeError::Stream(e.to_string())),
        )
    }
}

struct AmqpDelivery {
    data: Vec<u8>,
    acker: Acker,
}

#[async_trait]
impl Delivery for AmqpDelivery {
    fn payload(&self) -> &[u8] {
        &self.data
    }

    async fn ack(&self) -> Result<(), ConsumeError> {
        self.acker
            .ack(BasicAckOptions { multiple: false })
            .await
            .map_err(|e| ConsumeError::Ack(e.to_string()))
    }

    async fn nack(&self, requeue: bool) -> Result<(), ConsumeError> {
        self.acker
            .nack(BasicNackOptions {
                multiple: false,
                requeue,
            })
            .await
            .map_err(|e| ConsumeError::Ack(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consumer_tags_are_unique() {
        let a = consumer_tag();
        let b = consumer_tag();
        assert!(a.starts_with("rubix-sms-worker-"));
        assert_ne!(a, b);
    }
}
