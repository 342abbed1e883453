// Rubix Infrastructure - RabbitMQ Adapter
// Implements: Publisher, MessageSource (ADR-001)

mod connection;
mod consumer;
mod publisher;

pub use connection::{AmqpConfig, AmqpConnection};
pub use consumer::AmqpMessageSource;
pub use publisher::AmqpPublisher;

use lapin::options::QueueDeclareOptions;

/// Options shared by publisher and consumer so both sides declare the
/// notification queue identically (durable, non-exclusive, kept when idle)
pub(crate) fn durable_queue_options() -> QueueDeclareOptions {
    QueueDeclareOptions {
        durable: true,
        ..QueueDeclareOptions::default()
    }
}
