// Port Layer - Interfaces for external dependencies

pub mod message_source;
pub mod notification_worker;
pub mod publisher;
pub mod sms_gateway;
pub mod ticket_letter; // For deterministic testing
pub mod time_provider;

// Re-exports
pub use message_source::{ConsumeError, Delivery, MessageSource, Subscription};
pub use notification_worker::NotificationWorker;
pub use publisher::{PublishError, Publisher};
pub use sms_gateway::{DeliveryError, GatewayCredentials, SmsGateway};
pub use ticket_letter::TicketLetterProvider;
pub use time_provider::TimeProvider;
