// Domain Layer - Pure business logic and entities

pub mod error;
pub mod notification;
pub mod queue;
pub mod ticket;
pub mod wait_list;

// Re-exports
pub use error::DomainError;
pub use notification::{NotificationMessage, MESSAGE_DELIMITER};
pub use queue::{CounterId, QueueId};
pub use ticket::Ticket;
pub use wait_list::{WaitEntry, WaitList};
