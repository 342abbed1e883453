// Central Error Type for the Application

use crate::domain::QueueId;
use crate::port::{ConsumeError, DeliveryError, PublishError};
use thiserror::Error;

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Domain error: {0}")]
    Domain(#[from] crate::domain::DomainError),

    /// Dequeue attempted on a queue nobody is waiting on
    #[error("No customer waiting on queue {queue_id}")]
    EmptyQueue { queue_id: QueueId },

    #[error("Publish failed: {0}")]
    PublishFailure(#[from] PublishError),

    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    #[error("Delivery failed: {0}")]
    DeliveryFailure(#[from] DeliveryError),

    #[error("Consume error: {0}")]
    Consume(#[from] ConsumeError),

    #[error("Broker error: {0}")]
    Broker(String),

    #[error("Notification worker already registered")]
    WorkerAlreadyRegistered,

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
