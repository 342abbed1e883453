// Application Layer - Use Cases and Business Logic

pub mod coordinator;
pub mod reset_scheduler;
pub mod worker;

// Re-exports
pub use coordinator::{CoordinatorConfig, Rubix};
pub use reset_scheduler::TicketResetScheduler;
pub use worker::{
    shutdown_channel, DeliveryFailurePolicy, DeliveryOutcome, ShutdownSender, ShutdownToken,
    SmsWorker, SmsWorkerConfig,
};
