// Rubix Infrastructure - SMS Gateway Adapter
// Implements: SmsGateway (ADR-001)

pub mod nandi;

pub use nandi::{NandiSmsGateway, DEFAULT_NANDI_BASE_URL};
