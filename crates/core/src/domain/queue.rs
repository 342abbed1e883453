// Queue Domain Model

/// Queue identifier, assigned by the persistence layer
pub type QueueId = i64;

/// Counter (physical service point) identifier
pub type CounterId = i64;
