// Time Provider Port (for testability)

use chrono::{DateTime, Local, NaiveDateTime};

/// Time provider interface (allows mocking in tests)
pub trait TimeProvider: Send + Sync {
    /// Current wall-clock time in the service's local timezone
    fn now_local(&self) -> NaiveDateTime;
}

/// System time provider (production)
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now_local(&self) -> NaiveDateTime {
        let now: DateTime<Local> = Local::now();
        now.naive_local()
    }
}

/// Frozen clock (tests)
pub struct FixedTimeProvider(pub NaiveDateTime);

impl TimeProvider for FixedTimeProvider {
    fn now_local(&self) -> NaiveDateTime {
        self.0
    }
}
