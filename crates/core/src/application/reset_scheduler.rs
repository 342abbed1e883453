// Ticket Reset Scheduler
// Resets the coordinator once a day at a fixed local time

use super::coordinator::Rubix;
use super::worker::ShutdownToken;
use crate::error::{AppError, Result};
use crate::port::TimeProvider;
use chrono::{Duration as ChronoDuration, NaiveTime};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::info;

/// Parse a daily reset time given as `HH:MM` or `HH:MM:SS`
pub fn parse_reset_time(value: &str) -> Result<NaiveTime> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .map_err(|_| {
            AppError::Config(format!(
                "invalid tickets reset time '{}' (expected HH:MM)",
                value
            ))
        })
}

/// Daily ticket reset
pub struct TicketResetScheduler {
    rubix: Arc<Rubix>,
    time_provider: Arc<dyn TimeProvider>,
    reset_at: NaiveTime,
}

impl TicketResetScheduler {
    /// Create a new reset scheduler
    ///
    /// # Arguments
    /// * `rubix` - Coordinator to reset
    /// * `time_provider` - Local clock
    /// * `reset_at` - Local time of day the reset fires
    pub fn new(rubix: Arc<Rubix>, time_provider: Arc<dyn TimeProvider>, reset_at: NaiveTime) -> Self {
        Self {
            rubix,
            time_provider,
            reset_at,
        }
    }

    /// Time until the next occurrence of `reset_at` (never zero)
    pub fn next_delay(&self) -> Duration {
        let now = self.time_provider.now_local();
        let mut next = now.date().and_time(self.reset_at);
        if next <= now {
            next += ChronoDuration::days(1);
        }
        (next - now).to_std().unwrap_or(Duration::from_secs(1))
    }

    /// Reset immediately (manual trigger)
    pub fn run_now(&self) {
        info!("Running manual ticket reset...");
        self.rubix.reset();
    }

    /// Reset loop (background task)
    ///
    /// Should be spawned in tokio::spawn; returns on shutdown.
    pub async fn run(self, mut shutdown: ShutdownToken) {
        info!(reset_at = %self.reset_at, "Ticket reset scheduler started");

        loop {
            let delay = self.next_delay();
            info!(in_secs = delay.as_secs(), "Next ticket reset scheduled");

            tokio::select! {
                _ = sleep(delay) => {
                    info!("Running scheduled ticket reset...");
                    self.rubix.reset();
                }
                _ = shutdown.wait() => {
                    info!("Ticket reset scheduler stopped");
                    return;
                }
            }
        }
    }
}
