//! Simulated environment.
//!
//! `SimEnv` reads tokio's clock, which tests pause with
//! `#[tokio::test(start_paused = true)]`. The wall clock starts at a fixed
//! epoch and advances with virtual time, so frame timestamps are stable.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use pulsewire_core::Environment;
use tokio::time::Instant;

/// Wall-clock time at which every simulation starts: 2026-01-01T00:00:00Z.
pub const SIM_EPOCH_SECS: i64 = 1_767_225_600;

/// Environment backed by tokio's (pausable) clock.
#[derive(Debug, Clone, Copy)]
pub struct SimEnv {
    start: Instant,
}

impl Default for SimEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl SimEnv {
    /// Create an environment whose wall clock reads the epoch right now.
    #[allow(clippy::disallowed_methods)]
    pub fn new() -> Self {
        Self { start: Instant::now() }
    }

    /// Virtual time elapsed since creation.
    pub fn elapsed(&self) -> Duration {
        self.now() - self.start
    }
}

impl Environment for SimEnv {
    type Instant = Instant;

    #[allow(clippy::disallowed_methods)]
    fn now(&self) -> Self::Instant {
        Instant::now()
    }

    fn wall_clock(&self) -> DateTime<Utc> {
        let epoch = DateTime::UNIX_EPOCH + TimeDelta::seconds(SIM_EPOCH_SECS);
        TimeDelta::from_std(self.elapsed())
            .ok()
            .and_then(|elapsed| epoch.checked_add_signed(elapsed))
            .unwrap_or(epoch)
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }
}
