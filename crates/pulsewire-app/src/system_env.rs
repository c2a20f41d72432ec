//! Production Environment implementation using system clocks.
//!
//! `SystemEnv` reads the monotonic clock for scheduling and the UTC wall
//! clock for frame timestamps. Behavior is not reproducible; tests use the
//! harness's `SimEnv` instead.

use std::time::Duration;

use chrono::{DateTime, Utc};
use pulsewire_core::Environment;

/// Production environment using system time.
///
/// Uses `std::time::Instant::now()` for time, `chrono::Utc::now()` for
/// timestamps and `tokio::time::sleep()` for retry timers.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    type Instant = std::time::Instant;

    #[allow(clippy::disallowed_methods)]
    fn now(&self) -> Self::Instant {
        std::time::Instant::now()
    }

    #[allow(clippy::disallowed_methods)]
    fn wall_clock(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_env_time_advances() {
        let env = SystemEnv::new();

        let t1 = env.now();
        std::thread::sleep(Duration::from_millis(10));
        let t2 = env.now();

        assert!(t2 > t1, "Time should advance");
    }

    #[test]
    fn wall_clock_is_recent() {
        let env = SystemEnv::new();
        assert!(env.wall_clock().timestamp() > 1_700_000_000);
    }

    #[tokio::test]
    async fn system_env_sleep_works() {
        let env = SystemEnv::new();

        let start = env.now();
        env.sleep(Duration::from_millis(50)).await;
        let elapsed = env.now() - start;

        assert!(elapsed >= Duration::from_millis(50), "Sleep should wait at least 50ms");
    }
}
