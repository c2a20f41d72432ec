//! Environment abstraction for deterministic testing.
//!
//! Decouples channel logic from system clocks. Production uses real time;
//! simulation uses tokio's pausable clock and a fixed wall-clock epoch so
//! that backoff and timestamps are reproducible.

use std::time::Duration;

use chrono::{DateTime, Utc};

/// Abstract environment providing time and async sleeping.
///
/// # Invariants
///
/// - `now()` never goes backwards
/// - `wall_clock()` is only used for wire timestamps, never for scheduling
pub trait Environment: Clone + Send + Sync + 'static {
    /// The specific instant type used by this environment.
    ///
    /// Production environments use `std::time::Instant`, while simulation
    /// environments use virtual time (`tokio::time::Instant` with a paused
    /// clock).
    type Instant: Copy + Ord + Send + Sync + std::fmt::Debug + std::ops::Sub<Output = Duration>;

    /// Current time (monotonic).
    fn now(&self) -> Self::Instant;

    /// Current UTC wall-clock time, used to stamp outbound frames.
    fn wall_clock(&self) -> DateTime<Utc>;

    /// Sleeps for the specified duration.
    ///
    /// This is the ONLY async method in the trait, and it should only be used
    /// by driver code (retry timers), not by the state machines.
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;
}
