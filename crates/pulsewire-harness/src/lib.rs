//! Deterministic simulation harness for pulsewire testing.
//!
//! In-memory implementations of the Environment and Transport traits. Time
//! is tokio's pausable clock, so retry timers fire in virtual time and
//! backoff schedules can be asserted to the millisecond.
//!
//! # Invariant Testing
//!
//! The [`invariants`] module checks properties that must hold after any
//! sequence of commands and network events, independent of the scenario.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod invariants;
pub mod recording_cache;
pub mod sim_env;
pub mod sim_transport;

pub use invariants::{Violation, check_network};
pub use recording_cache::RecordingCache;
pub use sim_env::{SIM_EPOCH_SECS, SimEnv};
pub use sim_transport::{OpenRecord, SimNetwork, SimTransport};
