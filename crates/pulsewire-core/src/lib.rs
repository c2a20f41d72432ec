//! Core
//!
//! Sans-IO state machines for the pulsewire update channel: connection
//! lifecycle, reconnect scheduling and inbound message routing.
//!
//! # Architecture
//!
//! Nothing in this crate performs I/O or reads a clock directly. The
//! [`Channel`] receives commands and [`ChannelEvent`]s, runs pure state
//! machine logic and returns [`ChannelAction`]s for a runtime to execute.
//! Time comes from an [`Environment`], so the same code runs against real
//! clocks in production and virtual time in tests.
//!
//! # Components
//!
//! - [`Channel`]: top-level state machine owning one connection slot
//! - [`ConnectionRegistry`]: the slot plus retry bookkeeping
//! - [`ReconnectScheduler`]: exponential backoff and the retry decision
//! - [`MessageRouter`]: frame decoding and cache-key lookup
//! - [`ChannelConfig`]: origin, path, credential and retry settings

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod channel;
pub mod config;
pub mod connection;
pub mod endpoint;
pub mod env;
pub mod error;
pub mod event;
pub mod registry;
pub mod router;
pub mod scheduler;

pub use channel::{Channel, ChannelPhase};
pub use config::ChannelConfig;
pub use connection::{Connection, ConnectionId, SocketStatus};
pub use env::Environment;
pub use error::ChannelError;
pub use event::{ChannelAction, ChannelEvent, Notification};
pub use registry::{ConnectionRegistry, ReconnectState};
pub use router::{MessageRouter, QueryKey, Routed, affected_keys};
pub use scheduler::{
    MAX_RETRY_DELAY, ReconnectScheduler, RetryDecision, SuppressReason, TimerId, backoff_delay,
};
