//! Application layer for pulsewire
//!
//! Generic async runtime that executes the actions of the Sans-IO
//! [`Channel`](pulsewire_core::Channel), plus the handle the rest of the
//! application uses. The same runtime code runs against real sockets in
//! production and the simulated transport in tests.
//!
//! # Components
//!
//! - [`Runtime`]: tokio event loop owning the channel, transport and timers
//! - [`ChannelHandle`]: cloneable application-facing handle
//! - [`Transport`]: trait for socket I/O
//! - [`QueryCache`]: trait receiving cache invalidations
//! - [`SystemEnv`]: production environment
//!
//! # WebSocket (optional)
//!
//! With the `websocket` feature enabled, this crate also provides
//! [`ws::WsTransport`] built on tokio-tungstenite and rustls.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod cache;
mod error;
mod facade;
mod runtime;
mod state;
mod system_env;
mod transport;

#[cfg(feature = "websocket")]
pub mod ws;

pub use cache::{GenerationCache, QueryCache};
pub use error::RuntimeError;
pub use facade::ChannelHandle;
pub use pulsewire_core::{ChannelConfig, ChannelPhase, Environment, Notification, QueryKey};
pub use runtime::Runtime;
pub use state::ChannelSnapshot;
pub use system_env::SystemEnv;
pub use transport::{EventSink, OpenRequest, Transport, TransportError};
