//! Runtime error types.

use pulsewire_core::ChannelError;
use thiserror::Error;

use crate::transport::TransportError;

/// Errors surfaced while setting up or running a channel.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The configuration cannot produce a usable endpoint.
    #[error("invalid configuration: {0}")]
    Config(#[from] ChannelError),

    /// The transport failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The runtime task panicked or was cancelled.
    #[error("runtime task failed: {0}")]
    Task(String),
}
