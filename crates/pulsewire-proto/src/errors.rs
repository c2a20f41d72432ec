//! Protocol errors.

use thiserror::Error;

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors produced while encoding or decoding frames.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Inbound text is not a valid frame.
    #[error("failed to decode frame: {0}")]
    Decode(#[source] serde_json::Error),

    /// Outbound envelope could not be serialized.
    #[error("failed to encode frame: {0}")]
    Encode(#[source] serde_json::Error),

    /// Kind tag is empty.
    #[error("invalid kind tag: {0:?}")]
    InvalidKind(String),
}
