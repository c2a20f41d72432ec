//! Error types for the channel state machines.
//!
//! None of these errors escape to the application: the channel logs them and
//! degrades to "not connected". They exist so each layer can report precisely
//! what went wrong and so tests can match on it.

use pulsewire_proto::ProtocolError;
use thiserror::Error;

use crate::connection::{ConnectionId, SocketStatus};

/// Errors raised by channel operations.
#[derive(Error, Debug)]
pub enum ChannelError {
    /// The configured origin cannot be turned into a WebSocket URL.
    #[error("invalid endpoint {origin:?}: {reason}")]
    InvalidEndpoint {
        /// Origin that failed to parse
        origin: String,
        /// Why it was rejected
        reason: String,
    },

    /// A connection was asked to make an illegal status transition.
    #[error("invalid transition for connection {connection}: {from:?} -> {to:?}")]
    InvalidTransition {
        /// Connection the transition was attempted on
        connection: ConnectionId,
        /// Status before the attempt
        from: SocketStatus,
        /// Requested status
        to: SocketStatus,
    },

    /// Frame encoding or decoding failed.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

impl ChannelError {
    /// Returns true if this failure may clear up on a later attempt.
    ///
    /// A malformed origin will fail on every retry; decode errors concern one
    /// frame only and say nothing about the next one.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Protocol(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_origin_is_not_transient() {
        let err = ChannelError::InvalidEndpoint {
            origin: "::".to_string(),
            reason: "relative URL without a base".to_string(),
        };
        assert!(!err.is_transient());
    }

    #[test]
    fn bad_frame_is_transient() {
        let err = ChannelError::from(ProtocolError::InvalidKind(String::new()));
        assert!(err.is_transient());
    }

    #[test]
    fn invalid_transition_names_both_states() {
        let err = ChannelError::InvalidTransition {
            connection: ConnectionId::new(3),
            from: SocketStatus::Closed,
            to: SocketStatus::Open,
        };
        assert_eq!(err.to_string(), "invalid transition for connection #3: Closed -> Open");
    }
}
