//! Channel events and actions.

use std::time::Duration;

use pulsewire_proto::{CloseCode, InboundMessage};
use url::Url;

use crate::{connection::ConnectionId, router::QueryKey, scheduler::TimerId};

/// Events the runtime feeds into the channel.
///
/// The runtime is responsible for:
/// - Reporting what each transport socket does
/// - Reporting retry timer expiries
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// The upgrade completed.
    Opened {
        /// Socket that opened.
        connection: ConnectionId,
    },

    /// A text frame arrived.
    FrameReceived {
        /// Socket the frame arrived on.
        connection: ConnectionId,
        /// Raw frame text.
        text: String,
    },

    /// The peer started a close handshake.
    Closing {
        /// Socket being closed.
        connection: ConnectionId,
    },

    /// The socket finished. Exactly one per socket.
    Closed {
        /// Socket that closed.
        connection: ConnectionId,
        /// Close status, 1006 when the stream dropped without one.
        code: CloseCode,
        /// Close reason, possibly empty.
        reason: String,
    },

    /// The transport hit an error. A `Closed` event follows.
    TransportError {
        /// Affected socket.
        connection: ConnectionId,
        /// Error description.
        reason: String,
    },

    /// The transport could not even start opening the socket.
    OpenFailed {
        /// Socket that was requested.
        connection: ConnectionId,
        /// Error description.
        reason: String,
    },

    /// A retry timer expired.
    RetryTimerFired {
        /// Timer that expired.
        timer: TimerId,
    },
}

impl ChannelEvent {
    /// Socket this event concerns, if any.
    pub fn connection(&self) -> Option<ConnectionId> {
        match self {
            Self::Opened { connection }
            | Self::FrameReceived { connection, .. }
            | Self::Closing { connection }
            | Self::Closed { connection, .. }
            | Self::TransportError { connection, .. }
            | Self::OpenFailed { connection, .. } => Some(*connection),
            Self::RetryTimerFired { .. } => None,
        }
    }
}

/// Actions the channel asks the runtime to perform.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelAction {
    /// Open a socket to `url`.
    Open {
        /// Identity to report events under.
        connection: ConnectionId,
        /// Upgrade endpoint.
        url: Url,
    },

    /// Send a text frame.
    SendText {
        /// Target socket.
        connection: ConnectionId,
        /// Encoded frame.
        text: String,
    },

    /// Close a socket.
    Close {
        /// Target socket.
        connection: ConnectionId,
        /// Close status to send.
        code: CloseCode,
    },

    /// Arm a retry timer; report `RetryTimerFired` when it expires.
    ArmTimer {
        /// Timer handle.
        timer: TimerId,
        /// Time until expiry.
        delay: Duration,
    },

    /// Disarm a retry timer.
    CancelTimer {
        /// Timer handle.
        timer: TimerId,
    },

    /// Mark a cached query as stale.
    Invalidate(QueryKey),

    /// Tell application listeners about a change.
    Notify(Notification),
}

/// What application listeners are told.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    /// A socket opened and the subscription handshake went out.
    Connected,
    /// The current socket closed.
    ///
    /// A manual disconnect reports this only for a socket that reached
    /// `Connected`. A close reported by the transport is always forwarded,
    /// including the 1006 that ends a failed upgrade.
    Disconnected {
        /// Close status.
        code: CloseCode,
    },
    /// A message was received.
    Message(InboundMessage),
}
