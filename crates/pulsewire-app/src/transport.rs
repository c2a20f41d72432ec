//! Transport abstraction.
//!
//! A [`Transport`] turns [`ChannelAction`](pulsewire_core::ChannelAction)s
//! that touch the network into socket operations, and reports what each
//! socket does as [`ChannelEvent`]s on the runtime's event sink.
//!
//! # Implementations
//!
//! - [`WsTransport`](crate::ws::WsTransport): tokio-tungstenite, behind the
//!   `websocket` feature
//! - `SimTransport` in the harness crate: in-memory, driven by tests

use pulsewire_core::{ChannelEvent, ConnectionId};
use pulsewire_proto::CloseCode;
use thiserror::Error;
use tokio::sync::mpsc;
use url::Url;

/// Where transports report socket events.
pub type EventSink = mpsc::UnboundedSender<ChannelEvent>;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The upgrade request could not be built.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The socket could not be opened.
    #[error("connection failed: {0}")]
    Connection(String),

    /// No socket with this id exists.
    #[error("unknown connection {0}")]
    UnknownConnection(ConnectionId),

    /// The socket already finished.
    #[error("connection {0} is closed")]
    Closed(ConnectionId),
}

/// Parameters of one socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenRequest {
    /// Identity to report events under.
    pub connection: ConnectionId,
    /// Upgrade endpoint.
    pub url: Url,
    /// Sent as `Authorization: Bearer <credential>` when present.
    pub credential: Option<String>,
}

/// Socket operations used by the runtime.
///
/// Methods return immediately; the outcome of an `open` is reported later
/// through the event sink. For every successful `open` the transport emits,
/// in order: `Opened`, any number of `FrameReceived`, an optional `Closing`
/// and exactly one `Closed`. `TransportError` may precede `Closed`.
pub trait Transport: Send + 'static {
    /// Check that `open` would accept this request, without opening anything.
    ///
    /// # Errors
    ///
    /// Returns the error `open` would return synchronously. The default
    /// accepts every request.
    fn check(&self, _request: &OpenRequest) -> Result<(), TransportError> {
        Ok(())
    }

    /// Start opening a socket.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot even be attempted. No events are
    /// emitted for that connection in this case.
    fn open(&mut self, request: OpenRequest, events: EventSink) -> Result<(), TransportError>;

    /// Queue a text frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket is unknown or already finished.
    fn send(&mut self, connection: ConnectionId, text: String) -> Result<(), TransportError>;

    /// Start a close handshake.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket is unknown or already finished.
    fn close(&mut self, connection: ConnectionId, code: CloseCode) -> Result<(), TransportError>;
}
