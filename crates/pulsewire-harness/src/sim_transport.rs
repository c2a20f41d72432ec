//! In-memory transport.
//!
//! [`SimTransport`] implements [`Transport`] so the same
//! [`pulsewire_app::Runtime`] code runs in production and simulation.
//! [`SimNetwork`] is the test's side of the wire: it accepts, refuses and
//! drops sockets, pushes server frames and records what the client sent.
//!
//! Both share one state, so a test keeps a `SimNetwork` clone after moving
//! the transport into the runtime.

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use pulsewire_app::{EventSink, OpenRequest, Transport, TransportError};
use pulsewire_core::{ChannelEvent, ConnectionId};
use pulsewire_proto::{CloseCode, InboundMessage};
use url::Url;

/// One `open` call as seen by the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenRecord {
    /// Socket identity.
    pub connection: ConnectionId,
    /// Requested endpoint.
    pub url: Url,
    /// Credential attached to the upgrade request.
    pub credential: Option<String>,
}

struct SimSocket {
    events: EventSink,
    open: bool,
    closed: bool,
    sent: Vec<String>,
}

impl SimSocket {
    fn emit(&self, event: ChannelEvent) {
        // Err means the runtime is gone
        let _ = self.events.send(event);
    }
}

#[derive(Default)]
struct NetworkState {
    sockets: BTreeMap<ConnectionId, SimSocket>,
    opens: Vec<OpenRecord>,
    refuse_next: Option<String>,
    auto_accept: bool,
}

/// Test-side control of the simulated network.
#[derive(Clone, Default)]
pub struct SimNetwork {
    state: Arc<Mutex<NetworkState>>,
}

impl SimNetwork {
    /// Network that leaves new sockets Connecting until [`accept`](Self::accept).
    pub fn new() -> Self {
        Self::default()
    }

    /// Network that opens every socket immediately.
    pub fn auto_accept() -> Self {
        let network = Self::new();
        network.lock().auto_accept = true;
        network
    }

    /// Transport half, to be moved into the runtime.
    pub fn transport(&self) -> SimTransport {
        SimTransport { network: self.clone() }
    }

    fn lock(&self) -> MutexGuard<'_, NetworkState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Complete the upgrade of `connection`.
    pub fn accept(&self, connection: ConnectionId) {
        let mut state = self.lock();
        if let Some(socket) = state.sockets.get_mut(&connection)
            && !socket.closed
            && !socket.open
        {
            socket.open = true;
            socket.emit(ChannelEvent::Opened { connection });
        }
    }

    /// Fail the next `open` call synchronously with `reason`.
    pub fn refuse_next_open(&self, reason: impl Into<String>) {
        self.lock().refuse_next = Some(reason.into());
    }

    /// Push a raw text frame to the client.
    pub fn deliver(&self, connection: ConnectionId, text: impl Into<String>) {
        let state = self.lock();
        if let Some(socket) = state.sockets.get(&connection).filter(|s| s.open && !s.closed) {
            socket.emit(ChannelEvent::FrameReceived { connection, text: text.into() });
        }
    }

    /// Push an encoded message to the client.
    pub fn deliver_message(&self, connection: ConnectionId, message: &InboundMessage) {
        if let Ok(text) = message.encode() {
            self.deliver(connection, text);
        }
    }

    /// Server-initiated close handshake with `code`.
    pub fn server_close(&self, connection: ConnectionId, code: CloseCode) {
        self.finish(connection, |socket| {
            socket.emit(ChannelEvent::Closing { connection });
            socket.emit(ChannelEvent::Closed { connection, code, reason: String::new() });
        });
    }

    /// Drop the socket without a close frame (network failure, refused
    /// upgrade).
    pub fn drop_connection(&self, connection: ConnectionId) {
        self.finish(connection, |socket| {
            socket.emit(ChannelEvent::TransportError {
                connection,
                reason: "connection reset".to_string(),
            });
            socket.emit(ChannelEvent::Closed {
                connection,
                code: CloseCode::ABNORMAL,
                reason: String::new(),
            });
        });
    }

    /// Every `open` call so far, in order.
    pub fn opens(&self) -> Vec<OpenRecord> {
        self.lock().opens.clone()
    }

    /// Number of `open` calls that reached the network.
    pub fn open_count(&self) -> usize {
        self.lock().opens.len()
    }

    /// Most recently opened socket.
    pub fn latest(&self) -> Option<ConnectionId> {
        self.lock().opens.last().map(|record| record.connection)
    }

    /// Sockets that have not finished.
    pub fn live_sockets(&self) -> Vec<ConnectionId> {
        self.lock().sockets.iter().filter(|(_, s)| !s.closed).map(|(id, _)| *id).collect()
    }

    /// Frames the client sent on `connection`.
    pub fn sent(&self, connection: ConnectionId) -> Vec<String> {
        self.lock().sockets.get(&connection).map(|s| s.sent.clone()).unwrap_or_default()
    }

    fn finish(&self, connection: ConnectionId, emit: impl FnOnce(&SimSocket)) {
        let mut state = self.lock();
        if let Some(socket) = state.sockets.get_mut(&connection)
            && !socket.closed
        {
            socket.closed = true;
            emit(socket);
        }
    }
}

/// Runtime-side half of the simulated network.
pub struct SimTransport {
    network: SimNetwork,
}

impl Transport for SimTransport {
    fn open(&mut self, request: OpenRequest, events: EventSink) -> Result<(), TransportError> {
        let mut state = self.network.lock();
        if let Some(reason) = state.refuse_next.take() {
            return Err(TransportError::Connection(reason));
        }

        let connection = request.connection;
        tracing::debug!(%connection, url = %request.url, "sim: open");
        state.opens.push(OpenRecord {
            connection,
            url: request.url,
            credential: request.credential,
        });

        let socket = SimSocket { events, open: state.auto_accept, closed: false, sent: Vec::new() };
        if socket.open {
            socket.emit(ChannelEvent::Opened { connection });
        }
        state.sockets.insert(connection, socket);
        Ok(())
    }

    fn send(&mut self, connection: ConnectionId, text: String) -> Result<(), TransportError> {
        let mut state = self.network.lock();
        let socket =
            state
                .sockets
                .get_mut(&connection)
                .ok_or(TransportError::UnknownConnection(connection))?;
        if socket.closed {
            return Err(TransportError::Closed(connection));
        }
        socket.sent.push(text);
        Ok(())
    }

    fn close(&mut self, connection: ConnectionId, code: CloseCode) -> Result<(), TransportError> {
        let mut state = self.network.lock();
        let socket =
            state
                .sockets
                .get_mut(&connection)
                .ok_or(TransportError::UnknownConnection(connection))?;
        if socket.closed {
            return Err(TransportError::Closed(connection));
        }
        socket.closed = true;
        // The simulated server echoes the close immediately
        socket.emit(ChannelEvent::Closed { connection, code, reason: String::new() });
        Ok(())
    }
}
