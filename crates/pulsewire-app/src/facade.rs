//! Application-facing handle.
//!
//! [`ChannelHandle`] is the only thing the rest of the application touches.
//! Every clone talks to the same runtime task, so all of them observe the
//! same connection, attempt count and last message.

use pulsewire_core::Notification;
use pulsewire_proto::{InboundMessage, OutboundEnvelope};
use tokio::sync::{broadcast, mpsc, watch};

use crate::state::ChannelSnapshot;

/// Requests from handles to the runtime.
#[derive(Debug)]
pub(crate) enum Command {
    Connect,
    Disconnect,
    Reconnect,
    Send(OutboundEnvelope),
}

/// Cloneable handle to a running channel.
///
/// Commands are applied asynchronously by the runtime; queries read the most
/// recently published [`ChannelSnapshot`]. If the runtime has stopped,
/// commands are logged and dropped.
#[derive(Debug, Clone)]
pub struct ChannelHandle {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ChannelSnapshot>,
    notifications: broadcast::Sender<Notification>,
}

impl ChannelHandle {
    pub(crate) fn new(
        commands: mpsc::UnboundedSender<Command>,
        state: watch::Receiver<ChannelSnapshot>,
        notifications: broadcast::Sender<Notification>,
    ) -> Self {
        Self { commands, state, notifications }
    }

    /// Whether a socket is open.
    pub fn is_connected(&self) -> bool {
        self.state.borrow().connected
    }

    /// Most recent inbound message.
    pub fn last_message(&self) -> Option<InboundMessage> {
        self.state.borrow().last_message.clone()
    }

    /// Retries scheduled since the last successful open.
    pub fn attempts(&self) -> u32 {
        self.state.borrow().attempts
    }

    /// Current observable state.
    pub fn snapshot(&self) -> ChannelSnapshot {
        self.state.borrow().clone()
    }

    /// Receiver that wakes on every state change.
    pub fn watch(&self) -> watch::Receiver<ChannelSnapshot> {
        self.state.clone()
    }

    /// Receiver of connection and message notifications.
    ///
    /// Only notifications published after this call are delivered.
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.notifications.subscribe()
    }

    /// Send a frame. Dropped if no socket is open.
    pub fn send(&self, envelope: OutboundEnvelope) {
        self.dispatch(Command::Send(envelope));
    }

    /// Open a connection unless one is live.
    pub fn connect(&self) {
        self.dispatch(Command::Connect);
    }

    /// Close the connection and stop reconnecting.
    pub fn disconnect(&self) {
        self.dispatch(Command::Disconnect);
    }

    /// Close the connection and open a new one with the attempt count reset.
    pub fn reconnect(&self) {
        self.dispatch(Command::Reconnect);
    }

    fn dispatch(&self, command: Command) {
        if let Err(err) = self.commands.send(command) {
            tracing::warn!(command = ?err.0, "channel runtime stopped, dropping command");
        }
    }
}
