//! Channel state machine.
//!
//! [`Channel`] ties the connection slot, the reconnect scheduler and the
//! message router together. Commands (`connect`, `disconnect`, `reconnect`,
//! `send`, `tick`) and transport events go in; [`ChannelAction`]s come out.
//!
//! # Phases
//!
//! ```text
//!          connect           opened
//! ┌──────┐ ───────> ┌────────────┐ ─────> ┌──────┐
//! │ Idle │          │ Connecting │        │ Open │
//! └──────┘          └────────────┘        └──────┘
//!                     ↑     │ open failed     │ closing
//!      retry timer /  │     ↓                 ↓
//!      connect        │  ┌────────┐  closed ┌─────────┐
//!                     └──│ Closed │<────────│ Closing │
//!                        └────────┘         └─────────┘
//! ```
//!
//! `Closed → Connecting` happens automatically only while the manual-close
//! flag is clear and the attempt bound is not reached.

use pulsewire_proto::{CloseCode, InboundMessage, OutboundEnvelope};

use crate::{
    config::ChannelConfig,
    connection::{Connection, ConnectionId, SocketStatus},
    endpoint,
    env::Environment,
    error::ChannelError,
    event::{ChannelAction, ChannelEvent, Notification},
    registry::ConnectionRegistry,
    router::MessageRouter,
    scheduler::{ReconnectScheduler, RetryDecision, SuppressReason, TimerId},
};

/// Coarse channel phase, as seen by the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelPhase {
    /// Never connected.
    #[default]
    Idle,
    /// A socket is being opened.
    Connecting,
    /// A socket is open.
    Open,
    /// The server started closing the socket.
    Closing,
    /// No socket. A retry may be pending.
    Closed,
}

/// The update channel state machine.
///
/// Owns at most one live connection. Pure: performs no I/O and never reads
/// a clock except through the environment.
pub struct Channel<E: Environment> {
    env: E,
    config: ChannelConfig,
    registry: ConnectionRegistry<E::Instant>,
    scheduler: ReconnectScheduler,
    router: MessageRouter,
    phase: ChannelPhase,
    next_connection: u64,
    last_message: Option<InboundMessage>,
    last_heartbeat: Option<E::Instant>,
}

impl<E: Environment> Channel<E> {
    /// Create an idle channel.
    pub fn new(config: ChannelConfig, env: E) -> Self {
        let scheduler = ReconnectScheduler::from_config(&config);
        Self {
            env,
            config,
            registry: ConnectionRegistry::new(),
            scheduler,
            router: MessageRouter::new(),
            phase: ChannelPhase::Idle,
            next_connection: 1,
            last_message: None,
            last_heartbeat: None,
        }
    }

    /// Configuration captured at construction.
    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Current phase.
    pub fn phase(&self) -> ChannelPhase {
        self.phase
    }

    /// Whether a socket is open.
    pub fn is_connected(&self) -> bool {
        self.phase == ChannelPhase::Open
    }

    /// Retries scheduled since the last successful open.
    pub fn attempts(&self) -> u32 {
        self.registry.reconnect().attempts
    }

    /// Whether the last close was requested by the application.
    pub fn is_manually_closed(&self) -> bool {
        self.registry.reconnect().manual_close
    }

    /// Most recent inbound message.
    pub fn last_message(&self) -> Option<&InboundMessage> {
        self.last_message.as_ref()
    }

    /// Retry timer currently armed.
    pub fn pending_retry(&self) -> Option<TimerId> {
        self.registry.reconnect().pending
    }

    /// The live connection, if any.
    pub fn current_connection(&self) -> Option<ConnectionId> {
        self.registry.get_current().map(Connection::id)
    }

    /// Inbound frames discarded as malformed.
    pub fn dropped_frames(&self) -> u64 {
        self.router.dropped()
    }

    /// Open a connection unless one is already live.
    ///
    /// Clears the manual-close flag and supersedes any pending retry.
    pub fn connect(&mut self) -> Vec<ChannelAction> {
        if let Some(conn) = self.registry.get_current() {
            tracing::debug!(
                connection = %conn.id(),
                status = ?conn.status(),
                "connect: reusing live connection"
            );
            return Vec::new();
        }

        let state = self.registry.reconnect_mut();
        state.manual_close = false;
        let mut actions = self.scheduler.cancel(state);

        let url = match endpoint::derive(&self.config.origin, &self.config.path) {
            Ok(url) => url,
            Err(err) => {
                report(&err, "connect: cannot build endpoint");
                self.phase = ChannelPhase::Closed;
                actions.extend(self.retry_after(CloseCode::ABNORMAL));
                return actions;
            },
        };

        let connection = ConnectionId::new(self.next_connection);
        self.next_connection += 1;
        self.registry.set_current(Some(Connection::new(connection, self.env.now())));
        self.phase = ChannelPhase::Connecting;

        tracing::info!(%connection, %url, "connecting");
        actions.push(ChannelAction::Open { connection, url });
        actions
    }

    /// Close the current connection and stop reconnecting.
    pub fn disconnect(&mut self) -> Vec<ChannelAction> {
        let state = self.registry.reconnect_mut();
        state.manual_close = true;
        let mut actions = self.scheduler.cancel(state);

        if let Some(conn) = self.registry.set_current(None).filter(Connection::is_live) {
            tracing::info!(connection = %conn.id(), "disconnecting");
            actions.push(ChannelAction::Close { connection: conn.id(), code: CloseCode::NORMAL });
            // Listeners never heard Connected for a socket still upgrading
            if conn.status() != SocketStatus::Connecting {
                actions.push(ChannelAction::Notify(Notification::Disconnected {
                    code: CloseCode::NORMAL,
                }));
            }
        }

        if self.phase != ChannelPhase::Idle {
            self.phase = ChannelPhase::Closed;
        }
        self.last_heartbeat = None;
        actions
    }

    /// Drop the current connection and open a fresh one with the attempt
    /// count reset.
    pub fn reconnect(&mut self) -> Vec<ChannelAction> {
        let mut actions = self.disconnect();
        self.registry.reconnect_mut().attempts = 0;
        actions.extend(self.connect());
        actions
    }

    /// Send a frame on the open connection.
    ///
    /// Dropped with a warning if no connection is open. Frames are never
    /// queued.
    pub fn send(&mut self, envelope: OutboundEnvelope) -> Vec<ChannelAction> {
        let Some(connection) = self.open_connection() else {
            tracing::warn!(kind = envelope.kind(), "send: no open connection, dropping frame");
            return Vec::new();
        };

        self.encode(envelope)
            .map(|text| ChannelAction::SendText { connection, text })
            .into_iter()
            .collect()
    }

    /// Periodic housekeeping. Sends a ping when the heartbeat is due.
    pub fn tick(&mut self, now: E::Instant) -> Vec<ChannelAction> {
        let Some(interval) = self.config.heartbeat_interval else {
            return Vec::new();
        };
        if self.open_connection().is_none() {
            return Vec::new();
        }

        let due = match self.last_heartbeat {
            Some(last) => now >= last && now - last >= interval,
            None => true,
        };
        if !due {
            return Vec::new();
        }

        self.last_heartbeat = Some(now);
        self.send(OutboundEnvelope::ping())
    }

    /// Process a transport or timer event.
    pub fn handle(&mut self, event: ChannelEvent) -> Vec<ChannelAction> {
        if let Some(connection) = event.connection()
            && !self.registry.is_current(connection)
        {
            tracing::debug!(%connection, ?event, "ignoring event from stale connection");
            return Vec::new();
        }

        match event {
            ChannelEvent::Opened { connection } => self.handle_opened(connection),
            ChannelEvent::FrameReceived { text, .. } => self.handle_frame(&text),
            ChannelEvent::Closing { connection } => {
                if let Some(conn) = self.registry.current_mut()
                    && let Err(err) = conn.mark_closing()
                {
                    tracing::debug!(%err, "ignoring close handshake");
                    return Vec::new();
                }
                tracing::info!(%connection, "server closing connection");
                self.phase = ChannelPhase::Closing;
                Vec::new()
            },
            ChannelEvent::Closed { connection, code, reason } => {
                self.handle_closed(connection, code, &reason)
            },
            ChannelEvent::TransportError { connection, reason } => {
                tracing::warn!(%connection, %reason, "transport error");
                Vec::new()
            },
            ChannelEvent::OpenFailed { connection, reason } => {
                let age = self.registry.set_current(None).map(|conn| conn.age(self.env.now()));
                tracing::error!(%connection, %reason, ?age, "failed to open connection");
                self.phase = ChannelPhase::Closed;
                self.retry_after(CloseCode::ABNORMAL)
            },
            ChannelEvent::RetryTimerFired { timer } => {
                if self.registry.reconnect().pending != Some(timer) {
                    tracing::debug!(%timer, "ignoring stale retry timer");
                    return Vec::new();
                }
                self.registry.reconnect_mut().pending = None;
                tracing::info!(%timer, attempt = self.attempts(), "retry timer fired");
                self.connect()
            },
        }
    }

    fn handle_opened(&mut self, connection: ConnectionId) -> Vec<ChannelAction> {
        let now = self.env.now();
        if let Some(conn) = self.registry.current_mut()
            && let Err(err) = conn.mark_open(now)
        {
            tracing::warn!(%err, "ignoring open event");
            return Vec::new();
        }

        let state = self.registry.reconnect_mut();
        state.attempts = 0;
        let mut actions = self.scheduler.cancel(state);

        self.phase = ChannelPhase::Open;
        self.last_heartbeat = Some(now);
        tracing::info!(%connection, "connected");

        actions.push(ChannelAction::Notify(Notification::Connected));
        if let Some(text) = self.encode(OutboundEnvelope::subscribe_analytics()) {
            actions.push(ChannelAction::SendText { connection, text });
        }
        actions
    }

    fn handle_frame(&mut self, text: &str) -> Vec<ChannelAction> {
        let routed = match self.router.route(text) {
            Ok(routed) => routed,
            Err(err) => {
                report(&ChannelError::from(err), "discarding malformed frame");
                return Vec::new();
            },
        };

        tracing::debug!(
            kind = %routed.message.kind(),
            keys = routed.keys.len(),
            routed = self.router.routed(),
            "message received"
        );
        self.last_message = Some(routed.message.clone());

        let mut actions: Vec<ChannelAction> =
            routed.keys.iter().copied().map(ChannelAction::Invalidate).collect();
        actions.push(ChannelAction::Notify(Notification::Message(routed.message)));
        actions
    }

    fn handle_closed(
        &mut self,
        connection: ConnectionId,
        code: CloseCode,
        reason: &str,
    ) -> Vec<ChannelAction> {
        let mut uptime = None;
        if let Some(mut conn) = self.registry.set_current(None) {
            uptime = conn.uptime(self.env.now());
            conn.mark_closed();
        }
        self.phase = ChannelPhase::Closed;
        self.last_heartbeat = None;
        tracing::info!(%connection, %code, reason, ?uptime, "connection closed");

        let mut actions = vec![ChannelAction::Notify(Notification::Disconnected { code })];
        actions.extend(self.retry_after(code));
        actions
    }

    /// The single retry decision point.
    fn retry_after(&mut self, code: CloseCode) -> Vec<ChannelAction> {
        let state = self.registry.reconnect_mut();
        match self.scheduler.decide(state, code) {
            RetryDecision::Schedule { attempt, delay } => {
                let max = self.scheduler.max_attempts();
                tracing::info!(attempt, max, ?delay, "scheduling reconnect");
                self.scheduler.arm(state)
            },
            RetryDecision::Suppressed(SuppressReason::Exhausted { attempts, max }) => {
                tracing::warn!(attempts, max, "reconnect attempts exhausted");
                Vec::new()
            },
            RetryDecision::Suppressed(reason) => {
                tracing::debug!(?reason, "not reconnecting");
                Vec::new()
            },
        }
    }

    fn open_connection(&self) -> Option<ConnectionId> {
        self.registry.get_current().filter(|conn| conn.is_open()).map(Connection::id)
    }

    fn encode(&self, envelope: OutboundEnvelope) -> Option<String> {
        let kind = envelope.kind().to_string();
        match envelope.stamp(self.env.wall_clock()).encode() {
            Ok(text) => Some(text),
            Err(err) => {
                tracing::warn!(%kind, %err, "cannot encode outbound frame");
                None
            },
        }
    }
}

/// Log at `warn` what a later attempt may fix and at `error` what it cannot.
fn report(err: &ChannelError, what: &str) {
    if err.is_transient() {
        tracing::warn!(%err, "{what}");
    } else {
        tracing::error!(%err, "{what}");
    }
}
