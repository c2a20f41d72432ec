//! Connection lifecycle state machine.
//!
//! A [`Connection`] is the channel's record of one transport socket. It holds
//! no I/O; the runtime reports what the socket does and the record follows.
//!
//! # State Machine
//!
//! ```text
//! ┌────────────┐  opened   ┌──────┐  closing   ┌─────────┐
//! │ Connecting │──────────>│ Open │───────────>│ Closing │
//! └────────────┘           └──────┘            └─────────┘
//!       │ │                    │                    │
//!       │ └──── closing ───────┼────────────────────┘ (Connecting → Closing)
//!       │                      │                    │
//!       │ closed               │ closed             │ closed
//!       ↓                      ↓                    ↓
//!                         ┌────────┐
//!                         │ Closed │
//!                         └────────┘
//! ```

use std::{fmt, ops::Sub, time::Duration};

use crate::error::ChannelError;

/// Identity of one transport socket.
///
/// Allocated monotonically by the channel, so an id is never reused within a
/// process and events from a replaced socket can be told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Wrap a raw id.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Raw id.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Socket lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketStatus {
    /// Upgrade requested, not yet confirmed.
    Connecting,
    /// Upgrade confirmed, frames flow both ways.
    Open,
    /// Close handshake in progress.
    Closing,
    /// Socket finished.
    Closed,
}

impl SocketStatus {
    /// Whether a socket in this status may still be used or reused.
    pub fn is_live(self) -> bool {
        !matches!(self, Self::Closed)
    }
}

/// Record of one socket.
///
/// Generic over `Instant` to support both real time and virtual time for
/// deterministic testing.
#[derive(Debug, Clone)]
pub struct Connection<I> {
    id: ConnectionId,
    status: SocketStatus,
    created_at: I,
    opened_at: Option<I>,
}

impl<I> Connection<I>
where
    I: Copy + Sub<Output = Duration>,
{
    /// Create a record in [`SocketStatus::Connecting`].
    pub fn new(id: ConnectionId, now: I) -> Self {
        Self { id, status: SocketStatus::Connecting, created_at: now, opened_at: None }
    }

    /// Socket identity.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Current status.
    pub fn status(&self) -> SocketStatus {
        self.status
    }

    /// Whether the socket is Connecting, Open or Closing.
    pub fn is_live(&self) -> bool {
        self.status.is_live()
    }

    /// Whether frames can be sent right now.
    pub fn is_open(&self) -> bool {
        self.status == SocketStatus::Open
    }

    /// Time since the socket opened. `None` if it never opened.
    pub fn uptime(&self, now: I) -> Option<Duration> {
        self.opened_at.map(|opened| now - opened)
    }

    /// Time since the socket was requested.
    pub fn age(&self, now: I) -> Duration {
        now - self.created_at
    }

    /// Record a confirmed upgrade.
    ///
    /// # Errors
    ///
    /// - `ChannelError::InvalidTransition` unless the socket is Connecting
    pub fn mark_open(&mut self, now: I) -> Result<(), ChannelError> {
        self.transition(SocketStatus::Open, |from| from == SocketStatus::Connecting)?;
        self.opened_at = Some(now);
        Ok(())
    }

    /// Record the start of a close handshake.
    ///
    /// Idempotent while already Closing.
    ///
    /// # Errors
    ///
    /// - `ChannelError::InvalidTransition` if the socket is Closed
    pub fn mark_closing(&mut self) -> Result<(), ChannelError> {
        self.transition(SocketStatus::Closing, SocketStatus::is_live)
    }

    /// Record that the socket finished. Always allowed.
    pub fn mark_closed(&mut self) {
        self.status = SocketStatus::Closed;
    }

    fn transition(
        &mut self,
        to: SocketStatus,
        allowed: impl FnOnce(SocketStatus) -> bool,
    ) -> Result<(), ChannelError> {
        if !allowed(self.status) {
            return Err(ChannelError::InvalidTransition {
                connection: self.id,
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;

    #[allow(clippy::disallowed_methods)]
    fn start() -> Instant {
        Instant::now()
    }

    #[test]
    fn connection_lifecycle() {
        let t0 = start();
        let mut conn = Connection::new(ConnectionId::new(1), t0);

        assert_eq!(conn.status(), SocketStatus::Connecting);
        assert!(conn.is_live());
        assert!(!conn.is_open());
        assert_eq!(conn.uptime(t0), None);

        conn.mark_open(t0 + Duration::from_secs(1)).unwrap();
        assert!(conn.is_open());
        assert_eq!(conn.uptime(t0 + Duration::from_secs(11)), Some(Duration::from_secs(10)));
        assert_eq!(conn.age(t0 + Duration::from_secs(11)), Duration::from_secs(11));

        conn.mark_closing().unwrap();
        assert_eq!(conn.status(), SocketStatus::Closing);
        assert!(conn.is_live());

        conn.mark_closed();
        assert_eq!(conn.status(), SocketStatus::Closed);
        assert!(!conn.is_live());
    }

    #[test]
    fn connecting_socket_may_start_closing() {
        let mut conn = Connection::new(ConnectionId::new(1), start());
        conn.mark_closing().unwrap();
        assert_eq!(conn.status(), SocketStatus::Closing);
    }

    #[test]
    fn open_only_from_connecting() {
        let t0 = start();
        let mut conn = Connection::new(ConnectionId::new(7), t0);
        conn.mark_open(t0).unwrap();

        let result = conn.mark_open(t0);
        assert!(matches!(
            result,
            Err(ChannelError::InvalidTransition {
                from: SocketStatus::Open,
                to: SocketStatus::Open,
                ..
            })
        ));
    }

    #[test]
    fn closed_socket_cannot_be_revived() {
        let t0 = start();
        let mut conn = Connection::new(ConnectionId::new(2), t0);
        conn.mark_closed();

        assert!(conn.mark_open(t0).is_err());
        assert!(conn.mark_closing().is_err());
        assert_eq!(conn.status(), SocketStatus::Closed);
    }
}
