//! The connection slot.
//!
//! One registry per channel. It holds at most one connection plus the retry
//! bookkeeping that has to survive across connections.

use std::{ops::Sub, time::Duration};

use crate::{
    connection::{Connection, ConnectionId},
    scheduler::TimerId,
};

/// Retry bookkeeping shared by successive connections.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconnectState {
    /// Retries scheduled since the last successful open.
    pub attempts: u32,
    /// Set by an explicit disconnect, cleared by every programmatic connect.
    pub manual_close: bool,
    /// Retry timer currently armed.
    pub pending: Option<TimerId>,
}

/// Single slot holding the current connection.
#[derive(Debug, Clone)]
pub struct ConnectionRegistry<I> {
    current: Option<Connection<I>>,
    reconnect: ReconnectState,
}

impl<I> Default for ConnectionRegistry<I> {
    fn default() -> Self {
        Self { current: None, reconnect: ReconnectState::default() }
    }
}

impl<I> ConnectionRegistry<I>
where
    I: Copy + Sub<Output = Duration>,
{
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The current connection if it is Connecting, Open or Closing.
    pub fn get_current(&self) -> Option<&Connection<I>> {
        self.current.as_ref().filter(|conn| conn.is_live())
    }

    /// Mutable access to the current connection, live or not.
    pub fn current_mut(&mut self) -> Option<&mut Connection<I>> {
        self.current.as_mut()
    }

    /// Replace the slot, returning the previous occupant.
    pub fn set_current(&mut self, connection: Option<Connection<I>>) -> Option<Connection<I>> {
        std::mem::replace(&mut self.current, connection)
    }

    /// Whether `id` names the connection in the slot.
    pub fn is_current(&self, id: ConnectionId) -> bool {
        self.current.as_ref().is_some_and(|conn| conn.id() == id)
    }

    /// Retry bookkeeping.
    pub fn reconnect(&self) -> &ReconnectState {
        &self.reconnect
    }

    /// Mutable retry bookkeeping.
    pub fn reconnect_mut(&mut self) -> &mut ReconnectState {
        &mut self.reconnect
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
    struct Tick(u64);

    impl Sub for Tick {
        type Output = Duration;

        fn sub(self, rhs: Self) -> Duration {
            Duration::from_millis(self.0 - rhs.0)
        }
    }

    #[test]
    fn closed_connection_is_not_current() {
        let mut registry = ConnectionRegistry::new();
        let previous = registry.set_current(Some(Connection::new(ConnectionId::new(1), Tick(0))));
        assert!(previous.is_none());
        assert!(registry.get_current().is_some());

        if let Some(conn) = registry.current_mut() {
            conn.mark_closed();
        }
        assert!(registry.get_current().is_none());
        assert!(registry.is_current(ConnectionId::new(1)));
    }

    #[test]
    fn set_current_returns_previous() {
        let mut registry = ConnectionRegistry::new();
        registry.set_current(Some(Connection::new(ConnectionId::new(1), Tick(0))));

        let previous = registry.set_current(Some(Connection::new(ConnectionId::new(2), Tick(5))));
        assert_eq!(previous.map(|c| c.id()), Some(ConnectionId::new(1)));
        assert!(!registry.is_current(ConnectionId::new(1)));
        assert!(registry.is_current(ConnectionId::new(2)));

        let cleared = registry.set_current(None);
        assert_eq!(cleared.map(|c| c.id()), Some(ConnectionId::new(2)));
        assert!(!registry.is_current(ConnectionId::new(2)));
    }

    #[test]
    fn reconnect_state_starts_clean() {
        let registry = ConnectionRegistry::<Tick>::new();
        assert_eq!(registry.reconnect(), &ReconnectState::default());
    }
}
