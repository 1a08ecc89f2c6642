//! Connection registry.
//!
//! Tracks every live connection together with an explicit pairing state. The
//! state is stored rather than derived from queue/directory membership, and
//! the matchmaker keeps the three structures in agreement.

use std::collections::HashMap;

use pairwire_proto::{ConnectionId, RoomId};

/// Pairing state of a live connection.
///
/// A connection is in exactly one of these states at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Neither waiting nor paired.
    Idle,
    /// Waiting in the matchmaking queue.
    Queued,
    /// Member of the given session.
    Paired(RoomId),
}

/// Registry of live connections and their pairing state.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: HashMap<ConnectionId, ConnectionState>,
}

impl ConnectionRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new connection in [`ConnectionState::Idle`].
    ///
    /// Returns `false` if the connection is already registered.
    pub fn register(&mut self, connection_id: ConnectionId) -> bool {
        if self.connections.contains_key(&connection_id) {
            return false;
        }
        self.connections.insert(connection_id, ConnectionState::Idle);
        true
    }

    /// Remove a connection, returning the state it was in.
    pub fn unregister(&mut self, connection_id: ConnectionId) -> Option<ConnectionState> {
        self.connections.remove(&connection_id)
    }

    /// Current state. `None` if the connection isn't registered.
    pub fn state(&self, connection_id: ConnectionId) -> Option<ConnectionState> {
        self.connections.get(&connection_id).copied()
    }

    /// Overwrite the state of a registered connection.
    ///
    /// Returns `false` if the connection isn't registered.
    pub fn set_state(&mut self, connection_id: ConnectionId, state: ConnectionState) -> bool {
        match self.connections.get_mut(&connection_id) {
            Some(slot) => {
                *slot = state;
                true
            },
            None => false,
        }
    }

    /// Check if a connection is registered.
    pub fn contains(&self, connection_id: ConnectionId) -> bool {
        self.connections.contains_key(&connection_id)
    }

    /// Number of live connections.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// No live connections.
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// All connections with their state, in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (ConnectionId, ConnectionState)> + '_ {
        self.connections.iter().map(|(id, state)| (*id, *state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: u64) -> ConnectionId {
        ConnectionId::new(raw)
    }

    #[test]
    fn register_starts_idle() {
        let mut registry = ConnectionRegistry::new();

        assert!(registry.register(id(1)));
        assert_eq!(registry.state(id(1)), Some(ConnectionState::Idle));
        assert_eq!(registry.state(id(2)), None);
    }

    #[test]
    fn register_duplicate_fails() {
        let mut registry = ConnectionRegistry::new();

        assert!(registry.register(id(1)));
        registry.set_state(id(1), ConnectionState::Queued);

        assert!(!registry.register(id(1)));
        assert_eq!(registry.state(id(1)), Some(ConnectionState::Queued));
    }

    #[test]
    fn set_state_requires_registration() {
        let mut registry = ConnectionRegistry::new();

        assert!(!registry.set_state(id(1), ConnectionState::Queued));
        assert!(registry.is_empty());
    }

    #[test]
    fn unregister_returns_last_state() {
        let mut registry = ConnectionRegistry::new();
        let room = RoomId::derive(id(1), id(2));

        registry.register(id(1));
        registry.set_state(id(1), ConnectionState::Paired(room));

        assert_eq!(registry.unregister(id(1)), Some(ConnectionState::Paired(room)));
        assert!(!registry.contains(id(1)));
        assert_eq!(registry.unregister(id(1)), None);
    }
}
