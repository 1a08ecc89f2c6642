//! Observable state snapshots for invariant checking.
//!
//! Invariants operate on snapshots rather than live state so every check in
//! a registry sees the same moment.

use pairwire_proto::{ConnectionId, RoomId};
use pairwire_server::{ConnectionState, Environment, ServerDriver, Session};

use crate::sim_server::{DeliveryRecord, SimServer};

/// Snapshot of the pairing state plus, when available, the delivery log.
#[derive(Debug, Clone, Default)]
pub struct SystemSnapshot {
    /// Every registered connection with its state.
    pub connections: Vec<(ConnectionId, ConnectionState)>,
    /// Matchmaking queue, head first.
    pub queue: Vec<ConnectionId>,
    /// Active sessions.
    pub sessions: Vec<Session>,
    /// Directory's connection → room entries.
    pub directory: Vec<(ConnectionId, RoomId)>,
    /// Messages delivered so far. Empty when built from a bare driver.
    pub deliveries: Vec<DeliveryRecord>,
}

impl SystemSnapshot {
    /// Snapshot with nothing in it.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Capture a driver's pairing state.
    pub fn from_driver<E: Environment>(driver: &ServerDriver<E>) -> Self {
        let matchmaker = driver.matchmaker();
        Self {
            connections: matchmaker.registry().iter().collect(),
            queue: matchmaker.queue().iter().collect(),
            sessions: matchmaker.directory().sessions().copied().collect(),
            directory: matchmaker.directory().member_entries().collect(),
            deliveries: Vec::new(),
        }
    }

    /// Capture a simulated server, including its delivery log.
    pub fn from_sim(sim: &SimServer) -> Self {
        Self { deliveries: sim.deliveries().to_vec(), ..Self::from_driver(sim.driver()) }
    }

    /// Recorded state of a connection.
    pub fn state_of(&self, connection_id: ConnectionId) -> Option<ConnectionState> {
        self.connections.iter().find(|(id, _)| *id == connection_id).map(|(_, state)| *state)
    }

    /// Room a connection is filed under in the directory.
    pub fn room_of(&self, connection_id: ConnectionId) -> Option<RoomId> {
        self.directory.iter().find(|(id, _)| *id == connection_id).map(|(_, room)| *room)
    }
}
