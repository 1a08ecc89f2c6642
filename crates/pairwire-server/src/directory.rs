//! Session directory.
//!
//! The directory keeps two maps: room → session (the member pair) and
//! connection → room. Sessions are inserted and dissolved as a unit, so a
//! member entry never outlives its session and both members always point at
//! the same room. Finding a leaving connection's partner is an O(1) lookup
//! through the session, never a scan.

use std::collections::HashMap;

use pairwire_proto::{ConnectionId, RoomId};

/// An active pairing of exactly two connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    /// Room identifier derived from both members.
    pub room_id: RoomId,
    /// Member that was already waiting. Answers the handshake.
    pub receiver: ConnectionId,
    /// Member that arrived second. Starts the handshake.
    pub initiator: ConnectionId,
}

impl Session {
    /// Pair a waiting connection with a new arrival.
    pub fn new(receiver: ConnectionId, initiator: ConnectionId) -> Self {
        Self { room_id: RoomId::derive(receiver, initiator), receiver, initiator }
    }

    /// Both members, receiver first.
    pub fn members(&self) -> [ConnectionId; 2] {
        [self.receiver, self.initiator]
    }

    /// Check if a connection belongs to this session.
    pub fn contains(&self, connection_id: ConnectionId) -> bool {
        self.receiver == connection_id || self.initiator == connection_id
    }

    /// The other member. `None` if `connection_id` isn't a member.
    pub fn partner_of(&self, connection_id: ConnectionId) -> Option<ConnectionId> {
        if connection_id == self.receiver {
            Some(self.initiator)
        } else if connection_id == self.initiator {
            Some(self.receiver)
        } else {
            None
        }
    }

    /// Whether `connection_id` holds the initiator role.
    pub fn is_initiator(&self, connection_id: ConnectionId) -> bool {
        self.initiator == connection_id
    }
}

/// Symmetric mapping between paired connections and their sessions.
#[derive(Debug, Default)]
pub struct SessionDirectory {
    sessions: HashMap<RoomId, Session>,
    members: HashMap<ConnectionId, RoomId>,
}

impl SessionDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a session and both of its member entries.
    ///
    /// Returns `false` without touching the directory if the members are the
    /// same connection, either member is already paired, or the room is
    /// taken.
    pub fn insert(&mut self, session: Session) -> bool {
        if session.receiver == session.initiator
            || self.members.contains_key(&session.receiver)
            || self.members.contains_key(&session.initiator)
            || self.sessions.contains_key(&session.room_id)
        {
            return false;
        }

        self.members.insert(session.receiver, session.room_id);
        self.members.insert(session.initiator, session.room_id);
        self.sessions.insert(session.room_id, session);
        true
    }

    /// Remove the session `connection_id` belongs to, together with both
    /// member entries.
    pub fn dissolve(&mut self, connection_id: ConnectionId) -> Option<Session> {
        let room_id = *self.members.get(&connection_id)?;
        let session = self.sessions.remove(&room_id)?;

        for member in session.members() {
            self.members.remove(&member);
        }
        Some(session)
    }

    /// Session a connection belongs to.
    pub fn session_of(&self, connection_id: ConnectionId) -> Option<&Session> {
        let room_id = self.members.get(&connection_id)?;
        self.sessions.get(room_id)
    }

    /// Room a connection is mapped to.
    pub fn room_of(&self, connection_id: ConnectionId) -> Option<RoomId> {
        self.members.get(&connection_id).copied()
    }

    /// Session by room.
    pub fn session(&self, room_id: RoomId) -> Option<&Session> {
        self.sessions.get(&room_id)
    }

    /// The other member of a connection's session.
    pub fn partner_of(&self, connection_id: ConnectionId) -> Option<ConnectionId> {
        self.session_of(connection_id)?.partner_of(connection_id)
    }

    /// Members of a room. Empty if the room doesn't exist.
    pub fn members_of(&self, room_id: RoomId) -> impl Iterator<Item = ConnectionId> + '_ {
        self.sessions.get(&room_id).into_iter().flat_map(Session::members)
    }

    /// All live sessions, in arbitrary order.
    pub fn sessions(&self) -> impl Iterator<Item = &Session> + '_ {
        self.sessions.values()
    }

    /// All member entries, in arbitrary order.
    pub fn member_entries(&self) -> impl Iterator<Item = (ConnectionId, RoomId)> + '_ {
        self.members.iter().map(|(id, room)| (*id, *room))
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// No live sessions.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
