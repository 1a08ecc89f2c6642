//! Matchmaker: queue, session directory and disconnect coordination.
//!
//! The matchmaker is the single owner of pairing state. Every operation
//! leaves the registry, the queue and the directory in agreement:
//!
//! - a connection is `Queued` iff it is in the queue
//! - a connection is `Paired(room)` iff the directory maps it to `room`
//! - both members of a session map to that session
//! - no session pairs a connection with itself
//!
//! Operations are synchronous and run to completion. The caller (the driver)
//! serializes them, so no locking happens here.

use pairwire_proto::{ConnectionId, RoomId};
use thiserror::Error;

use crate::{
    directory::{Session, SessionDirectory},
    queue::MatchQueue,
    registry::{ConnectionRegistry, ConnectionState},
};

/// Result of a join-queue request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// Connection unknown or not idle. Nothing changed.
    Ignored,
    /// Queue was empty (or held only stale entries); the connection now waits.
    Waiting,
    /// Paired with the earliest waiter.
    Matched(Session),
}

/// Result of a leave (explicit or via disconnect).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// Connection was idle. Nothing changed.
    Idle,
    /// Connection was removed from the queue.
    LeftQueue,
    /// Session was dissolved. Both members are idle now.
    LeftSession(Session),
}

/// Pairing state counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MatchmakerStats {
    /// Live connections.
    pub connections: usize,
    /// Connections waiting for a partner.
    pub queued: usize,
    /// Live sessions.
    pub sessions: usize,
}

/// Internal inconsistency between registry, queue and directory.
///
/// Never expected at runtime. Reported by [`Matchmaker::check_invariants`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{invariant}: {message}")]
pub struct InvariantViolation {
    /// Short name of the broken invariant.
    pub invariant: &'static str,
    /// What was found.
    pub message: String,
}

impl InvariantViolation {
    fn new(invariant: &'static str, message: String) -> Self {
        Self { invariant, message }
    }
}

/// Owner of the connection registry, the queue and the session directory.
#[derive(Debug, Default)]
pub struct Matchmaker {
    registry: ConnectionRegistry,
    queue: MatchQueue,
    directory: SessionDirectory,
}

impl Matchmaker {
    /// Create an empty matchmaker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new connection as idle.
    ///
    /// Returns `false` if the connection is already registered.
    pub fn connect(&mut self, connection_id: ConnectionId) -> bool {
        self.registry.register(connection_id)
    }

    /// Pair `connection_id` with the earliest waiter, or queue it.
    ///
    /// Only idle connections may join. Queue heads that are no longer
    /// waiting (or equal `connection_id`) are dropped and the next head is
    /// tried; they indicate a bug elsewhere, never a reason to pair a
    /// connection with itself.
    pub fn join_queue(&mut self, connection_id: ConnectionId) -> JoinOutcome {
        if self.registry.state(connection_id) != Some(ConnectionState::Idle) {
            return JoinOutcome::Ignored;
        }

        while let Some(partner) = self.queue.pop_front() {
            if partner == connection_id
                || self.registry.state(partner) != Some(ConnectionState::Queued)
            {
                tracing::warn!(
                    %partner,
                    joiner = %connection_id,
                    state = ?self.registry.state(partner),
                    "discarding stale queue entry"
                );
                continue;
            }

            let session = Session::new(partner, connection_id);
            if !self.directory.insert(session) {
                tracing::error!(
                    %partner,
                    joiner = %connection_id,
                    room_id = %session.room_id,
                    "session directory refused new session"
                );
                self.queue.push_front(partner);
                break;
            }

            self.registry.set_state(partner, ConnectionState::Paired(session.room_id));
            self.registry.set_state(connection_id, ConnectionState::Paired(session.room_id));
            return JoinOutcome::Matched(session);
        }

        self.queue.push_back(connection_id);
        self.registry.set_state(connection_id, ConnectionState::Queued);
        JoinOutcome::Waiting
    }

    /// Leave the queue or dissolve the current session.
    ///
    /// The remaining partner of a dissolved session becomes idle; it is not
    /// re-queued.
    pub fn leave(&mut self, connection_id: ConnectionId) -> LeaveOutcome {
        match self.registry.state(connection_id) {
            None | Some(ConnectionState::Idle) => LeaveOutcome::Idle,
            Some(ConnectionState::Queued) => {
                self.queue.remove(connection_id);
                self.registry.set_state(connection_id, ConnectionState::Idle);
                LeaveOutcome::LeftQueue
            },
            Some(ConnectionState::Paired(room_id)) => {
                let Some(session) = self.directory.dissolve(connection_id) else {
                    tracing::error!(
                        %connection_id,
                        %room_id,
                        "paired connection has no session entry"
                    );
                    self.registry.set_state(connection_id, ConnectionState::Idle);
                    return LeaveOutcome::Idle;
                };

                for member in session.members() {
                    self.registry.set_state(member, ConnectionState::Idle);
                }
                LeaveOutcome::LeftSession(session)
            },
        }
    }

    /// Leave whatever the connection is in, then forget it.
    ///
    /// `None` if the connection wasn't registered.
    pub fn disconnect(&mut self, connection_id: ConnectionId) -> Option<LeaveOutcome> {
        if !self.registry.contains(connection_id) {
            return None;
        }
        let outcome = self.leave(connection_id);
        self.registry.unregister(connection_id);
        Some(outcome)
    }

    /// Room and partner of a paired connection.
    pub fn partner_of(&self, connection_id: ConnectionId) -> Option<(RoomId, ConnectionId)> {
        let session = self.directory.session_of(connection_id)?;
        let partner = session.partner_of(connection_id)?;
        Some((session.room_id, partner))
    }

    /// Pairing state of a connection. `None` if not registered.
    pub fn state(&self, connection_id: ConnectionId) -> Option<ConnectionState> {
        self.registry.state(connection_id)
    }

    /// Connection registry.
    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Matchmaking queue.
    pub fn queue(&self) -> &MatchQueue {
        &self.queue
    }

    /// Session directory.
    pub fn directory(&self) -> &SessionDirectory {
        &self.directory
    }

    /// Current counters.
    pub fn stats(&self) -> MatchmakerStats {
        MatchmakerStats {
            connections: self.registry.len(),
            queued: self.queue.len(),
            sessions: self.directory.len(),
        }
    }

    /// Verify that registry, queue and directory agree.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        let mut queued = 0usize;
        for connection_id in self.queue.iter() {
            queued += 1;
            if self.registry.state(connection_id) != Some(ConnectionState::Queued) {
                return Err(InvariantViolation::new(
                    "queue_membership",
                    format!(
                        "{connection_id} queued with state {:?}",
                        self.registry.state(connection_id)
                    ),
                ));
            }
        }

        for (connection_id, state) in self.registry.iter() {
            let in_queue = self.queue.contains(connection_id);
            let room = self.directory.room_of(connection_id);
            let consistent = match state {
                ConnectionState::Idle => !in_queue && room.is_none(),
                ConnectionState::Queued => in_queue && room.is_none(),
                ConnectionState::Paired(room_id) => !in_queue && room == Some(room_id),
            };
            if !consistent {
                return Err(InvariantViolation::new(
                    "state_exclusivity",
                    format!("{connection_id} is {state:?} but queued={in_queue} room={room:?}"),
                ));
            }
        }

        let states = self.registry.iter().filter(|(_, s)| *s == ConnectionState::Queued).count();
        if queued != states {
            return Err(InvariantViolation::new(
                "queue_uniqueness",
                format!("{queued} queue entries for {states} queued connections"),
            ));
        }

        for session in self.directory.sessions() {
            if session.receiver == session.initiator {
                return Err(InvariantViolation::new(
                    "no_self_pair",
                    format!("{} paired with itself in {}", session.receiver, session.room_id),
                ));
            }
            for member in session.members() {
                if self.directory.room_of(member) != Some(session.room_id) {
                    return Err(InvariantViolation::new(
                        "session_symmetry",
                        format!(
                            "{member} maps to {:?}, expected {}",
                            self.directory.room_of(member),
                            session.room_id
                        ),
                    ));
                }
            }
        }

        for (connection_id, room_id) in self.directory.member_entries() {
            let owned = self.directory.session(room_id).is_some_and(|s| s.contains(connection_id));
            if !owned {
                return Err(InvariantViolation::new(
                    "session_symmetry",
                    format!("{connection_id} maps to {room_id} which doesn't contain it"),
                ));
            }
        }

        Ok(())
    }
}
