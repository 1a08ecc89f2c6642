//! Standard pairing invariants.

use std::collections::HashSet;

use pairwire_proto::{RoomId, ServerMessage};
use pairwire_server::ConnectionState;

use super::{Invariant, InvariantResult, SystemSnapshot};

/// A connection appears in the queue at most once, and only while queued.
pub struct QueueUniqueness;

impl Invariant for QueueUniqueness {
    fn name(&self) -> &'static str {
        "queue_uniqueness"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        let mut seen = HashSet::new();
        for &connection_id in &state.queue {
            if !seen.insert(connection_id) {
                return Err(self.violation(format!("{connection_id} queued twice")));
            }
            if state.state_of(connection_id) != Some(ConnectionState::Queued) {
                return Err(self.violation(format!(
                    "{connection_id} in queue with state {:?}",
                    state.state_of(connection_id)
                )));
            }
        }
        Ok(())
    }
}

/// Queue membership and directory membership never overlap, and each agrees
/// with the registered state.
pub struct StateExclusivity;

impl Invariant for StateExclusivity {
    fn name(&self) -> &'static str {
        "state_exclusivity"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for &(connection_id, connection_state) in &state.connections {
            let queued = state.queue.contains(&connection_id);
            let room = state.room_of(connection_id);

            let consistent = match connection_state {
                ConnectionState::Idle => !queued && room.is_none(),
                ConnectionState::Queued => queued && room.is_none(),
                ConnectionState::Paired(room_id) => !queued && room == Some(room_id),
            };
            if !consistent {
                return Err(self.violation(format!(
                    "{connection_id} is {connection_state:?} but queued={queued} room={room:?}"
                )));
            }
        }

        for (connection_id, _) in &state.directory {
            if state.state_of(*connection_id).is_none() {
                return Err(
                    self.violation(format!("{connection_id} in directory but not registered"))
                );
            }
        }
        Ok(())
    }
}

/// Both members of a session map to it, and every directory entry belongs to
/// a live session containing that member.
pub struct SessionSymmetry;

impl Invariant for SessionSymmetry {
    fn name(&self) -> &'static str {
        "session_symmetry"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for session in &state.sessions {
            if session.room_id != RoomId::derive(session.receiver, session.initiator) {
                return Err(
                    self.violation(format!("room {} not derived from members", session.room_id))
                );
            }
            for member in session.members() {
                if state.room_of(member) != Some(session.room_id) {
                    return Err(self.violation(format!(
                        "{member} in room {} but directory says {:?}",
                        session.room_id,
                        state.room_of(member)
                    )));
                }
            }
        }

        for &(connection_id, room_id) in &state.directory {
            let owned = state
                .sessions
                .iter()
                .any(|session| session.room_id == room_id && session.contains(connection_id));
            if !owned {
                return Err(self.violation(format!(
                    "{connection_id} filed under room {room_id} with no matching session"
                )));
            }
        }

        if state.directory.len() != state.sessions.len() * 2 {
            return Err(self.violation(format!(
                "{} directory entries for {} sessions",
                state.directory.len(),
                state.sessions.len()
            )));
        }
        Ok(())
    }
}

/// A session never pairs a connection with itself.
pub struct NoSelfPair;

impl Invariant for NoSelfPair {
    fn name(&self) -> &'static str {
        "no_self_pair"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        match state.sessions.iter().find(|session| session.receiver == session.initiator) {
            Some(session) => {
                Err(self.violation(format!("{} paired with itself", session.receiver)))
            },
            None => Ok(()),
        }
    }
}

/// Signals and chat messages are never delivered back to their sender.
pub struct RelayExclusion;

impl Invariant for RelayExclusion {
    fn name(&self) -> &'static str {
        "relay_exclusion"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for record in &state.deliveries {
            let relayed = matches!(
                record.message,
                ServerMessage::Signal(_) | ServerMessage::ReceiveMessage(_)
            );
            if relayed && record.trigger == Some(record.recipient) {
                return Err(self.violation(format!(
                    "{} received its own relayed payload",
                    record.recipient
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pairwire_proto::{ConnectionId, RelayedSignal};
    use pairwire_server::Session;

    use super::*;
    use crate::sim_server::DeliveryRecord;

    fn id(n: u64) -> ConnectionId {
        ConnectionId::new(n)
    }

    fn paired_snapshot() -> SystemSnapshot {
        let session = Session::new(id(1), id(2));
        SystemSnapshot {
            connections: vec![
                (id(1), ConnectionState::Paired(session.room_id)),
                (id(2), ConnectionState::Paired(session.room_id)),
                (id(3), ConnectionState::Queued),
            ],
            queue: vec![id(3)],
            sessions: vec![session],
            directory: vec![(id(1), session.room_id), (id(2), session.room_id)],
            deliveries: Vec::new(),
        }
    }

    #[test]
    fn consistent_snapshot_passes() {
        let state = paired_snapshot();
        assert!(QueueUniqueness.check(&state).is_ok());
        assert!(StateExclusivity.check(&state).is_ok());
        assert!(SessionSymmetry.check(&state).is_ok());
        assert!(NoSelfPair.check(&state).is_ok());
    }

    #[test]
    fn duplicate_queue_entry_detected() {
        let mut state = paired_snapshot();
        state.queue.push(id(3));

        let violation = QueueUniqueness.check(&state).unwrap_err();
        assert_eq!(violation.invariant, "queue_uniqueness");
    }

    #[test]
    fn paired_and_queued_detected() {
        let mut state = paired_snapshot();
        state.queue.push(id(1));

        assert!(StateExclusivity.check(&state).is_err());
    }

    #[test]
    fn dangling_directory_entry_detected() {
        let mut state = paired_snapshot();
        state.directory.retain(|(connection_id, _)| *connection_id != id(2));

        assert!(SessionSymmetry.check(&state).is_err());
    }

    #[test]
    fn self_pair_detected() {
        let mut state = SystemSnapshot::empty();
        state.sessions.push(Session::new(id(7), id(7)));

        assert!(NoSelfPair.check(&state).is_err());
    }

    #[test]
    fn echoed_signal_detected() {
        let mut state = SystemSnapshot::empty();
        state.deliveries.push(DeliveryRecord {
            trigger: Some(id(1)),
            recipient: id(1),
            message: ServerMessage::Signal(RelayedSignal {
                sender: id(1),
                signal: serde_json::json!({"type": "offer"}),
            }),
        });

        assert!(RelayExclusion.check(&state).is_err());
    }

    #[test]
    fn match_found_to_trigger_is_allowed() {
        let mut state = SystemSnapshot::empty();
        state.deliveries.push(DeliveryRecord {
            trigger: Some(id(1)),
            recipient: id(1),
            message: ServerMessage::WaitingForMatch,
        });

        assert!(RelayExclusion.check(&state).is_ok());
    }
}
