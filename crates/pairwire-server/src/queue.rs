//! Matchmaking queue.
//!
//! Strict FIFO of connections waiting for a partner. A side set rejects
//! duplicates in O(1); removal from the middle (leave/disconnect while
//! waiting) is a linear scan of the queue.

use std::collections::{HashSet, VecDeque};

use pairwire_proto::ConnectionId;

/// FIFO of waiting connections without duplicates.
#[derive(Debug, Default)]
pub struct MatchQueue {
    order: VecDeque<ConnectionId>,
    members: HashSet<ConnectionId>,
}

impl MatchQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append to the back.
    ///
    /// Returns `false` (and leaves the queue untouched) if already queued.
    pub fn push_back(&mut self, connection_id: ConnectionId) -> bool {
        if !self.members.insert(connection_id) {
            return false;
        }
        self.order.push_back(connection_id);
        true
    }

    /// Put a connection back at the head.
    ///
    /// Returns `false` if already queued.
    pub fn push_front(&mut self, connection_id: ConnectionId) -> bool {
        if !self.members.insert(connection_id) {
            return false;
        }
        self.order.push_front(connection_id);
        true
    }

    /// Take the earliest waiter.
    pub fn pop_front(&mut self) -> Option<ConnectionId> {
        let head = self.order.pop_front()?;
        self.members.remove(&head);
        Some(head)
    }

    /// Remove a connection from any position.
    ///
    /// Returns `true` if it was queued.
    pub fn remove(&mut self, connection_id: ConnectionId) -> bool {
        if !self.members.remove(&connection_id) {
            return false;
        }
        self.order.retain(|queued| *queued != connection_id);
        true
    }

    /// Check if a connection is waiting.
    pub fn contains(&self, connection_id: ConnectionId) -> bool {
        self.members.contains(&connection_id)
    }

    /// Number of waiting connections.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Nobody is waiting.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Waiting connections, earliest first.
    pub fn iter(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.order.iter().copied()
    }
}
