//! Operations for model-based testing.
//!
//! Operations are generated randomly by proptest (or `arbitrary` in fuzzing)
//! and applied to both the model and the real implementation.

use arbitrary::Arbitrary;

/// Client identifier (0-indexed).
pub type ClientId = u8;

/// Operations that can be applied to the system.
///
/// Operations addressed to a client that isn't connected (or a `Connect` for
/// one that is) are no-ops on both sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Arbitrary)]
pub enum Operation {
    /// Open a connection for the client.
    Connect {
        /// Client connecting.
        client_id: ClientId,
    },

    /// Drop the client's connection.
    Disconnect {
        /// Client disconnecting.
        client_id: ClientId,
    },

    /// Send `join_queue`.
    JoinQueue {
        /// Client joining.
        client_id: ClientId,
    },

    /// Send `leave_room`.
    LeaveRoom {
        /// Client leaving.
        client_id: ClientId,
    },

    /// Send a signal payload tagged with `seq`.
    Signal {
        /// Client signalling.
        client_id: ClientId,
        /// Payload marker, echoed in the relayed copy.
        seq: u16,
    },

    /// Send a chat message tagged with `seq`.
    SendMessage {
        /// Client chatting.
        client_id: ClientId,
        /// Message marker, echoed in the relayed copy.
        seq: u16,
    },
}

impl Operation {
    /// Client the operation is addressed to.
    pub fn client_id(&self) -> ClientId {
        match *self {
            Self::Connect { client_id }
            | Self::Disconnect { client_id }
            | Self::JoinQueue { client_id }
            | Self::LeaveRoom { client_id }
            | Self::Signal { client_id, .. }
            | Self::SendMessage { client_id, .. } => client_id,
        }
    }

    /// Same operation, addressed to `client_id % num_clients`.
    pub fn clamp(self, num_clients: usize) -> Self {
        let bound = num_clients.clamp(1, usize::from(u8::MAX) + 1);
        let client_id = (usize::from(self.client_id()) % bound) as ClientId;
        match self {
            Self::Connect { .. } => Self::Connect { client_id },
            Self::Disconnect { .. } => Self::Disconnect { client_id },
            Self::JoinQueue { .. } => Self::JoinQueue { client_id },
            Self::LeaveRoom { .. } => Self::LeaveRoom { client_id },
            Self::Signal { seq, .. } => Self::Signal { client_id, seq },
            Self::SendMessage { seq, .. } => Self::SendMessage { client_id, seq },
        }
    }
}
