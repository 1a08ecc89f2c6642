//! Client and server message envelopes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    errors::{ProtocolError, Result},
    ids::{ConnectionId, RoomId},
};

/// Messages sent by a participant to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Ask to be paired with the next available participant.
    JoinQueue,
    /// Leave the waiting queue or the current pairing.
    LeaveRoom,
    /// Negotiation payload destined for the current partner.
    Signal(SignalRequest),
    /// Chat text destined for the current partner.
    SendMessage(ChatRequest),
}

impl ClientMessage {
    /// Decode an inbound text frame.
    pub fn decode(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(ProtocolError::Decode)
    }

    /// Encode as a text frame. Used by clients and tests.
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }

    /// Short event name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::JoinQueue => "join_queue",
            Self::LeaveRoom => "leave_room",
            Self::Signal(_) => "signal",
            Self::SendMessage(_) => "send_message",
        }
    }
}

/// Payload of an inbound `signal` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalRequest {
    /// Recipient named by the client. Informational only: the server routes
    /// by session membership.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Opaque negotiation payload.
    pub signal: Value,
}

/// Payload of an inbound `send_message` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Chat text.
    pub text: String,
}

/// Messages sent by the server to a participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerMessage {
    /// The participant was queued and no partner is available yet.
    WaitingForMatch,
    /// A pairing session was formed.
    MatchFound(MatchFound),
    /// Whether this side starts the negotiation handshake.
    IsInitiator(bool),
    /// Negotiation payload relayed from the partner.
    Signal(RelayedSignal),
    /// Chat text relayed from the partner.
    ReceiveMessage(RelayedChat),
    /// The partner left or lost its connection.
    PartnerDisconnected,
}

impl ServerMessage {
    /// Encode as a text frame.
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }

    /// Decode a text frame. Used by clients and tests.
    pub fn decode(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(ProtocolError::Decode)
    }
}

/// Payload of `match_found`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchFound {
    /// Session both members now belong to.
    #[serde(rename = "roomId")]
    pub room_id: RoomId,
}

/// Payload of an outbound `signal` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayedSignal {
    /// Connection that produced the payload.
    pub sender: ConnectionId,
    /// The payload, unmodified.
    pub signal: Value,
}

/// Who a relayed chat message is attributed to.
///
/// The recipient never learns the sender's raw connection id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatSender {
    /// The other member of the session.
    Partner,
}

/// Payload of `receive_message`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayedChat {
    /// Always [`ChatSender::Partner`].
    pub sender: ChatSender,
    /// Chat text.
    pub text: String,
}
