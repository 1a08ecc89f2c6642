//! Pairwire wire protocol.
//!
//! Participants talk to the server over a text channel carrying JSON
//! envelopes of the form `{"event": <name>, "data": <payload>}`. Inbound
//! envelopes decode into [`ClientMessage`], outbound ones encode from
//! [`ServerMessage`].
//!
//! Negotiation payloads (offers, answers, connectivity candidates) are carried
//! as opaque [`serde_json::Value`]s. Nothing in this crate inspects them.
//!
//! # Identifiers
//!
//! - [`ConnectionId`]: transient, per-connection, 16 hex digits on the wire
//! - [`RoomId`]: derived from the two member ids, 32 hex digits on the wire

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod errors;
mod ids;
mod message;

pub use errors::{ProtocolError, Result};
pub use ids::{ConnectionId, RoomId};
pub use message::{
    ChatRequest, ChatSender, ClientMessage, MatchFound, RelayedChat, RelayedSignal, ServerMessage,
    SignalRequest,
};
