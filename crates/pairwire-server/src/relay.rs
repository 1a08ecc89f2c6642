//! Signal and chat relay between session members.
//!
//! The relay resolves the recipient through session membership and never
//! addresses the sender. Payloads are forwarded untouched.

use pairwire_proto::{ChatSender, ConnectionId, RelayedChat, RelayedSignal, ServerMessage};
use serde_json::Value;

use crate::matchmaker::Matchmaker;

/// A message to forward to the sender's partner.
#[derive(Debug, Clone, PartialEq)]
pub struct Relay {
    /// The other member of the sender's session.
    pub recipient: ConnectionId,
    /// Message to deliver.
    pub message: ServerMessage,
}

/// Forward a negotiation payload, tagged with the sender's id.
///
/// `None` if the sender isn't paired.
pub fn relay_signal(matchmaker: &Matchmaker, sender: ConnectionId, signal: Value) -> Option<Relay> {
    let (_, recipient) = matchmaker.partner_of(sender)?;
    Some(Relay { recipient, message: ServerMessage::Signal(RelayedSignal { sender, signal }) })
}

/// Forward chat text attributed to "partner".
///
/// The sender's own copy is rendered by its client. `None` if the sender
/// isn't paired.
pub fn relay_message(matchmaker: &Matchmaker, sender: ConnectionId, text: String) -> Option<Relay> {
    let (_, recipient) = matchmaker.partner_of(sender)?;
    Some(Relay {
        recipient,
        message: ServerMessage::ReceiveMessage(RelayedChat { sender: ChatSender::Partner, text }),
    })
}
