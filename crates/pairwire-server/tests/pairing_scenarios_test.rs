//! End-to-end pairing scenarios against the Sans-IO driver.
//!
//! Each test drives `ServerDriver` directly with events and resolves room
//! broadcasts through the session directory, the same way the WebSocket
//! runtime does.

use std::collections::HashMap;

use pairwire_proto::{
    ChatRequest, ChatSender, ClientMessage, ConnectionId, RelayedChat, RelayedSignal, RoomId,
    ServerMessage, SignalRequest,
};
use pairwire_server::{
    ConnectionState, DriverConfig, DriverError, ServerAction, ServerDriver, ServerEvent,
    SystemEnv,
};
use serde_json::json;

/// Driver plus per-connection inboxes.
struct Scenario {
    driver: ServerDriver<SystemEnv>,
    inboxes: HashMap<ConnectionId, Vec<ServerMessage>>,
}

impl Scenario {
    fn new() -> Self {
        Self {
            driver: ServerDriver::new(SystemEnv::new(), DriverConfig::default()),
            inboxes: HashMap::new(),
        }
    }

    fn connect(&mut self, n: u64) -> ConnectionId {
        let connection_id = ConnectionId::new(n);
        self.event(ServerEvent::ConnectionAccepted { connection_id });
        connection_id
    }

    fn send(&mut self, connection_id: ConnectionId, message: ClientMessage) {
        self.event(ServerEvent::MessageReceived { connection_id, message });
    }

    fn close(&mut self, connection_id: ConnectionId) {
        self.event(ServerEvent::ConnectionClosed {
            connection_id,
            reason: "socket closed".to_string(),
        });
    }

    fn event(&mut self, event: ServerEvent) {
        let actions = self.driver.process_event(event).unwrap();
        for action in actions {
            match action {
                ServerAction::SendToConnection { connection_id, message } => {
                    self.inboxes.entry(connection_id).or_default().push(message);
                },
                ServerAction::BroadcastToRoom { room_id, message, exclude_connection } => {
                    let members: Vec<_> = self.driver.sessions_in_room(room_id).collect();
                    for member in members {
                        if Some(member) != exclude_connection {
                            self.inboxes.entry(member).or_default().push(message.clone());
                        }
                    }
                },
                ServerAction::CloseConnection { .. } | ServerAction::Log { .. } => {},
            }
        }
    }

    fn take(&mut self, connection_id: ConnectionId) -> Vec<ServerMessage> {
        self.inboxes.remove(&connection_id).unwrap_or_default()
    }
}

fn offer() -> serde_json::Value {
    json!({ "type": "offer", "sdp": "v=0" })
}

#[test]
fn basic_match() {
    let mut s = Scenario::new();
    let x = s.connect(1);
    let y = s.connect(2);

    s.send(x, ClientMessage::JoinQueue);
    assert_eq!(s.take(x), vec![ServerMessage::WaitingForMatch]);
    assert_eq!(s.driver.queued().collect::<Vec<_>>(), vec![x]);

    s.send(y, ClientMessage::JoinQueue);
    let room_id = RoomId::derive(x, y);

    let x_inbox = s.take(x);
    let y_inbox = s.take(y);
    assert_eq!(x_inbox.len(), 2);
    assert_eq!(y_inbox.len(), 2);
    assert!(matches!(&x_inbox[0], ServerMessage::MatchFound(found) if found.room_id == room_id));
    assert!(matches!(&y_inbox[0], ServerMessage::MatchFound(found) if found.room_id == room_id));
    assert_eq!(x_inbox[1], ServerMessage::IsInitiator(false));
    assert_eq!(y_inbox[1], ServerMessage::IsInitiator(true));

    assert_eq!(s.driver.queued().count(), 0);
    assert_eq!(s.driver.connection_state(x), Some(ConnectionState::Paired(room_id)));
    assert_eq!(s.driver.connection_state(y), Some(ConnectionState::Paired(room_id)));
}

#[test]
fn signal_reaches_partner_only() {
    let mut s = Scenario::new();
    let x = s.connect(1);
    let y = s.connect(2);
    let z = s.connect(3);
    s.send(x, ClientMessage::JoinQueue);
    s.send(y, ClientMessage::JoinQueue);
    s.take(x);
    s.take(y);

    s.send(y, ClientMessage::Signal(SignalRequest { target: None, signal: offer() }));

    assert_eq!(s.take(x), vec![ServerMessage::Signal(RelayedSignal {
        sender: y,
        signal: offer(),
    })]);
    assert!(s.take(y).is_empty());
    assert!(s.take(z).is_empty());
}

#[test]
fn signal_target_is_not_used_for_routing() {
    let mut s = Scenario::new();
    let x = s.connect(1);
    let y = s.connect(2);
    let z = s.connect(3);
    s.send(x, ClientMessage::JoinQueue);
    s.send(y, ClientMessage::JoinQueue);
    s.take(x);
    s.take(y);

    let request = SignalRequest { target: Some(z.to_string()), signal: offer() };
    s.send(y, ClientMessage::Signal(request));

    assert_eq!(s.take(x).len(), 1);
    assert!(s.take(z).is_empty());
}

#[test]
fn chat_relay_uses_partner_label() {
    let mut s = Scenario::new();
    let x = s.connect(1);
    let y = s.connect(2);
    s.send(x, ClientMessage::JoinQueue);
    s.send(y, ClientMessage::JoinQueue);
    s.take(x);
    s.take(y);

    s.send(x, ClientMessage::SendMessage(ChatRequest { text: "hi".into() }));

    assert_eq!(s.take(y), vec![ServerMessage::ReceiveMessage(RelayedChat {
        sender: ChatSender::Partner,
        text: "hi".into(),
    })]);
    assert!(s.take(x).is_empty());
}

#[test]
fn unpaired_relay_is_dropped() {
    let mut s = Scenario::new();
    let x = s.connect(1);
    let y = s.connect(2);
    s.send(y, ClientMessage::JoinQueue);
    s.take(y);

    s.send(x, ClientMessage::Signal(SignalRequest { target: None, signal: offer() }));
    s.send(x, ClientMessage::SendMessage(ChatRequest { text: "anyone?".into() }));

    assert!(s.take(x).is_empty());
    assert!(s.take(y).is_empty());
}

#[test]
fn disconnect_cleans_up_both_sides() {
    let mut s = Scenario::new();
    let x = s.connect(1);
    let y = s.connect(2);
    s.send(x, ClientMessage::JoinQueue);
    s.send(y, ClientMessage::JoinQueue);
    s.take(x);
    s.take(y);

    s.close(y);

    assert_eq!(s.take(x), vec![ServerMessage::PartnerDisconnected]);
    assert!(!s.driver.has_connection(y));
    assert_eq!(s.driver.connection_state(x), Some(ConnectionState::Idle));
    assert!(s.driver.session_of(x).is_none());
    assert!(s.driver.session_of(y).is_none());
    assert_eq!(s.driver.stats().sessions, 0);

    // The survivor must re-join explicitly.
    assert_eq!(s.driver.queued().count(), 0);
    s.send(x, ClientMessage::JoinQueue);
    assert_eq!(s.take(x), vec![ServerMessage::WaitingForMatch]);
}

#[test]
fn leave_room_notifies_partner_and_keeps_connections() {
    let mut s = Scenario::new();
    let x = s.connect(1);
    let y = s.connect(2);
    s.send(x, ClientMessage::JoinQueue);
    s.send(y, ClientMessage::JoinQueue);
    s.take(x);
    s.take(y);

    s.send(x, ClientMessage::LeaveRoom);

    assert_eq!(s.take(y), vec![ServerMessage::PartnerDisconnected]);
    assert!(s.take(x).is_empty());
    assert!(s.driver.has_connection(x));
    assert_eq!(s.driver.connection_state(x), Some(ConnectionState::Idle));
    assert_eq!(s.driver.connection_state(y), Some(ConnectionState::Idle));

    // Relays no longer cross between the former partners.
    s.send(y, ClientMessage::SendMessage(ChatRequest { text: "still there?".into() }));
    assert!(s.take(x).is_empty());
}

#[test]
fn fifo_fairness() {
    let mut s = Scenario::new();
    let a = s.connect(1);
    let b = s.connect(2);
    let c = s.connect(3);
    let d = s.connect(4);

    for id in [a, b, c, d] {
        s.send(id, ClientMessage::JoinQueue);
    }

    assert_eq!(s.driver.session_of(a).and_then(|session| session.partner_of(a)), Some(b));
    assert_eq!(s.driver.session_of(c).and_then(|session| session.partner_of(c)), Some(d));
    assert_eq!(s.take(b).last(), Some(&ServerMessage::IsInitiator(true)));
    assert_eq!(s.take(d).last(), Some(&ServerMessage::IsInitiator(true)));
    assert_eq!(s.take(a).last(), Some(&ServerMessage::IsInitiator(false)));
    assert_eq!(s.take(c).last(), Some(&ServerMessage::IsInitiator(false)));
}

#[test]
fn queued_disconnect_is_not_matched() {
    let mut s = Scenario::new();
    let a = s.connect(1);
    let b = s.connect(2);
    let c = s.connect(3);

    s.send(a, ClientMessage::JoinQueue);
    s.close(a);
    s.send(b, ClientMessage::JoinQueue);

    assert_eq!(s.take(b), vec![ServerMessage::WaitingForMatch]);

    s.send(c, ClientMessage::JoinQueue);
    assert_eq!(s.driver.session_of(b).and_then(|session| session.partner_of(b)), Some(c));
}

#[test]
fn repeated_join_does_not_duplicate() {
    let mut s = Scenario::new();
    let a = s.connect(1);

    s.send(a, ClientMessage::JoinQueue);
    s.send(a, ClientMessage::JoinQueue);

    assert_eq!(s.take(a), vec![ServerMessage::WaitingForMatch]);
    assert_eq!(s.driver.queued().count(), 1);
}

#[test]
fn message_from_unknown_connection_is_an_error() {
    let mut driver = ServerDriver::new(SystemEnv::new(), DriverConfig::default());
    let stranger = ConnectionId::new(99);

    let result = driver.process_event(ServerEvent::MessageReceived {
        connection_id: stranger,
        message: ClientMessage::JoinQueue,
    });

    assert!(matches!(result, Err(DriverError::ConnectionNotFound(id)) if id == stranger));
}
