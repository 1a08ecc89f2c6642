//! Server driver.
//!
//! Sans-IO dispatcher: turns transport events into matchmaker operations and
//! returns the sends, broadcasts and log lines the runtime must perform. Each
//! call to [`ServerDriver::process_event`] runs to completion before the next
//! one starts, which is what keeps queue and directory mutations consistent
//! without locking inside the core.

use std::time::Instant;

use pairwire_proto::{ClientMessage, ConnectionId, MatchFound, RoomId, ServerMessage};

use crate::{
    directory::Session,
    env::Environment,
    matchmaker::{JoinOutcome, LeaveOutcome, Matchmaker, MatchmakerStats},
    registry::ConnectionState,
    relay::{self, Relay},
    server_error::ServerError,
};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Maximum concurrent connections
    pub max_connections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { max_connections: 10_000 }
    }
}

/// Events that the server driver processes.
///
/// These are produced by the external runtime (simulation or production).
#[derive(Debug, Clone)]
pub enum ServerEvent {
    /// A new connection was accepted
    ConnectionAccepted {
        /// Unique connection ID assigned by the runtime
        connection_id: ConnectionId,
    },

    /// A decoded message arrived from a connection
    MessageReceived {
        /// Connection that sent the message
        connection_id: ConnectionId,
        /// The message
        message: ClientMessage,
    },

    /// A connection was closed (by peer or error)
    ConnectionClosed {
        /// Connection that was closed
        connection_id: ConnectionId,
        /// Reason for closure
        reason: String,
    },

    /// Periodic tick for housekeeping
    Tick,
}

/// Actions that the server driver produces.
///
/// These are executed by runtime-specific code (production or simulation).
/// Delivery is fire-and-forget: the driver never waits for confirmation.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerAction {
    /// Send a message to one connection
    SendToConnection {
        /// Target connection
        connection_id: ConnectionId,
        /// Message to send
        message: ServerMessage,
    },

    /// Send a message to every member of a room
    BroadcastToRoom {
        /// Target room
        room_id: RoomId,
        /// Message to broadcast
        message: ServerMessage,
        /// Optional member to skip
        exclude_connection: Option<ConnectionId>,
    },

    /// Close a connection
    CloseConnection {
        /// Connection to close
        connection_id: ConnectionId,
        /// Reason for closure
        reason: String,
    },

    /// Log a message (for debugging/monitoring)
    Log {
        /// Log level
        level: LogLevel,
        /// Message to log
        message: String,
        /// When the event occurred
        timestamp: Instant,
    },
}

/// Log levels for server actions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug information
    Debug,
    /// Informational message
    Info,
    /// Warning
    Warn,
    /// Error
    Error,
}

/// Action-based server driver.
///
/// Owns the [`Matchmaker`] and maps every inbound event to the outbound
/// actions it implies.
pub struct ServerDriver<E>
where
    E: Environment,
{
    /// Registry, queue and session directory
    matchmaker: Matchmaker,
    /// Environment (time, RNG)
    env: E,
    /// Server configuration
    config: ServerConfig,
}

impl<E> ServerDriver<E>
where
    E: Environment,
{
    /// Create a new server driver.
    pub fn new(env: E, config: ServerConfig) -> Self {
        Self { matchmaker: Matchmaker::new(), env, config }
    }

    /// Process a server event and return actions to execute.
    ///
    /// This is the main entry point for the server driver.
    pub fn process_event(&mut self, event: ServerEvent) -> Result<Vec<ServerAction>, ServerError> {
        let mut actions = match event {
            ServerEvent::ConnectionAccepted { connection_id } => {
                self.handle_connection_accepted(connection_id)?
            },
            ServerEvent::MessageReceived { connection_id, message } => {
                self.handle_message_received(connection_id, message)?
            },
            ServerEvent::ConnectionClosed { connection_id, reason } => {
                self.handle_connection_closed(connection_id, &reason)
            },
            ServerEvent::Tick => self.handle_tick(),
        };

        if cfg!(debug_assertions)
            && let Err(violation) = self.matchmaker.check_invariants()
        {
            actions.push(self.log(LogLevel::Error, format!("invariant violated: {violation}")));
        }

        Ok(actions)
    }

    /// Handle a new connection being accepted.
    fn handle_connection_accepted(
        &mut self,
        connection_id: ConnectionId,
    ) -> Result<Vec<ServerAction>, ServerError> {
        if self.matchmaker.registry().contains(connection_id) {
            return Err(ServerError::ConnectionAlreadyExists(connection_id));
        }

        if self.matchmaker.registry().len() >= self.config.max_connections {
            return Ok(vec![
                ServerAction::CloseConnection {
                    connection_id,
                    reason: "max connections exceeded".to_string(),
                },
                self.log(
                    LogLevel::Warn,
                    format!("rejecting connection {connection_id}: max connections exceeded"),
                ),
            ]);
        }

        self.matchmaker.connect(connection_id);

        Ok(vec![self.log(LogLevel::Debug, format!("connection {connection_id} accepted"))])
    }

    /// Handle a message received from a connection.
    fn handle_message_received(
        &mut self,
        connection_id: ConnectionId,
        message: ClientMessage,
    ) -> Result<Vec<ServerAction>, ServerError> {
        if !self.matchmaker.registry().contains(connection_id) {
            return Err(ServerError::ConnectionNotFound(connection_id));
        }

        let actions = match message {
            ClientMessage::JoinQueue => self.handle_join_queue(connection_id),
            ClientMessage::LeaveRoom => {
                let outcome = self.matchmaker.leave(connection_id);
                self.leave_actions(connection_id, outcome, "left")
            },
            ClientMessage::Signal(request) => {
                let relay = relay::relay_signal(&self.matchmaker, connection_id, request.signal);
                self.relay_actions(connection_id, relay, "signal")
            },
            ClientMessage::SendMessage(request) => {
                let relay = relay::relay_message(&self.matchmaker, connection_id, request.text);
                self.relay_actions(connection_id, relay, "send_message")
            },
        };

        Ok(actions)
    }

    fn handle_join_queue(&mut self, connection_id: ConnectionId) -> Vec<ServerAction> {
        let previous = self.matchmaker.state(connection_id);

        match self.matchmaker.join_queue(connection_id) {
            JoinOutcome::Ignored => vec![self.log(
                LogLevel::Debug,
                format!("join_queue from {connection_id} ignored in state {previous:?}"),
            )],
            JoinOutcome::Waiting => vec![
                ServerAction::SendToConnection {
                    connection_id,
                    message: ServerMessage::WaitingForMatch,
                },
                self.log(LogLevel::Debug, format!("{connection_id} waiting for match")),
            ],
            JoinOutcome::Matched(session) => self.session_formed(session),
        }
    }

    /// Announce a new session: `match_found` to the room, then each side's
    /// role. The member that was waiting receives, the joiner initiates.
    fn session_formed(&self, session: Session) -> Vec<ServerAction> {
        let room_id = session.room_id;

        vec![
            ServerAction::BroadcastToRoom {
                room_id,
                message: ServerMessage::MatchFound(MatchFound { room_id }),
                exclude_connection: None,
            },
            ServerAction::SendToConnection {
                connection_id: session.receiver,
                message: ServerMessage::IsInitiator(false),
            },
            ServerAction::SendToConnection {
                connection_id: session.initiator,
                message: ServerMessage::IsInitiator(true),
            },
            self.log(
                LogLevel::Info,
                format!(
                    "session {room_id} formed: receiver {}, initiator {}",
                    session.receiver, session.initiator
                ),
            ),
        ]
    }

    fn leave_actions(
        &self,
        connection_id: ConnectionId,
        outcome: LeaveOutcome,
        cause: &str,
    ) -> Vec<ServerAction> {
        match outcome {
            LeaveOutcome::Idle => vec![self.log(
                LogLevel::Debug,
                format!("{connection_id} {cause} while idle, nothing to clean up"),
            )],
            LeaveOutcome::LeftQueue => {
                vec![self.log(LogLevel::Debug, format!("{connection_id} {cause} the queue"))]
            },
            LeaveOutcome::LeftSession(session) => {
                let mut actions = Vec::with_capacity(2);
                if let Some(partner) = session.partner_of(connection_id)
                    && self.matchmaker.registry().contains(partner)
                {
                    actions.push(ServerAction::SendToConnection {
                        connection_id: partner,
                        message: ServerMessage::PartnerDisconnected,
                    });
                }
                actions.push(self.log(
                    LogLevel::Info,
                    format!("session {} dissolved: {connection_id} {cause}", session.room_id),
                ));
                actions
            },
        }
    }

    fn relay_actions(
        &self,
        sender: ConnectionId,
        relay: Option<Relay>,
        event: &str,
    ) -> Vec<ServerAction> {
        match relay {
            Some(Relay { recipient, message }) => {
                vec![ServerAction::SendToConnection { connection_id: recipient, message }]
            },
            None => vec![self.log(
                LogLevel::Debug,
                format!("{event} from unpaired connection {sender} dropped"),
            )],
        }
    }

    /// Handle a connection being closed.
    ///
    /// Runs the same cleanup as an explicit leave, then forgets the
    /// connection. Unknown connections are a no-op.
    fn handle_connection_closed(
        &mut self,
        connection_id: ConnectionId,
        reason: &str,
    ) -> Vec<ServerAction> {
        match self.matchmaker.disconnect(connection_id) {
            None => vec![self.log(
                LogLevel::Debug,
                format!("close for unknown connection {connection_id}: {reason}"),
            )],
            Some(outcome) => {
                let mut actions = self.leave_actions(connection_id, outcome, "disconnected");
                actions.push(
                    self.log(LogLevel::Debug, format!("connection {connection_id} closed: {reason}")),
                );
                actions
            },
        }
    }

    fn handle_tick(&self) -> Vec<ServerAction> {
        let stats = self.matchmaker.stats();
        vec![self.log(
            LogLevel::Debug,
            format!(
                "connections={} queued={} sessions={}",
                stats.connections, stats.queued, stats.sessions
            ),
        )]
    }

    fn log(&self, level: LogLevel, message: String) -> ServerAction {
        ServerAction::Log { level, message, timestamp: self.env.now() }
    }

    /// Pairing state of a connection. `None` if not connected.
    pub fn connection_state(&self, connection_id: ConnectionId) -> Option<ConnectionState> {
        self.matchmaker.state(connection_id)
    }

    /// Connection is registered.
    pub fn has_connection(&self, connection_id: ConnectionId) -> bool {
        self.matchmaker.registry().contains(connection_id)
    }

    /// Waiting connections, earliest first.
    pub fn queued(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.matchmaker.queue().iter()
    }

    /// Session a connection belongs to.
    pub fn session_of(&self, connection_id: ConnectionId) -> Option<&Session> {
        self.matchmaker.directory().session_of(connection_id)
    }

    /// All connections in a room.
    pub fn sessions_in_room(&self, room_id: RoomId) -> impl Iterator<Item = ConnectionId> + '_ {
        self.matchmaker.directory().members_of(room_id)
    }

    /// Number of active connections.
    pub fn connection_count(&self) -> usize {
        self.matchmaker.registry().len()
    }

    /// Current counters.
    pub fn stats(&self) -> MatchmakerStats {
        self.matchmaker.stats()
    }

    /// Underlying matchmaker, for inspection.
    pub fn matchmaker(&self) -> &Matchmaker {
        &self.matchmaker
    }
}

impl<E> std::fmt::Debug for ServerDriver<E>
where
    E: Environment,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stats = self.matchmaker.stats();
        f.debug_struct("ServerDriver")
            .field("connection_count", &stats.connections)
            .field("queued", &stats.queued)
            .field("session_count", &stats.sessions)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use pairwire_proto::{ChatRequest, SignalRequest};
    use serde_json::json;

    use super::*;

    #[derive(Clone)]
    struct TestEnv {}

    impl Environment for TestEnv {
        fn now(&self) -> Instant {
            // Using real Instant for simplicity in unit tests
            Instant::now()
        }

        fn random_bytes(&self, buffer: &mut [u8]) {
            buffer.fill(0x5a);
        }
    }

    fn id(raw: u64) -> ConnectionId {
        ConnectionId::new(raw)
    }

    fn driver() -> ServerDriver<TestEnv> {
        ServerDriver::new(TestEnv {}, ServerConfig::default())
    }

    fn accept(server: &mut ServerDriver<TestEnv>, raw: u64) {
        server.process_event(ServerEvent::ConnectionAccepted { connection_id: id(raw) }).unwrap();
    }

    fn send(
        server: &mut ServerDriver<TestEnv>,
        raw: u64,
        message: ClientMessage,
    ) -> Vec<ServerAction> {
        server
            .process_event(ServerEvent::MessageReceived { connection_id: id(raw), message })
            .unwrap()
    }

    fn non_log(actions: Vec<ServerAction>) -> Vec<ServerAction> {
        actions.into_iter().filter(|a| !matches!(a, ServerAction::Log { .. })).collect()
    }

    #[test]
    fn server_accepts_connection() {
        let mut server = driver();

        let actions =
            server.process_event(ServerEvent::ConnectionAccepted { connection_id: id(1) }).unwrap();

        assert_eq!(server.connection_count(), 1);
        assert_eq!(server.connection_state(id(1)), Some(ConnectionState::Idle));
        assert!(matches!(actions[0], ServerAction::Log { level: LogLevel::Debug, .. }));
    }

    #[test]
    fn server_rejects_when_max_connections_exceeded() {
        let config = ServerConfig { max_connections: 2 };
        let mut server = ServerDriver::new(TestEnv {}, config);

        accept(&mut server, 1);
        accept(&mut server, 2);

        let actions =
            server.process_event(ServerEvent::ConnectionAccepted { connection_id: id(3) }).unwrap();

        assert_eq!(server.connection_count(), 2);
        assert!(matches!(actions[0], ServerAction::CloseConnection { .. }));
        assert!(!server.has_connection(id(3)));
    }

    #[test]
    fn duplicate_connection_is_an_error() {
        let mut server = driver();
        accept(&mut server, 1);

        let result = server.process_event(ServerEvent::ConnectionAccepted { connection_id: id(1) });
        assert!(matches!(result, Err(ServerError::ConnectionAlreadyExists(_))));
    }

    #[test]
    fn message_from_unknown_connection_is_an_error() {
        let mut server = driver();

        let result = server.process_event(ServerEvent::MessageReceived {
            connection_id: id(9),
            message: ClientMessage::JoinQueue,
        });
        assert!(matches!(result, Err(ServerError::ConnectionNotFound(_))));
    }

    #[test]
    fn close_of_unknown_connection_is_noop() {
        let mut server = driver();

        let actions = server
            .process_event(ServerEvent::ConnectionClosed {
                connection_id: id(9),
                reason: "gone".to_string(),
            })
            .unwrap();

        assert!(non_log(actions).is_empty());
    }

    #[test]
    fn match_announces_room_and_roles() {
        let mut server = driver();
        accept(&mut server, 1);
        accept(&mut server, 2);

        let waiting = non_log(send(&mut server, 1, ClientMessage::JoinQueue));
        assert_eq!(waiting, vec![ServerAction::SendToConnection {
            connection_id: id(1),
            message: ServerMessage::WaitingForMatch,
        }]);

        let matched = non_log(send(&mut server, 2, ClientMessage::JoinQueue));
        let room_id = RoomId::derive(id(1), id(2));
        assert_eq!(matched, vec![
            ServerAction::BroadcastToRoom {
                room_id,
                message: ServerMessage::MatchFound(MatchFound { room_id }),
                exclude_connection: None,
            },
            ServerAction::SendToConnection {
                connection_id: id(1),
                message: ServerMessage::IsInitiator(false),
            },
            ServerAction::SendToConnection {
                connection_id: id(2),
                message: ServerMessage::IsInitiator(true),
            },
        ]);

        let members: Vec<_> = server.sessions_in_room(room_id).collect();
        assert_eq!(members, vec![id(1), id(2)]);
    }

    #[test]
    fn relay_reaches_only_partner() {
        let mut server = driver();
        accept(&mut server, 1);
        accept(&mut server, 2);
        send(&mut server, 1, ClientMessage::JoinQueue);
        send(&mut server, 2, ClientMessage::JoinQueue);

        let actions = non_log(send(
            &mut server,
            1,
            ClientMessage::Signal(SignalRequest {
                target: Some("whoever".to_string()),
                signal: json!({"type": "offer"}),
            }),
        ));
        assert!(matches!(
            actions.as_slice(),
            [ServerAction::SendToConnection { connection_id, .. }] if *connection_id == id(2)
        ));

        let actions = non_log(send(
            &mut server,
            2,
            ClientMessage::SendMessage(ChatRequest { text: "hi".to_string() }),
        ));
        assert!(matches!(
            actions.as_slice(),
            [ServerAction::SendToConnection { connection_id, .. }] if *connection_id == id(1)
        ));
    }

    #[test]
    fn leave_room_notifies_partner() {
        let mut server = driver();
        accept(&mut server, 1);
        accept(&mut server, 2);
        send(&mut server, 1, ClientMessage::JoinQueue);
        send(&mut server, 2, ClientMessage::JoinQueue);

        let actions = non_log(send(&mut server, 2, ClientMessage::LeaveRoom));

        assert_eq!(actions, vec![ServerAction::SendToConnection {
            connection_id: id(1),
            message: ServerMessage::PartnerDisconnected,
        }]);
        assert_eq!(server.connection_state(id(1)), Some(ConnectionState::Idle));
        assert_eq!(server.connection_state(id(2)), Some(ConnectionState::Idle));
    }

    #[test]
    fn tick_reports_stats() {
        let mut server = driver();
        accept(&mut server, 1);

        let actions = server.process_event(ServerEvent::Tick).unwrap();

        assert!(matches!(
            &actions[..],
            [ServerAction::Log { level: LogLevel::Debug, message, .. }]
                if message == "connections=1 queued=0 sessions=0"
        ));
    }
}
