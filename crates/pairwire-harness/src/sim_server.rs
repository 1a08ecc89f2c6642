//! In-memory server runtime.
//!
//! Executes [`ServerAction`]s the way the production runtime does, but into
//! per-connection inboxes instead of sockets. Room broadcasts are resolved
//! through the driver's session directory at execution time, exactly like
//! production.

use std::collections::{HashMap, HashSet};

use pairwire_proto::{ClientMessage, ConnectionId, ServerMessage};
use pairwire_server::{
    DriverConfig, DriverError, Environment, LogLevel, ServerAction, ServerDriver, ServerEvent,
};

use crate::sim_env::SimEnv;

/// One message handed to a connection.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryRecord {
    /// Connection whose event caused the delivery, if any.
    pub trigger: Option<ConnectionId>,
    /// Connection the message was delivered to.
    pub recipient: ConnectionId,
    /// The message.
    pub message: ServerMessage,
}

/// Simulated server: real driver, fake transport.
#[derive(Debug)]
pub struct SimServer {
    driver: ServerDriver<SimEnv>,
    env: SimEnv,
    live: HashSet<ConnectionId>,
    inboxes: HashMap<ConnectionId, Vec<ServerMessage>>,
    deliveries: Vec<DeliveryRecord>,
    closed: Vec<(ConnectionId, String)>,
    logs: Vec<(LogLevel, String)>,
}

impl SimServer {
    /// Server with default configuration.
    pub fn new(seed: u64) -> Self {
        Self::with_config(seed, DriverConfig::default())
    }

    /// Server with the given driver configuration.
    pub fn with_config(seed: u64, config: DriverConfig) -> Self {
        let env = SimEnv::with_seed(seed);
        Self {
            driver: ServerDriver::new(env.clone(), config),
            env,
            live: HashSet::new(),
            inboxes: HashMap::new(),
            deliveries: Vec::new(),
            closed: Vec::new(),
            logs: Vec::new(),
        }
    }

    /// Open a connection with a fresh id drawn from the environment.
    ///
    /// The connection may have been refused (see [`SimServer::closed`]).
    pub fn connect(&mut self) -> Result<ConnectionId, DriverError> {
        let connection_id = ConnectionId::new(self.env.random_u64());
        self.connect_as(connection_id)?;
        Ok(connection_id)
    }

    /// Open a connection with a chosen id.
    pub fn connect_as(&mut self, connection_id: ConnectionId) -> Result<(), DriverError> {
        let actions = self.driver.process_event(ServerEvent::ConnectionAccepted { connection_id })?;
        if self.driver.has_connection(connection_id) {
            self.live.insert(connection_id);
            self.inboxes.entry(connection_id).or_default();
        }
        self.execute(Some(connection_id), actions);
        Ok(())
    }

    /// Deliver a client message.
    pub fn send(
        &mut self,
        connection_id: ConnectionId,
        message: ClientMessage,
    ) -> Result<(), DriverError> {
        let actions =
            self.driver.process_event(ServerEvent::MessageReceived { connection_id, message })?;
        self.execute(Some(connection_id), actions);
        Ok(())
    }

    /// Drop a connection.
    pub fn disconnect(&mut self, connection_id: ConnectionId) -> Result<(), DriverError> {
        self.live.remove(&connection_id);
        let actions = self.driver.process_event(ServerEvent::ConnectionClosed {
            connection_id,
            reason: "simulated disconnect".to_string(),
        })?;
        self.execute(Some(connection_id), actions);
        Ok(())
    }

    /// Run a housekeeping tick.
    pub fn tick(&mut self) -> Result<(), DriverError> {
        let actions = self.driver.process_event(ServerEvent::Tick)?;
        self.execute(None, actions);
        Ok(())
    }

    /// Messages received by a connection so far.
    pub fn inbox(&self, connection_id: ConnectionId) -> &[ServerMessage] {
        self.inboxes.get(&connection_id).map_or(&[], Vec::as_slice)
    }

    /// Take and clear a connection's inbox.
    pub fn take_inbox(&mut self, connection_id: ConnectionId) -> Vec<ServerMessage> {
        self.inboxes.get_mut(&connection_id).map(std::mem::take).unwrap_or_default()
    }

    /// Every delivery so far, in order.
    pub fn deliveries(&self) -> &[DeliveryRecord] {
        &self.deliveries
    }

    /// Connections the driver asked to close, with the reason.
    pub fn closed(&self) -> &[(ConnectionId, String)] {
        &self.closed
    }

    /// Log lines emitted at `Error` level.
    pub fn error_logs(&self) -> impl Iterator<Item = &str> + '_ {
        self.logs
            .iter()
            .filter(|(level, _)| *level == LogLevel::Error)
            .map(|(_, message)| message.as_str())
    }

    /// The driver under test.
    pub fn driver(&self) -> &ServerDriver<SimEnv> {
        &self.driver
    }

    /// The simulation environment.
    pub fn env(&self) -> &SimEnv {
        &self.env
    }

    fn execute(&mut self, trigger: Option<ConnectionId>, actions: Vec<ServerAction>) {
        for action in actions {
            match action {
                ServerAction::SendToConnection { connection_id, message } => {
                    self.deliver(trigger, connection_id, message);
                },
                ServerAction::BroadcastToRoom { room_id, message, exclude_connection } => {
                    let members: Vec<_> = self.driver.sessions_in_room(room_id).collect();
                    for connection_id in members {
                        if Some(connection_id) != exclude_connection {
                            self.deliver(trigger, connection_id, message.clone());
                        }
                    }
                },
                ServerAction::CloseConnection { connection_id, reason } => {
                    self.live.remove(&connection_id);
                    self.closed.push((connection_id, reason));
                },
                ServerAction::Log { level, message, .. } => {
                    self.logs.push((level, message));
                },
            }
        }
    }

    fn deliver(
        &mut self,
        trigger: Option<ConnectionId>,
        recipient: ConnectionId,
        message: ServerMessage,
    ) {
        if !self.live.contains(&recipient) {
            return;
        }
        self.inboxes.entry(recipient).or_default().push(message.clone());
        self.deliveries.push(DeliveryRecord { trigger, recipient, message });
    }
}
