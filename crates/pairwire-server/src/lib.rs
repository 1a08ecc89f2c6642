//! Pairwire production server.
//!
//! Pairs anonymous participants one-to-one and relays the negotiation
//! messages and chat text each pair needs, over WebSocket.
//!
//! # Architecture
//!
//! The pairing core is Sans-IO: [`ServerDriver`] consumes [`ServerEvent`]s
//! and returns [`ServerAction`]s without touching sockets or clocks directly.
//! [`Server`] is the production "glue" that feeds it events from
//! [`WsTransport`] connections and executes the resulting actions.
//!
//! # Components
//!
//! - [`Matchmaker`]: registry, FIFO queue and session directory; join, leave
//!   and disconnect cleanup
//! - [`relay`]: routes signals and chat text to the sender's partner
//! - [`ServerDriver`]: action-based dispatcher (pure logic, no I/O)
//! - [`Server`]: production runtime that executes driver actions
//! - [`WsTransport`]: WebSocket transport via tokio-tungstenite
//! - [`SystemEnv`]: production environment (real time, OS RNG)
//!
//! # Concurrency
//!
//! The driver sits behind a single async mutex. An event is processed and
//! its actions dispatched to per-connection outbound channels while the lock
//! is held, so events never interleave.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod directory;
mod driver;
pub mod env;
mod error;
mod matchmaker;
mod queue;
mod registry;
pub mod relay;
mod server_error;
mod system_env;
mod transport;

use std::{collections::HashMap, future::Future, net::SocketAddr, sync::Arc, time::Duration};

pub use directory::{Session, SessionDirectory};
pub use driver::{LogLevel, ServerAction, ServerConfig as DriverConfig, ServerDriver, ServerEvent};
pub use env::Environment;
pub use error::ServerError;
use futures::{SinkExt, StreamExt};
pub use matchmaker::{InvariantViolation, JoinOutcome, LeaveOutcome, Matchmaker, MatchmakerStats};
use pairwire_proto::{ClientMessage, ConnectionId, ServerMessage};
pub use queue::MatchQueue;
pub use registry::{ConnectionRegistry, ConnectionState};
pub use server_error::ServerError as DriverError;
pub use system_env::SystemEnv;
use tokio::sync::{Mutex, RwLock, mpsc};
use tokio_tungstenite::tungstenite::{
    Message,
    protocol::{CloseFrame, frame::coding::CloseCode},
};
pub use transport::{PendingConnection, WsStream, WsTransport};

/// Shared state for all connections.
///
/// Holds the outbound channel of every live connection for message routing.
struct SharedState {
    /// Map of connection ID to its outbound queue.
    /// All messages to a client go through this single channel, ensuring
    /// ordering.
    outbound: RwLock<HashMap<ConnectionId, mpsc::UnboundedSender<Message>>>,
}

type SharedDriver = Arc<Mutex<ServerDriver<SystemEnv>>>;

/// Server configuration for the production runtime.
#[derive(Debug, Clone)]
pub struct ServerRuntimeConfig {
    /// Address to bind to (e.g., "0.0.0.0:3000")
    pub bind_address: String,
    /// Largest accepted WebSocket message, in bytes
    pub max_message_bytes: usize,
    /// Interval between housekeeping ticks
    pub tick_interval: Duration,
    /// Driver configuration (limits)
    pub driver: DriverConfig,
}

impl Default for ServerRuntimeConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            max_message_bytes: 64 * 1024,
            tick_interval: Duration::from_secs(30),
            driver: DriverConfig::default(),
        }
    }
}

/// Production Pairwire server.
///
/// Wraps `ServerDriver` with WebSocket transport and system environment.
pub struct Server {
    /// The action-based server driver
    driver: ServerDriver<SystemEnv>,
    /// WebSocket listener
    transport: WsTransport,
    /// Environment
    env: SystemEnv,
    /// Housekeeping interval
    tick_interval: Duration,
}

impl Server {
    /// Create and bind a new server.
    pub async fn bind(config: ServerRuntimeConfig) -> Result<Self, ServerError> {
        let env = SystemEnv::new();
        let driver = ServerDriver::new(env.clone(), config.driver);
        let transport = WsTransport::bind(&config.bind_address, config.max_message_bytes).await?;

        Ok(Self { driver, transport, env, tick_interval: config.tick_interval })
    }

    /// Run the server, accepting connections and processing messages.
    ///
    /// This method runs until an unrecoverable error occurs.
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_until(std::future::pending()).await
    }

    /// Run the server until `shutdown` resolves.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        tracing::info!("Server starting on {}", self.transport.local_addr()?);

        let env = self.env;
        let transport = self.transport;
        let driver: SharedDriver = Arc::new(Mutex::new(self.driver));
        let shared = Arc::new(SharedState { outbound: RwLock::new(HashMap::new()) });

        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                accepted = transport.accept() => match accepted {
                    Ok(pending) => {
                        let driver = Arc::clone(&driver);
                        let shared = Arc::clone(&shared);
                        let env = env.clone();

                        tokio::spawn(async move {
                            let peer_addr = pending.peer_addr();
                            if let Err(e) = handle_connection(pending, driver, shared, env).await {
                                tracing::debug!("Connection error from {}: {}", peer_addr, e);
                            }
                        });
                    },
                    Err(e) => {
                        tracing::error!("Accept error: {}", e);
                    },
                },
                _ = ticker.tick() => {
                    dispatch(&driver, &shared, ServerEvent::Tick).await;
                },
                () = &mut shutdown => {
                    tracing::info!("Shutdown requested");
                    break;
                },
            }
        }

        Ok(())
    }

    /// Local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.transport.local_addr()
    }
}

/// Handle a single WebSocket connection from handshake to close.
async fn handle_connection(
    pending: PendingConnection,
    driver: SharedDriver,
    shared: Arc<SharedState>,
    env: SystemEnv,
) -> Result<(), ServerError> {
    let peer_addr = pending.peer_addr();
    let ws = pending.upgrade().await?;
    let connection_id = ConnectionId::new(env.random_u64());

    tracing::debug!("New connection {} from {}", connection_id, peer_addr);

    let (mut sink, mut stream) = ws.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    let writer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let closing = matches!(message, Message::Close(_));
            if let Err(e) = sink.send(message).await {
                tracing::debug!("Write to {} failed: {}", connection_id, e);
                break;
            }
            if closing {
                break;
            }
        }
    });

    let registered = {
        let mut driver = driver.lock().await;
        if driver.has_connection(connection_id) {
            tracing::warn!("Connection id {} collided, dropping {}", connection_id, peer_addr);
            drop(tx);
            false
        } else {
            shared.outbound.write().await.insert(connection_id, tx);
            match driver.process_event(ServerEvent::ConnectionAccepted { connection_id }) {
                Ok(actions) => {
                    execute_actions(&driver, actions, &shared).await;
                    driver.has_connection(connection_id)
                },
                Err(e) => {
                    let e = ServerError::from(e);
                    tracing::warn!("Failed to register {}: {}", connection_id, e);
                    shared.outbound.write().await.remove(&connection_id);
                    false
                },
            }
        }
    };

    if registered {
        while let Some(frame) = stream.next().await {
            match frame {
                Ok(Message::Text(text)) => match ClientMessage::decode(&text) {
                    Ok(message) => {
                        tracing::trace!("{} -> {}", connection_id, message.name());
                        let event = ServerEvent::MessageReceived { connection_id, message };
                        dispatch(&driver, &shared, event).await;
                    },
                    Err(e) => {
                        let e = ServerError::from(e);
                        tracing::warn!("Ignoring message from {}: {}", connection_id, e);
                    },
                },
                Ok(Message::Close(_)) => {
                    tracing::debug!("Connection {} closed by peer", connection_id);
                    break;
                },
                // Ping/pong are answered by tungstenite; binary frames carry nothing for us
                Ok(_) => {},
                Err(e) => {
                    tracing::debug!("Read error on {}: {}", connection_id, e);
                    break;
                },
            }
        }

        shared.outbound.write().await.remove(&connection_id);

        let event = ServerEvent::ConnectionClosed {
            connection_id,
            reason: "connection closed".to_string(),
        };
        dispatch(&driver, &shared, event).await;
    }

    if let Err(e) = writer.await {
        tracing::debug!("Writer task for {} ended abnormally: {}", connection_id, e);
    }

    Ok(())
}

/// Process one event and execute its actions under the driver lock.
async fn dispatch(
    driver: &Mutex<ServerDriver<SystemEnv>>,
    shared: &SharedState,
    event: ServerEvent,
) {
    let mut driver = driver.lock().await;
    match driver.process_event(event) {
        Ok(actions) => execute_actions(&driver, actions, shared).await,
        Err(e) => tracing::warn!("Event processing error: {}", ServerError::from(e)),
    }
}

/// Execute server actions.
///
/// Sends only enqueue onto per-connection channels; nothing here waits for
/// the peer.
async fn execute_actions(
    driver: &ServerDriver<SystemEnv>,
    actions: Vec<ServerAction>,
    shared: &SharedState,
) {
    for action in actions {
        match action {
            ServerAction::SendToConnection { connection_id, message } => {
                let Some(text) = encode(&message) else { continue };
                let outbound = shared.outbound.read().await;
                deliver(&outbound, connection_id, text);
            },

            ServerAction::BroadcastToRoom { room_id, message, exclude_connection } => {
                let Some(text) = encode(&message) else { continue };
                let outbound = shared.outbound.read().await;
                for connection_id in driver.sessions_in_room(room_id) {
                    if Some(connection_id) != exclude_connection {
                        deliver(&outbound, connection_id, text.clone());
                    }
                }
            },

            ServerAction::CloseConnection { connection_id, reason } => {
                tracing::info!("Closing connection {}: {}", connection_id, reason);
                let mut outbound = shared.outbound.write().await;
                if let Some(tx) = outbound.remove(&connection_id) {
                    let frame = CloseFrame { code: CloseCode::Policy, reason: reason.into() };
                    // Receiver gone means the connection is already closing
                    let _ = tx.send(Message::Close(Some(frame)));
                }
            },

            ServerAction::Log { level, message, .. } => match level {
                LogLevel::Debug => tracing::debug!("{}", message),
                LogLevel::Info => tracing::info!("{}", message),
                LogLevel::Warn => tracing::warn!("{}", message),
                LogLevel::Error => tracing::error!("{}", message),
            },
        }
    }
}

fn encode(message: &ServerMessage) -> Option<String> {
    match message.encode() {
        Ok(text) => Some(text),
        Err(e) => {
            tracing::error!("Failed to encode outbound message: {}", e);
            None
        },
    }
}

fn deliver(
    outbound: &HashMap<ConnectionId, mpsc::UnboundedSender<Message>>,
    connection_id: ConnectionId,
    text: String,
) {
    match outbound.get(&connection_id) {
        Some(tx) => {
            if tx.send(Message::Text(text)).is_err() {
                tracing::debug!("Outbound channel for {} already closed", connection_id);
            }
        },
        None => tracing::warn!("Send to unknown connection {}", connection_id),
    }
}
