//! WebSocket transport.
//!
//! Plain TCP listener with a WebSocket upgrade per connection. The accept
//! loop only performs the TCP accept; the (potentially slow) upgrade
//! handshake runs in the connection's own task via
//! [`PendingConnection::upgrade`].
//!
//! Each connection is one addressable channel. Room broadcast is layered on
//! top by the runtime using the driver's session directory.

use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{
    WebSocketStream, accept_async_with_config, tungstenite::protocol::WebSocketConfig,
};

use crate::error::ServerError;

/// Upgraded WebSocket stream for one connection.
pub type WsStream = WebSocketStream<TcpStream>;

/// WebSocket listener.
pub struct WsTransport {
    /// TCP listener
    listener: TcpListener,
    /// Limits applied to every upgraded connection
    config: WebSocketConfig,
}

impl WsTransport {
    /// Bind a new listener.
    ///
    /// Messages and frames larger than `max_message_bytes` are rejected by
    /// the WebSocket layer and end the connection.
    pub async fn bind(address: &str, max_message_bytes: usize) -> Result<Self, ServerError> {
        let addr: SocketAddr = address
            .parse()
            .map_err(|e| ServerError::Config(format!("invalid bind address '{address}': {e}")))?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Transport(format!("failed to bind {addr}: {e}")))?;

        let mut config = WebSocketConfig::default();
        config.max_message_size = Some(max_message_bytes);
        config.max_frame_size = Some(max_message_bytes);

        tracing::info!("WebSocket transport bound to {}", listener.local_addr()?);

        Ok(Self { listener, config })
    }

    /// Accept the next TCP connection.
    pub async fn accept(&self) -> Result<PendingConnection, ServerError> {
        let (stream, peer_addr) = self.listener.accept().await?;
        Ok(PendingConnection { stream, peer_addr, config: self.config })
    }

    /// Local address the transport is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }
}

/// Accepted TCP connection awaiting its WebSocket handshake.
pub struct PendingConnection {
    stream: TcpStream,
    peer_addr: SocketAddr,
    config: WebSocketConfig,
}

impl PendingConnection {
    /// Remote address.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Perform the WebSocket handshake.
    pub async fn upgrade(self) -> Result<WsStream, ServerError> {
        Ok(accept_async_with_config(self.stream, Some(self.config)).await?)
    }
}
