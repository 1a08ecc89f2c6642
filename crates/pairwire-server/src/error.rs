//! Server error types.

use thiserror::Error;

use crate::server_error::ServerError as DriverError;

/// Errors that can occur in the server runtime.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration error (invalid bind address, etc.).
    ///
    /// These are fatal errors that prevent server startup. Fix configuration
    /// and restart.
    #[error("configuration error: {0}")]
    Config(String),

    /// Transport/network error (bind failure, handshake failure, I/O error).
    ///
    /// Fatal for startup, otherwise scoped to a single connection.
    #[error("transport error: {0}")]
    Transport(String),

    /// Protocol error (client sent something that isn't a valid envelope).
    ///
    /// The offending message is dropped; the connection stays open.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Driver error (from `ServerDriver` processing).
    ///
    /// Wraps errors from the core server logic. See `DriverError` for details.
    #[error("driver error: {0}")]
    Driver(#[from] DriverError),
}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ServerError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<pairwire_proto::ProtocolError> for ServerError {
    fn from(err: pairwire_proto::ProtocolError) -> Self {
        Self::Protocol(err.to_string())
    }
}
