//! Driver error types.
//!
//! None of these are fatal to the server. The runtime logs them and keeps
//! serving other connections.

use pairwire_proto::ConnectionId;
use thiserror::Error;

/// Errors that can occur while processing a driver event.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Event references a connection the driver doesn't know.
    ///
    /// Usually a race with disconnect: the runtime delivered an event for a
    /// connection whose close was already processed.
    #[error("connection not found: {0}")]
    ConnectionNotFound(ConnectionId),

    /// Connection identifier already registered.
    ///
    /// Identifiers are random 64-bit values, so this means either a
    /// collision or a runtime bug. The new connection should be dropped.
    #[error("connection already exists: {0}")]
    ConnectionAlreadyExists(ConnectionId),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_error_display() {
        let err = ServerError::ConnectionNotFound(ConnectionId::new(42));
        assert_eq!(err.to_string(), "connection not found: 000000000000002a");

        let err = ServerError::ConnectionAlreadyExists(ConnectionId::new(1));
        assert_eq!(err.to_string(), "connection already exists: 0000000000000001");
    }
}
