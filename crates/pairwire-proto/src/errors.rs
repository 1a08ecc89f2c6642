//! Protocol error types.

use thiserror::Error;

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors produced while decoding or encoding wire messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Inbound text is not a valid client envelope.
    ///
    /// Covers malformed JSON, unknown event names and payloads of the wrong
    /// shape. The connection stays usable; the offending message is dropped.
    #[error("failed to decode message: {0}")]
    Decode(#[source] serde_json::Error),

    /// Outbound message could not be serialized.
    #[error("failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),

    /// Identifier text is not valid hex of the expected width.
    #[error("invalid {kind} identifier: {value:?}")]
    InvalidId {
        /// Which identifier was being parsed
        kind: &'static str,
        /// The rejected text
        value: String,
    },
}
