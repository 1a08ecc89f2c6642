//! Connection and room identifiers.
//!
//! Both identifiers travel as fixed-width lowercase hex strings so that
//! browser clients never have to deal with integers wider than 53 bits.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::errors::ProtocolError;

/// Transient identifier of one live transport connection.
///
/// Assigned by the server when the connection is accepted and never reused
/// while that connection is alive. Carries no identity beyond the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Wrap a raw identifier.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw numeric value.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl FromStr for ConnectionId {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 16 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ProtocolError::InvalidId { kind: "connection", value: s.to_string() });
        }
        u64::from_str_radix(s, 16)
            .map(Self)
            .map_err(|_| ProtocolError::InvalidId { kind: "connection", value: s.to_string() })
    }
}

impl From<ConnectionId> for String {
    fn from(id: ConnectionId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for ConnectionId {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Identifier of a pairing session ("room").
///
/// Derived from the two member identifiers, independent of their order, so
/// either member can recompute it without knowing who joined first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct RoomId(u128);

impl RoomId {
    /// Derive the room identifier for a pair of connections.
    ///
    /// SHA-256 over the big-endian bytes of the smaller id followed by the
    /// larger id, truncated to 128 bits.
    pub fn derive(a: ConnectionId, b: ConnectionId) -> Self {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };

        let mut hasher = Sha256::new();
        hasher.update(lo.get().to_be_bytes());
        hasher.update(hi.get().to_be_bytes());
        let digest = hasher.finalize();

        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&digest[..16]);
        Self(u128::from_be_bytes(bytes))
    }

    /// Wrap a raw identifier.
    pub const fn new(raw: u128) -> Self {
        Self(raw)
    }

    /// Raw numeric value.
    pub const fn get(self) -> u128 {
        self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

impl FromStr for RoomId {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 32 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ProtocolError::InvalidId { kind: "room", value: s.to_string() });
        }
        u128::from_str_radix(s, 16)
            .map(Self)
            .map_err(|_| ProtocolError::InvalidId { kind: "room", value: s.to_string() })
    }
}

impl From<RoomId> for String {
    fn from(id: RoomId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for RoomId {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn connection_id_is_fixed_width_hex() {
        let id = ConnectionId::new(0xab);
        assert_eq!(id.to_string(), "00000000000000ab");
        assert_eq!("00000000000000ab".parse::<ConnectionId>().unwrap(), id);
    }

    #[test]
    fn connection_id_rejects_bad_text() {
        assert!("ab".parse::<ConnectionId>().is_err());
        assert!("+000000000000000".parse::<ConnectionId>().is_err());
        assert!("zzzzzzzzzzzzzzzz".parse::<ConnectionId>().is_err());
    }

    #[test]
    fn room_id_serializes_as_string() {
        let room = RoomId::new(1);
        let json = serde_json::to_string(&room).unwrap();
        assert_eq!(json, "\"00000000000000000000000000000001\"");
    }

    #[test]
    fn room_id_differs_for_different_pairs() {
        let a = ConnectionId::new(1);
        let b = ConnectionId::new(2);
        let c = ConnectionId::new(3);
        assert_ne!(RoomId::derive(a, b), RoomId::derive(a, c));
    }

    proptest! {
        /// Property: either member can recompute the same room id
        #[test]
        fn prop_room_id_is_order_independent(a in any::<u64>(), b in any::<u64>()) {
            let a = ConnectionId::new(a);
            let b = ConnectionId::new(b);
            prop_assert_eq!(RoomId::derive(a, b), RoomId::derive(b, a));
        }

        /// Property: textual form parses back to the same identifier
        #[test]
        fn prop_connection_id_text_is_lossless(raw in any::<u64>()) {
            let id = ConnectionId::new(raw);
            prop_assert_eq!(id.to_string().parse::<ConnectionId>().unwrap(), id);
        }
    }
}
