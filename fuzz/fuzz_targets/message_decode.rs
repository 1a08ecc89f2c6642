//! Fuzz target for client message decoding
//!
//! Feeds arbitrary text to `ClientMessage::decode` and `ServerMessage::decode`.
//!
//! # Invariants
//!
//! - Decoding NEVER panics, malformed input returns an error
//! - Anything that decodes re-encodes, and the re-encoded text decodes to the
//!   same kind of message

#![no_main]

use libfuzzer_sys::fuzz_target;
use pairwire_proto::{ClientMessage, ServerMessage};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(message) = ClientMessage::decode(text) {
        let encoded = message.encode().expect("decoded message must encode");
        let again = ClientMessage::decode(&encoded).expect("encoded message must decode");
        assert_eq!(message.name(), again.name());
    }

    let _ = ServerMessage::decode(text);
});
