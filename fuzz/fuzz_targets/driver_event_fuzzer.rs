//! Fuzz target for the pairing driver
//!
//! Drives a simulated server with arbitrary operation sequences over a small
//! pool of clients, including reconnects and messages from idle or queued
//! connections.
//!
//! # Invariants
//!
//! - The driver never returns an error for events on live connections
//! - Every standard invariant holds after every event
//! - Disconnecting everyone leaves no queue entries and no sessions

#![no_main]

use std::collections::HashMap;

use libfuzzer_sys::fuzz_target;
use pairwire_harness::{InvariantRegistry, Operation, SimServer, SystemSnapshot};
use pairwire_proto::{ChatRequest, ClientMessage, ConnectionId, SignalRequest};

const CLIENTS: usize = 6;

fuzz_target!(|input: (u64, Vec<Operation>)| {
    let (seed, ops) = input;
    let mut sim = SimServer::new(seed);
    let mut live: HashMap<u8, ConnectionId> = HashMap::new();
    let registry = InvariantRegistry::standard();

    for (i, op) in ops.iter().take(256).enumerate() {
        let op = op.clamp(CLIENTS);
        let client_id = op.client_id();

        match (op, live.get(&client_id).copied()) {
            (Operation::Connect { .. }, None) => {
                let Ok(connection_id) = sim.connect() else {
                    continue;
                };
                live.insert(client_id, connection_id);
            },
            (Operation::Disconnect { .. }, Some(connection_id)) => {
                sim.disconnect(connection_id).expect("close never fails");
                live.remove(&client_id);
            },
            (Operation::JoinQueue { .. }, Some(connection_id)) => {
                sim.send(connection_id, ClientMessage::JoinQueue).expect("live connection");
            },
            (Operation::LeaveRoom { .. }, Some(connection_id)) => {
                sim.send(connection_id, ClientMessage::LeaveRoom).expect("live connection");
            },
            (Operation::Signal { seq, .. }, Some(connection_id)) => {
                let signal = serde_json::json!({ "seq": seq });
                let message = ClientMessage::Signal(SignalRequest { target: None, signal });
                sim.send(connection_id, message).expect("live connection");
            },
            (Operation::SendMessage { seq, .. }, Some(connection_id)) => {
                let message = ClientMessage::SendMessage(ChatRequest { text: seq.to_string() });
                sim.send(connection_id, message).expect("live connection");
            },
            _ => continue,
        }

        registry.assert_all(&SystemSnapshot::from_sim(&sim), &format!("after op {i}: {op:?}"));
    }

    for connection_id in live.into_values() {
        sim.disconnect(connection_id).expect("close never fails");
    }
    let stats = sim.driver().stats();
    assert_eq!((stats.connections, stats.queued, stats.sessions), (0, 0, 0));
});
