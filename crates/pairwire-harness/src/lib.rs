//! Deterministic simulation harness for pairwire testing.
//!
//! Seeded implementation of the server's `Environment` and an in-memory
//! stand-in for the transport, so the real [`ServerDriver`] can be exercised
//! without sockets and with reproducible connection ids.
//!
//! # Model-Based Testing
//!
//! The `model` module provides a reference implementation of pairing and
//! relay. Operations are applied to both the model and the simulated server,
//! and the messages each client observes are compared.
//!
//! # Invariant Testing
//!
//! The `invariants` module checks properties that must hold after every
//! event: queue uniqueness, state exclusivity, session symmetry, no self
//! pairing and relay exclusion. Use [`InvariantRegistry::standard()`].
//!
//! [`ServerDriver`]: pairwire_server::ServerDriver

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod invariants;
pub mod model;
pub mod sim_env;
pub mod sim_server;

pub use invariants::{
    Invariant, InvariantRegistry, InvariantResult, NoSelfPair, QueueUniqueness, RelayExclusion,
    SessionSymmetry, StateExclusivity, SystemSnapshot, Violation,
};
pub use model::{ClientId, ModelOutput, ModelWorld, Operation};
pub use sim_env::SimEnv;
pub use sim_server::{DeliveryRecord, SimServer};
