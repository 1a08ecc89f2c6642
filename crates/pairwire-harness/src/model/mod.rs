//! Reference model of pairing and relay.
//!
//! [`ModelWorld`] tracks a handful of clients, a FIFO queue and who is paired
//! with whom, using plain client indices instead of connection ids. It is the
//! oracle the simulated server is compared against.

mod operation;
mod world;

pub use operation::{ClientId, Operation};
pub use world::{ModelOutput, ModelWorld};
