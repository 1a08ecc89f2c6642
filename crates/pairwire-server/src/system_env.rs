//! Production Environment implementation using system time and RNG.
//!
//! `SystemEnv` uses real monotonic time and OS randomness. Production behavior
//! is therefore non-deterministic; tests use the seeded simulation
//! environment from `pairwire-harness` instead.

use std::time::Instant;

use crate::env::Environment;

/// Production environment using system time and OS randomness.
///
/// # Panics
///
/// Panics if the OS RNG fails. Connection identifiers must be unpredictable,
/// and RNG failure indicates an OS-level problem the server cannot work
/// around.
#[derive(Debug, Clone, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    #[allow(clippy::disallowed_methods)]
    fn now(&self) -> Instant {
        Instant::now()
    }

    #[allow(clippy::expect_used)]
    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer).expect("invariant: OS RNG failure is unrecoverable");
    }
}
