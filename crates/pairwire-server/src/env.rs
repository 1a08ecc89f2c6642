//! Environment abstraction for deterministic testing.
//!
//! Decouples the driver from system resources (time, randomness) so the same
//! logic runs under a seeded simulation and in production.

use std::time::Instant;

/// Abstract environment providing time and randomness.
///
/// # Invariants
///
/// - `now()` never goes backwards
/// - `random_bytes()` uses OS entropy in production and a seeded generator in
///   simulation
pub trait Environment: Clone + Send + Sync + 'static {
    /// Current time (monotonic).
    fn now(&self) -> Instant;

    /// Fills the provided buffer with random bytes.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Generates a random `u64`.
    ///
    /// Used for connection identifiers.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }
}
