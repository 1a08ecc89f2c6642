//! Seeded simulation environment.
//!
//! Time is virtual: it starts at the instant the environment is created and
//! only moves when [`SimEnv::advance`] is called. Randomness comes from a
//! ChaCha generator, so a seed fully determines the connection ids a run
//! produces.

use std::{
    sync::{Arc, Mutex, PoisonError},
    time::{Duration, Instant},
};

use pairwire_server::Environment;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

struct SimState {
    rng: ChaCha8Rng,
    origin: Instant,
    elapsed: Duration,
}

/// Deterministic environment for tests.
///
/// Clones share the same clock and generator.
#[derive(Clone)]
pub struct SimEnv {
    state: Arc<Mutex<SimState>>,
}

impl SimEnv {
    /// Create an environment whose randomness is fixed by `seed`.
    #[allow(clippy::disallowed_methods)]
    pub fn with_seed(seed: u64) -> Self {
        let state = SimState {
            rng: ChaCha8Rng::seed_from_u64(seed),
            origin: Instant::now(),
            elapsed: Duration::ZERO,
        };
        Self { state: Arc::new(Mutex::new(state)) }
    }

    /// Move virtual time forward.
    pub fn advance(&self, duration: Duration) {
        let mut state = self.lock();
        state.elapsed += duration;
    }

    /// Virtual time since creation.
    pub fn elapsed(&self) -> Duration {
        self.lock().elapsed
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for SimEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimEnv").field("elapsed", &self.elapsed()).finish()
    }
}

impl Environment for SimEnv {
    fn now(&self) -> Instant {
        let state = self.lock();
        state.origin + state.elapsed
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        self.lock().rng.fill_bytes(buffer);
    }
}
