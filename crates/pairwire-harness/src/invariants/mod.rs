//! Invariant checking for deterministic simulation testing.
//!
//! Invariants are properties that must hold after every event the driver
//! processes, whatever sequence of connects, joins, leaves and disconnects
//! led there.
//!
//! # Architecture
//!
//! Observable state is extracted from the driver (and optionally the
//! simulated transport's delivery log) into a [`SystemSnapshot`], then every
//! registered [`Invariant`] runs against it.
//!
//! # Usage
//!
//! ```ignore
//! let registry = InvariantRegistry::standard();
//! let snapshot = SystemSnapshot::from_sim(&sim);
//! registry.assert_all(&snapshot, "after join");
//! ```

mod checks;
mod snapshot;

pub use checks::{NoSelfPair, QueueUniqueness, RelayExclusion, SessionSymmetry, StateExclusivity};
pub use snapshot::SystemSnapshot;

/// Invariant check result.
pub type InvariantResult = Result<(), Violation>;

/// Invariant violation with context.
#[derive(Debug, Clone)]
pub struct Violation {
    /// Name of the violated invariant.
    pub invariant: &'static str,
    /// Description of what went wrong.
    pub message: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.invariant, self.message)
    }
}

impl std::error::Error for Violation {}

/// An invariant that can be checked against system state.
pub trait Invariant: Send + Sync {
    /// Invariant name for error reporting.
    fn name(&self) -> &'static str;

    /// Check the invariant against a snapshot.
    ///
    /// Returns `Ok(())` if the invariant holds, or a [`Violation`]
    /// describing what went wrong.
    fn check(&self, state: &SystemSnapshot) -> InvariantResult;

    /// Build a violation tagged with this invariant's name.
    fn violation(&self, message: String) -> Violation {
        Violation { invariant: self.name(), message }
    }
}

/// Registry of invariants to check.
///
/// Use [`InvariantRegistry::standard()`] for the pairing invariants.
pub struct InvariantRegistry {
    invariants: Vec<Box<dyn Invariant>>,
}

impl Default for InvariantRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl InvariantRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self { invariants: Vec::new() }
    }

    /// Create a registry with the standard pairing invariants.
    ///
    /// Includes:
    /// - [`QueueUniqueness`]: nobody waits twice
    /// - [`StateExclusivity`]: queued and paired never overlap
    /// - [`SessionSymmetry`]: both members point at the same session
    /// - [`NoSelfPair`]: a session has two distinct members
    /// - [`RelayExclusion`]: relayed payloads never echo to their sender
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.add(QueueUniqueness);
        registry.add(StateExclusivity);
        registry.add(SessionSymmetry);
        registry.add(NoSelfPair);
        registry.add(RelayExclusion);
        registry
    }

    /// Add an invariant to the registry.
    pub fn add<I: Invariant + 'static>(&mut self, invariant: I) {
        self.invariants.push(Box::new(invariant));
    }

    /// Check all invariants against the given state.
    ///
    /// Returns `Ok(())` if all invariants hold, or all violations found.
    pub fn check_all(&self, state: &SystemSnapshot) -> Result<(), Vec<Violation>> {
        let violations: Vec<_> =
            self.invariants.iter().filter_map(|inv| inv.check(state).err()).collect();

        if violations.is_empty() { Ok(()) } else { Err(violations) }
    }

    /// Check all invariants, panicking with every violation found.
    #[allow(clippy::panic)]
    pub fn assert_all(&self, state: &SystemSnapshot, context: &str) {
        if let Err(violations) = self.check_all(state) {
            let messages: Vec<_> = violations.iter().map(|v| v.to_string()).collect();
            panic!("Invariant violation {context}:\n  {}", messages.join("\n  "));
        }
    }

    /// Number of registered invariants.
    pub fn len(&self) -> usize {
        self.invariants.len()
    }

    /// Check if registry is empty.
    pub fn is_empty(&self) -> bool {
        self.invariants.is_empty()
    }
}
