//! Invariant checking over audit trails.
//!
//! Invariants are properties every audit trail must satisfy regardless of
//! which events produced it. Scenario and property tests collect the trail
//! from a store into an [`AuditSnapshot`] and run the standard registry over
//! it.
//!
//! # Usage
//!
//! ```ignore
//! let snapshot = AuditSnapshot::from_newest_first(store.query_events(None, usize::MAX)?);
//! InvariantRegistry::standard().assert_all(&snapshot, "after burst");
//! ```

mod checks;

use keygate_core::EventRecord;

pub use checks::{
    BlockedRecordsCarryNoContent, DenialsNameAReason, DigestChain, MovePaths,
    TimestampMonotonicity,
};

/// Invariant check result.
pub type InvariantResult = Result<(), Violation>;

/// Invariant violation with context.
#[derive(Debug, Clone, PartialEq, Eq)]
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

/// Audit trail in append order.
#[derive(Debug, Clone, Default)]
pub struct AuditSnapshot {
    /// Records, oldest first
    pub records: Vec<EventRecord>,
}

impl AuditSnapshot {
    /// Snapshot from records already in append order.
    pub fn new(records: Vec<EventRecord>) -> Self {
        Self { records }
    }

    /// Snapshot from a newest-first query result.
    pub fn from_newest_first(mut records: Vec<EventRecord>) -> Self {
        records.reverse();
        Self { records }
    }
}

/// A property of every audit trail.
pub trait Invariant: Send + Sync {
    /// Invariant name for error reporting.
    fn name(&self) -> &'static str;

    /// Check the invariant against a trail.
    fn check(&self, snapshot: &AuditSnapshot) -> InvariantResult;
}

/// Registry of invariants to check.
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

    /// Registry with every audit-trail invariant.
    ///
    /// - [`BlockedRecordsCarryNoContent`]: blocked events never observed content
    /// - [`DenialsNameAReason`]: blocked records say why, allowed records never do
    /// - [`DigestChain`]: each allowed record's before-digest is the previous after-digest
    /// - [`MovePaths`]: only moves carry a previous path, and they always do
    /// - [`TimestampMonotonicity`]: timestamps never decrease in append order
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.add(BlockedRecordsCarryNoContent);
        registry.add(DenialsNameAReason);
        registry.add(DigestChain);
        registry.add(MovePaths);
        registry.add(TimestampMonotonicity);
        registry
    }

    /// Add an invariant.
    pub fn add<I: Invariant + 'static>(&mut self, invariant: I) {
        self.invariants.push(Box::new(invariant));
    }

    /// Run every invariant, collecting all violations.
    pub fn check_all(&self, snapshot: &AuditSnapshot) -> Result<(), Vec<Violation>> {
        let violations: Vec<_> =
            self.invariants.iter().filter_map(|inv| inv.check(snapshot).err()).collect();

        if violations.is_empty() { Ok(()) } else { Err(violations) }
    }

    /// Run every invariant, panicking with all violations.
    ///
    /// # Panics
    ///
    /// If any invariant is violated.
    #[allow(clippy::panic)]
    pub fn assert_all(&self, snapshot: &AuditSnapshot, context: &str) {
        if let Err(violations) = self.check_all(snapshot) {
            let messages: Vec<_> = violations.iter().map(ToString::to_string).collect();
            panic!("Invariant violation {context}:\n  {}", messages.join("\n  "));
        }
    }

    /// Number of registered invariants.
    pub fn len(&self) -> usize {
        self.invariants.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.invariants.is_empty()
    }
}
