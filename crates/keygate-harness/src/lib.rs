//! Deterministic simulation harness for keygate.
//!
//! [`SimEnv`] implements [`keygate_core::Environment`] with a virtual clock
//! and a seeded RNG, so session expiry, token windows and nonces are
//! reproducible from a seed.
//!
//! # Invariant Testing
//!
//! The `invariants` module checks properties every audit trail must satisfy
//! (blocked records carry no content, digests chain from record to record,
//! and so on). Scenario tests run [`InvariantRegistry::standard()`] over the
//! trail they produced.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod invariants;
pub mod sim_env;

pub use invariants::{
    AuditSnapshot, BlockedRecordsCarryNoContent, DenialsNameAReason, DigestChain, Invariant,
    InvariantRegistry, InvariantResult, MovePaths, TimestampMonotonicity, Violation,
};
pub use sim_env::{SIM_EPOCH_SECS, SimEnv, SimInstant};
