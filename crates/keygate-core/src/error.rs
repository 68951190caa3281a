//! Error types for the Keygate core.
//!
//! Denials are expected outcomes, not failures: a caller that receives a
//! [`DenyReason`] re-authenticates. [`CoreError`] covers the cases where the
//! core could not reach a decision at all.

use keygate_crypto::CryptoError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why an access request or file-system event was refused.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DenyReason {
    /// Token was already consumed
    #[error("token already used")]
    AlreadyUsed,

    /// Recomputed token differs (wrong fields, wrong key, or expired window)
    #[error("token mismatch")]
    Mismatch,

    /// Write-class event arrived while no valid session was open
    #[error("session locked")]
    SessionLocked,

    /// Backing store could not record the decision; fail closed
    #[error("store unavailable")]
    StoreUnavailable,

    /// File exists but could not be read, so its content is unaccounted for
    #[error("file unreadable")]
    Unreadable,
}

impl DenyReason {
    /// Upper-snake label used in logs and CLI output.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AlreadyUsed => "ALREADY_USED",
            Self::Mismatch => "MISMATCH",
            Self::SessionLocked => "SESSION_LOCKED",
            Self::StoreUnavailable => "STORE_UNAVAILABLE",
            Self::Unreadable => "UNREADABLE",
        }
    }
}

/// Errors where the core could not produce a decision.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Used-token ledger failed to answer
    #[error("used-token set unavailable: {0}")]
    UsedSetUnavailable(String),

    /// Malformed cryptographic input
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

/// Malformed event-feed line.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Line is blank after trimming
    #[error("empty line")]
    Empty,

    /// First word is not an event kind or control command
    #[error("unknown kind: {0}")]
    UnknownKind(String),

    /// Event kind without the required path argument
    #[error("{kind} requires {expected} path argument(s)")]
    MissingPath {
        /// Event kind that was parsed
        kind: &'static str,
        /// Number of paths the kind takes
        expected: usize,
    },

    /// Extra words after a complete line
    #[error("unexpected argument: {0}")]
    UnexpectedArgument(String),
}
