//! Storage error types.
//!
//! Any of these reaching the gate means the audit trail could not be written
//! or read, and the gate fails closed.

use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Required entry is missing (e.g. no salt before `init`)
    #[error("not found: {0}")]
    NotFound(String),

    /// Serialization or deserialization failed
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error (file system, database, injected fault)
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}
