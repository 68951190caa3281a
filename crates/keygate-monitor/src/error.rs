//! Monitor error types.

use keygate_crypto::CryptoError;
use thiserror::Error;

use crate::storage::StorageError;

/// Errors from processing a single event.
///
/// The gate never lets one of these turn into an allowed write: see
/// [`crate::EventGate::decide`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GateError {
    /// Audit store could not record or read state
    #[error("audit store unavailable: {0}")]
    StoreUnavailable(#[from] StorageError),

    /// File exists but could not be read
    #[error("cannot read {path}: {reason}")]
    Io {
        /// File that failed
        path: String,
        /// OS error text
        reason: String,
    },
}

/// Errors that stop the monitor or a CLI command.
#[derive(Error, Debug)]
pub enum MonitorError {
    /// Invalid configuration. Fix and restart.
    #[error("configuration error: {0}")]
    Config(String),

    /// Audit store failure
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Key derivation or wire decoding failure
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Terminal or file I/O failure
    #[error("I/O error: {0}")]
    Io(String),

    /// Monitor task has stopped accepting input
    #[error("monitor stopped")]
    Stopped,
}

impl From<std::io::Error> for MonitorError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
