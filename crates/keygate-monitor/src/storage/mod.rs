//! Audit log storage.
//!
//! Trait-based abstraction for file-state snapshots and the append-only event
//! trail. The trait is synchronous; the monitor processes one event at a time
//! and never holds a store call across an await.

mod chaotic;
mod error;
mod memory;
mod redb;

pub use chaotic::ChaoticAuditStore;
pub use error::StorageError;
use keygate_core::{EventRecord, FileState};
pub use memory::MemoryAuditStore;

pub use self::redb::RedbAuditStore;

/// File-state mutation committed together with an event record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StateChange<'a> {
    /// Record only, no state touched (denials)
    Unchanged,
    /// Insert or overwrite the state for its path
    Upsert(&'a FileState),
    /// Forget a path
    Remove(&'a str),
    /// Forget `from` and insert `to` (moves)
    Rename {
        /// Source path to forget
        from: &'a str,
        /// State for the destination
        to: &'a FileState,
    },
}

/// Audit store for file states and event records.
///
/// Must be Clone (shared between the gate and query paths), Send + Sync, and
/// synchronous. Clones access the same underlying store.
pub trait AuditStore: Clone + Send + Sync + 'static {
    /// Insert or overwrite the state for `state.path`.
    fn upsert_file_state(&self, state: &FileState) -> Result<(), StorageError>;

    /// Remove the state for `path`, returning it if it existed.
    fn remove_file_state(&self, path: &str) -> Result<Option<FileState>, StorageError>;

    /// State for `path`, if known.
    fn get_file_state(&self, path: &str) -> Result<Option<FileState>, StorageError>;

    /// Append a record to the audit trail.
    ///
    /// # Invariants
    ///
    /// - Post: the record is never modified or removed afterwards
    /// - Post: it is ordered after every previously appended record
    fn append_event(&self, record: &EventRecord) -> Result<(), StorageError>;

    /// Append `record` and apply `change` as one unit.
    ///
    /// The gate records decisions only through this method, so the trail and
    /// the file states never disagree.
    ///
    /// # Invariants
    ///
    /// - Post (`Ok`): the record is appended and `change` is applied
    /// - Post (`Err`): neither the trail nor any file state changed
    fn commit_event(&self, record: &EventRecord, change: StateChange<'_>)
    -> Result<(), StorageError>;

    /// Up to `limit` records, most recent first, optionally for one path.
    fn query_events(
        &self,
        path: Option<&str>,
        limit: usize,
    ) -> Result<Vec<EventRecord>, StorageError>;
}
