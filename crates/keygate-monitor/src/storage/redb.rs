//! Redb-backed durable audit store.
//!
//! Uses Redb's ACID transactions with Copy-on-Write for crash safety. Besides
//! the audit log it keeps the KDF salt and the durable used-token ledger, so
//! a restarted monitor re-derives the same master key and still refuses
//! tokens consumed before the restart.

use std::{path::Path, sync::Arc};

use keygate_core::{CoreError, EventRecord, FileState, UsedTokenSet};
use keygate_crypto::{SALT_SIZE, Salt, Token};
use redb::{Database, ReadableTable, ReadableTableMetadata, TableDefinition};
use serde::{Serialize, de::DeserializeOwned};

use super::{AuditStore, StateChange, StorageError};

/// Table: files
/// Key: path as UTF-8 bytes
/// Value: CBOR-encoded FileState
const FILES: TableDefinition<&[u8], &[u8]> = TableDefinition::new("files");

/// Table: events
/// Key: sequence number as big-endian bytes [8 bytes]
/// Value: CBOR-encoded EventRecord
const EVENTS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("events");

/// Table: used_tokens
/// Key: raw token bytes [16 bytes]
/// Value: empty
const USED_TOKENS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("used_tokens");

/// Table: meta
/// Key: name as UTF-8 bytes
/// Value: raw bytes
const META: TableDefinition<&[u8], &[u8]> = TableDefinition::new("meta");

const SALT_KEY: &[u8] = b"salt";

/// Durable audit store backed by Redb.
///
/// Thread-safe through Redb's internal locking. Clone is cheap (Arc).
#[derive(Clone)]
pub struct RedbAuditStore {
    db: Arc<Database>,
}

impl RedbAuditStore {
    /// Open or create a Redb database at the given path.
    ///
    /// Creates tables if they don't exist (FILES, EVENTS, USED_TOKENS, META).
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if the database cannot be opened or created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let db = Database::create(path.as_ref()).map_err(|e| StorageError::Io(e.to_string()))?;

        let txn = db.begin_write().map_err(|e| StorageError::Io(e.to_string()))?;
        {
            let _ = txn.open_table(FILES).map_err(|e| StorageError::Io(e.to_string()))?;
            let _ = txn.open_table(EVENTS).map_err(|e| StorageError::Io(e.to_string()))?;
            let _ = txn.open_table(USED_TOKENS).map_err(|e| StorageError::Io(e.to_string()))?;
            let _ = txn.open_table(META).map_err(|e| StorageError::Io(e.to_string()))?;
        }
        txn.commit().map_err(|e| StorageError::Io(e.to_string()))?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Stored salt, if `init` has run.
    pub fn load_salt(&self) -> Result<Option<Salt>, StorageError> {
        let txn = self.db.begin_read().map_err(|e| StorageError::Io(e.to_string()))?;
        let table = txn.open_table(META).map_err(|e| StorageError::Io(e.to_string()))?;

        let Some(value) = table.get(SALT_KEY).map_err(|e| StorageError::Io(e.to_string()))? else {
            return Ok(None);
        };
        decode_salt(value.value()).map(Some)
    }

    /// Stored salt, or `NotFound` if the store was never initialised.
    pub fn require_salt(&self) -> Result<Salt, StorageError> {
        self.load_salt()?
            .ok_or_else(|| StorageError::NotFound("salt (run `keygate init` first)".to_string()))
    }

    /// Return the stored salt, creating it from `fresh` on first use.
    ///
    /// Runs in one write transaction, so concurrent initialisers agree on a
    /// single salt.
    pub fn load_or_create_salt(
        &self,
        fresh: impl FnOnce() -> [u8; SALT_SIZE],
    ) -> Result<Salt, StorageError> {
        let txn = self.db.begin_write().map_err(|e| StorageError::Io(e.to_string()))?;

        let salt = {
            let mut table = txn.open_table(META).map_err(|e| StorageError::Io(e.to_string()))?;

            let existing = table
                .get(SALT_KEY)
                .map_err(|e| StorageError::Io(e.to_string()))?
                .map(|v| decode_salt(v.value()))
                .transpose()?;

            match existing {
                Some(salt) => salt,
                None => {
                    let salt = Salt::from_bytes(fresh());
                    table
                        .insert(SALT_KEY, salt.as_bytes().as_slice())
                        .map_err(|e| StorageError::Io(e.to_string()))?;
                    salt
                },
            }
        };

        txn.commit().map_err(|e| StorageError::Io(e.to_string()))?;

        Ok(salt)
    }

    /// Number of consumed tokens in the durable ledger.
    pub fn used_token_count(&self) -> Result<u64, StorageError> {
        let txn = self.db.begin_read().map_err(|e| StorageError::Io(e.to_string()))?;
        let table = txn.open_table(USED_TOKENS).map_err(|e| StorageError::Io(e.to_string()))?;
        table.len().map_err(|e| StorageError::Io(e.to_string()))
    }

    fn insert_used(&self, token: &Token) -> Result<bool, StorageError> {
        let txn = self.db.begin_write().map_err(|e| StorageError::Io(e.to_string()))?;

        let inserted = {
            let mut table =
                txn.open_table(USED_TOKENS).map_err(|e| StorageError::Io(e.to_string()))?;

            let present = table
                .get(token.as_bytes().as_slice())
                .map_err(|e| StorageError::Io(e.to_string()))?
                .is_some();

            if !present {
                table
                    .insert(token.as_bytes().as_slice(), b"".as_slice())
                    .map_err(|e| StorageError::Io(e.to_string()))?;
            }
            !present
        };

        txn.commit().map_err(|e| StorageError::Io(e.to_string()))?;

        Ok(inserted)
    }

    fn contains_used(&self, token: &Token) -> Result<bool, StorageError> {
        let txn = self.db.begin_read().map_err(|e| StorageError::Io(e.to_string()))?;
        let table = txn.open_table(USED_TOKENS).map_err(|e| StorageError::Io(e.to_string()))?;

        let present = table
            .get(token.as_bytes().as_slice())
            .map_err(|e| StorageError::Io(e.to_string()))?
            .is_some();
        Ok(present)
    }
}

impl AuditStore for RedbAuditStore {
    fn upsert_file_state(&self, state: &FileState) -> Result<(), StorageError> {
        let bytes = encode_cbor(state)?;
        let txn = self.db.begin_write().map_err(|e| StorageError::Io(e.to_string()))?;

        {
            let mut table = txn.open_table(FILES).map_err(|e| StorageError::Io(e.to_string()))?;
            table
                .insert(state.path.as_bytes(), bytes.as_slice())
                .map_err(|e| StorageError::Io(e.to_string()))?;
        }

        txn.commit().map_err(|e| StorageError::Io(e.to_string()))?;

        Ok(())
    }

    fn remove_file_state(&self, path: &str) -> Result<Option<FileState>, StorageError> {
        let txn = self.db.begin_write().map_err(|e| StorageError::Io(e.to_string()))?;

        let removed = {
            let mut table = txn.open_table(FILES).map_err(|e| StorageError::Io(e.to_string()))?;
            table
                .remove(path.as_bytes())
                .map_err(|e| StorageError::Io(e.to_string()))?
                .map(|v| decode_cbor::<FileState>(v.value()))
                .transpose()?
        };

        txn.commit().map_err(|e| StorageError::Io(e.to_string()))?;

        Ok(removed)
    }

    fn get_file_state(&self, path: &str) -> Result<Option<FileState>, StorageError> {
        let txn = self.db.begin_read().map_err(|e| StorageError::Io(e.to_string()))?;
        let table = txn.open_table(FILES).map_err(|e| StorageError::Io(e.to_string()))?;

        let Some(value) =
            table.get(path.as_bytes()).map_err(|e| StorageError::Io(e.to_string()))?
        else {
            return Ok(None);
        };

        decode_cbor(value.value()).map(Some)
    }

    fn append_event(&self, record: &EventRecord) -> Result<(), StorageError> {
        self.commit_event(record, StateChange::Unchanged)
    }

    fn commit_event(
        &self,
        record: &EventRecord,
        change: StateChange<'_>,
    ) -> Result<(), StorageError> {
        let record_bytes = encode_cbor(record)?;
        let (remove, upsert) = match change {
            StateChange::Unchanged => (None, None),
            StateChange::Upsert(state) => (None, Some(state)),
            StateChange::Remove(path) => (Some(path), None),
            StateChange::Rename { from, to } => (Some(from), Some(to)),
        };
        let upsert = upsert
            .map(|state| encode_cbor(state).map(|bytes| (state.path.as_str(), bytes)))
            .transpose()?;

        // Record and state changes share one write transaction; dropping it
        // on any error before commit aborts both.
        let txn = self.db.begin_write().map_err(|e| StorageError::Io(e.to_string()))?;

        {
            let mut events =
                txn.open_table(EVENTS).map_err(|e| StorageError::Io(e.to_string()))?;

            let next = match events.last().map_err(|e| StorageError::Io(e.to_string()))? {
                Some((key, _)) => decode_event_key(key.value())? + 1,
                None => 0,
            };

            let key = encode_event_key(next);
            events
                .insert(key.as_slice(), record_bytes.as_slice())
                .map_err(|e| StorageError::Io(e.to_string()))?;
        }

        {
            let mut files = txn.open_table(FILES).map_err(|e| StorageError::Io(e.to_string()))?;

            if let Some(path) = remove {
                files.remove(path.as_bytes()).map_err(|e| StorageError::Io(e.to_string()))?;
            }

            if let Some((path, bytes)) = &upsert {
                files
                    .insert(path.as_bytes(), bytes.as_slice())
                    .map_err(|e| StorageError::Io(e.to_string()))?;
            }
        }

        txn.commit().map_err(|e| StorageError::Io(e.to_string()))?;

        Ok(())
    }

    fn query_events(
        &self,
        path: Option<&str>,
        limit: usize,
    ) -> Result<Vec<EventRecord>, StorageError> {
        let txn = self.db.begin_read().map_err(|e| StorageError::Io(e.to_string()))?;
        let table = txn.open_table(EVENTS).map_err(|e| StorageError::Io(e.to_string()))?;

        let results = table.iter().map_err(|e| StorageError::Io(e.to_string()))?;

        let mut records = Vec::with_capacity(limit.min(1024));
        for result in results.rev() {
            if records.len() >= limit {
                break;
            }

            let (_, value) = result.map_err(|e| StorageError::Io(e.to_string()))?;
            let record: EventRecord = decode_cbor(value.value())?;

            if path.is_none_or(|p| record.path == p) {
                records.push(record);
            }
        }

        Ok(records)
    }
}

impl UsedTokenSet for RedbAuditStore {
    fn check_and_insert(&self, token: &Token) -> Result<bool, CoreError> {
        self.insert_used(token).map_err(|e| CoreError::UsedSetUnavailable(e.to_string()))
    }

    fn contains(&self, token: &Token) -> Result<bool, CoreError> {
        self.contains_used(token).map_err(|e| CoreError::UsedSetUnavailable(e.to_string()))
    }
}

fn encode_cbor<T: Serialize>(value: &T) -> Result<Vec<u8>, StorageError> {
    let mut bytes = Vec::new();
    ciborium::into_writer(value, &mut bytes)
        .map_err(|e| StorageError::Serialization(e.to_string()))?;
    Ok(bytes)
}

fn decode_cbor<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StorageError> {
    ciborium::from_reader(bytes).map_err(|e| StorageError::Serialization(e.to_string()))
}

fn decode_salt(bytes: &[u8]) -> Result<Salt, StorageError> {
    Salt::from_slice(bytes).map_err(|e| StorageError::Serialization(e.to_string()))
}

/// Encode event key: sequence (8 bytes BE)
fn encode_event_key(sequence: u64) -> [u8; 8] {
    sequence.to_be_bytes()
}

/// Decode event key: sequence (8 bytes BE)
fn decode_event_key(key: &[u8]) -> Result<u64, StorageError> {
    let bytes: [u8; 8] = key
        .try_into()
        .map_err(|_| StorageError::Serialization(format!("event key of {} bytes", key.len())))?;
    Ok(u64::from_be_bytes(bytes))
}
