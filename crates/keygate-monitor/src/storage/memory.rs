use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use keygate_core::{EventRecord, FileState};

use super::{AuditStore, StateChange, StorageError};

/// In-memory audit store for testing and simulation
///
/// `HashMap` for file states, `Vec` for the event trail in append order. All
/// state is wrapped in Arc<Mutex<>> so clones share it. Uses
/// `lock().expect()`, which panics if the mutex is poisoned.
#[derive(Clone, Default)]
pub struct MemoryAuditStore {
    inner: Arc<Mutex<MemoryAuditInner>>,
}

#[derive(Default)]
struct MemoryAuditInner {
    files: HashMap<String, FileState>,
    events: Vec<EventRecord>,
}

impl MemoryAuditStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of known paths.
    #[allow(clippy::expect_used)]
    pub fn file_count(&self) -> usize {
        self.inner.lock().expect("Mutex poisoned").files.len()
    }

    /// Number of appended records.
    #[allow(clippy::expect_used)]
    pub fn event_count(&self) -> usize {
        self.inner.lock().expect("Mutex poisoned").events.len()
    }
}

impl AuditStore for MemoryAuditStore {
    #[allow(clippy::expect_used)]
    fn upsert_file_state(&self, state: &FileState) -> Result<(), StorageError> {
        let mut inner = self.inner.lock().expect("Mutex poisoned");
        inner.files.insert(state.path.clone(), state.clone());
        Ok(())
    }

    #[allow(clippy::expect_used)]
    fn remove_file_state(&self, path: &str) -> Result<Option<FileState>, StorageError> {
        let mut inner = self.inner.lock().expect("Mutex poisoned");
        Ok(inner.files.remove(path))
    }

    #[allow(clippy::expect_used)]
    fn get_file_state(&self, path: &str) -> Result<Option<FileState>, StorageError> {
        let inner = self.inner.lock().expect("Mutex poisoned");
        Ok(inner.files.get(path).cloned())
    }

    #[allow(clippy::expect_used)]
    fn append_event(&self, record: &EventRecord) -> Result<(), StorageError> {
        let mut inner = self.inner.lock().expect("Mutex poisoned");
        inner.events.push(record.clone());
        Ok(())
    }

    #[allow(clippy::expect_used)]
    fn commit_event(
        &self,
        record: &EventRecord,
        change: StateChange<'_>,
    ) -> Result<(), StorageError> {
        let mut inner = self.inner.lock().expect("Mutex poisoned");
        match change {
            StateChange::Unchanged => {},
            StateChange::Upsert(state) => {
                inner.files.insert(state.path.clone(), state.clone());
            },
            StateChange::Remove(path) => {
                inner.files.remove(path);
            },
            StateChange::Rename { from, to } => {
                inner.files.remove(from);
                inner.files.insert(to.path.clone(), to.clone());
            },
        }
        inner.events.push(record.clone());
        Ok(())
    }

    #[allow(clippy::expect_used)]
    fn query_events(
        &self,
        path: Option<&str>,
        limit: usize,
    ) -> Result<Vec<EventRecord>, StorageError> {
        let inner = self.inner.lock().expect("Mutex poisoned");
        Ok(inner
            .events
            .iter()
            .rev()
            .filter(|r| path.is_none_or(|p| r.path == p))
            .take(limit)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use keygate_core::{EventKind, fingerprint_bytes};

    use super::*;

    #[test]
    fn query_is_most_recent_first_and_limited() {
        let store = MemoryAuditStore::new();
        for ts in 0..5 {
            store.append_event(&EventRecord::new("/a", EventKind::Modify, ts)).unwrap();
        }

        let events = store.query_events(None, 3).unwrap();
        let stamps: Vec<u64> = events.iter().map(|e| e.timestamp).collect();
        assert_eq!(stamps, vec![4, 3, 2]);
    }

    #[test]
    fn query_filters_by_path() {
        let store = MemoryAuditStore::new();
        store.append_event(&EventRecord::new("/a", EventKind::Create, 1)).unwrap();
        store.append_event(&EventRecord::new("/b", EventKind::Create, 2)).unwrap();
        store.append_event(&EventRecord::new("/a", EventKind::Modify, 3)).unwrap();

        let events = store.query_events(Some("/a"), 10).unwrap();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.path == "/a"));
        assert_eq!(events[0].kind, EventKind::Modify);
    }

    #[test]
    fn upsert_get_remove() {
        let store = MemoryAuditStore::new();
        let state = FileState::observed("/a", &fingerprint_bytes(b"x", 1024), 10, None);

        store.upsert_file_state(&state).unwrap();
        assert_eq!(store.get_file_state("/a").unwrap(), Some(state.clone()));
        assert_eq!(store.file_count(), 1);

        assert_eq!(store.remove_file_state("/a").unwrap(), Some(state));
        assert_eq!(store.get_file_state("/a").unwrap(), None);
        assert_eq!(store.remove_file_state("/a").unwrap(), None);
    }

    #[test]
    fn commit_event_applies_record_and_rename_together() {
        let store = MemoryAuditStore::new();
        let fp = fingerprint_bytes(b"x", 1024);
        let src = FileState::observed("/a", &fp, 10, None);
        let created = EventRecord::new("/a", EventKind::Create, 10);
        store.commit_event(&created, StateChange::Upsert(&src)).unwrap();

        let dest = FileState::observed("/b", &fp, 20, Some(&src));
        let record = EventRecord::new("/b", EventKind::Move, 20).with_previous_path("/a");
        store.commit_event(&record, StateChange::Rename { from: "/a", to: &dest }).unwrap();

        assert_eq!(store.get_file_state("/a").unwrap(), None);
        assert_eq!(store.get_file_state("/b").unwrap(), Some(dest));
        assert_eq!(store.query_events(None, 1).unwrap(), vec![record]);
        assert_eq!(store.event_count(), 2);
    }
}
