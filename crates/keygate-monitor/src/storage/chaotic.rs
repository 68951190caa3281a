//! Chaotic audit store for fault injection testing
//!
//! Wraps another store and randomly fails operations. The gate must fail
//! closed on every injected failure: no allowed decision without a record.

use std::sync::{Arc, Mutex};

use keygate_core::{EventRecord, FileState};

use super::{AuditStore, StateChange, StorageError};

/// Audit store wrapper that randomly injects failures
///
/// Delegates to an underlying store but fails operations based on a
/// configured failure rate. Seeded, so a failing run replays exactly.
#[derive(Clone)]
pub struct ChaoticAuditStore<S: AuditStore> {
    inner: S,
    /// Failure rate (0.0 = never fail, 1.0 = always fail)
    failure_rate: f64,
    rng: Arc<Mutex<ChaoticRng>>,
    operation_count: Arc<Mutex<usize>>,
    injected_failures: Arc<Mutex<usize>>,
}

/// Linear congruential generator. Fast and reproducible from a seed.
struct ChaoticRng {
    state: u64,
}

impl ChaoticRng {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Next value in [0.0, 1.0)
    fn next(&mut self) -> f64 {
        // Numerical Recipes constants
        const A: u64 = 1_664_525;
        const C: u64 = 1_013_904_223;
        const M: u64 = 1u64 << 32;

        self.state = (A.wrapping_mul(self.state).wrapping_add(C)) % M;
        (self.state as f64) / (M as f64)
    }
}

impl<S: AuditStore> ChaoticAuditStore<S> {
    /// Wrap `inner` with a fixed default seed.
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0]
    pub fn new(inner: S, failure_rate: f64) -> Self {
        Self::with_seed(inner, failure_rate, 0x1234_5678_9ABC_DEF0)
    }

    /// Wrap `inner` with an explicit seed for reproducible chaos.
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0]
    pub fn with_seed(inner: S, failure_rate: f64, seed: u64) -> Self {
        assert!(
            (0.0..=1.0).contains(&failure_rate),
            "failure_rate must be between 0.0 and 1.0, got {failure_rate}"
        );

        Self {
            inner,
            failure_rate,
            rng: Arc::new(Mutex::new(ChaoticRng::new(seed))),
            operation_count: Arc::new(Mutex::new(0)),
            injected_failures: Arc::new(Mutex::new(0)),
        }
    }

    /// Underlying store (for checking invariants after chaos).
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Total number of operations attempted.
    #[allow(clippy::expect_used)]
    pub fn operation_count(&self) -> usize {
        *self.operation_count.lock().expect("operation_count mutex poisoned")
    }

    /// Number of operations that were failed on purpose.
    #[allow(clippy::expect_used)]
    pub fn injected_failures(&self) -> usize {
        *self.injected_failures.lock().expect("injected_failures mutex poisoned")
    }

    /// Count the operation and decide whether to fail it.
    #[allow(clippy::expect_used)]
    fn roll(&self) -> Result<(), StorageError> {
        *self.operation_count.lock().expect("operation_count mutex poisoned") += 1;

        let fail = self.rng.lock().expect("ChaoticRng mutex poisoned").next() < self.failure_rate;
        if fail {
            *self.injected_failures.lock().expect("injected_failures mutex poisoned") += 1;
            return Err(StorageError::Io("chaotic failure injection".to_string()));
        }
        Ok(())
    }
}

impl<S: AuditStore> AuditStore for ChaoticAuditStore<S> {
    fn upsert_file_state(&self, state: &FileState) -> Result<(), StorageError> {
        self.roll()?;
        self.inner.upsert_file_state(state)
    }

    fn remove_file_state(&self, path: &str) -> Result<Option<FileState>, StorageError> {
        self.roll()?;
        self.inner.remove_file_state(path)
    }

    fn get_file_state(&self, path: &str) -> Result<Option<FileState>, StorageError> {
        self.roll()?;
        self.inner.get_file_state(path)
    }

    fn append_event(&self, record: &EventRecord) -> Result<(), StorageError> {
        self.roll()?;
        self.inner.append_event(record)
    }

    fn commit_event(
        &self,
        record: &EventRecord,
        change: StateChange<'_>,
    ) -> Result<(), StorageError> {
        self.roll()?;
        self.inner.commit_event(record, change)
    }

    fn query_events(
        &self,
        path: Option<&str>,
        limit: usize,
    ) -> Result<Vec<EventRecord>, StorageError> {
        self.roll()?;
        self.inner.query_events(path, limit)
    }
}

#[cfg(test)]
mod tests {
    use keygate_core::EventKind;

    use super::*;
    use crate::storage::MemoryAuditStore;

    #[test]
    fn zero_rate_never_fails() {
        let store = ChaoticAuditStore::new(MemoryAuditStore::new(), 0.0);
        for ts in 0..100 {
            store.append_event(&EventRecord::new("/a", EventKind::Create, ts)).unwrap();
        }
        assert_eq!(store.inner().event_count(), 100);
        assert_eq!(store.operation_count(), 100);
        assert_eq!(store.injected_failures(), 0);
    }

    #[test]
    fn full_rate_always_fails() {
        let store = ChaoticAuditStore::new(MemoryAuditStore::new(), 1.0);
        assert!(store.get_file_state("/a").is_err());
        assert!(store.append_event(&EventRecord::new("/a", EventKind::Create, 0)).is_err());
        assert_eq!(store.inner().event_count(), 0);
        assert_eq!(store.injected_failures(), 2);
    }

    #[test]
    fn same_seed_same_failures() {
        let run = |seed| {
            let store = ChaoticAuditStore::with_seed(MemoryAuditStore::new(), 0.5, seed);
            (0..64).map(|_| store.get_file_state("/a").is_err()).collect::<Vec<_>>()
        };
        assert_eq!(run(42), run(42));
    }
}
