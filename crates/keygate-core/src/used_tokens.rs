//! Ledger of consumed tokens.
//!
//! Enforces at-most-once use. The only mutating operation is
//! [`UsedTokenSet::check_and_insert`], which must be a single critical
//! section: two validators racing on the same token must see exactly one
//! `true`.

use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
};

use keygate_crypto::Token;

use crate::CoreError;

/// Set of tokens that have already been consumed.
///
/// Implementations must be safe to share between validators.
pub trait UsedTokenSet: Send + Sync {
    /// Atomically insert `token` if absent.
    ///
    /// Returns `true` when this call inserted it, `false` when it was already
    /// present.
    ///
    /// # Errors
    ///
    /// - `CoreError::UsedSetUnavailable` if the backing store failed
    fn check_and_insert(&self, token: &Token) -> Result<bool, CoreError>;

    /// Whether `token` has been consumed.
    fn contains(&self, token: &Token) -> Result<bool, CoreError>;
}

/// In-process used-token set.
///
/// Lives as long as the process. Use the durable store in the monitor when
/// consumption must survive restarts.
#[derive(Clone, Default)]
pub struct MemoryUsedTokens {
    inner: Arc<Mutex<HashSet<Token>>>,
}

impl MemoryUsedTokens {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of consumed tokens.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    pub fn len(&self) -> usize {
        self.inner.lock().expect("Mutex poisoned").len()
    }

    /// Whether no token has been consumed yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl UsedTokenSet for MemoryUsedTokens {
    #[allow(clippy::expect_used)]
    fn check_and_insert(&self, token: &Token) -> Result<bool, CoreError> {
        let mut used = self.inner.lock().expect("Mutex poisoned");
        Ok(used.insert(*token))
    }

    #[allow(clippy::expect_used)]
    fn contains(&self, token: &Token) -> Result<bool, CoreError> {
        Ok(self.inner.lock().expect("Mutex poisoned").contains(token))
    }
}

impl<T: UsedTokenSet + ?Sized> UsedTokenSet for Arc<T> {
    fn check_and_insert(&self, token: &Token) -> Result<bool, CoreError> {
        (**self).check_and_insert(token)
    }

    fn contains(&self, token: &Token) -> Result<bool, CoreError> {
        (**self).contains(token)
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn first_insert_wins() {
        let used = MemoryUsedTokens::new();
        let token = Token::from_bytes([9; 16]);

        assert!(used.check_and_insert(&token).unwrap());
        assert!(!used.check_and_insert(&token).unwrap());
        assert!(used.contains(&token).unwrap());
        assert_eq!(used.len(), 1);
    }

    #[test]
    fn concurrent_inserts_admit_exactly_one() {
        let used = MemoryUsedTokens::new();
        let token = Token::from_bytes([0x77; 16]);

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let used = used.clone();
                thread::spawn(move || used.check_and_insert(&token).unwrap())
            })
            .collect();

        let winners = handles.into_iter().map(|h| h.join().unwrap()).filter(|won| *won).count();

        assert_eq!(winners, 1, "exactly one validator may consume a token");
    }

    #[test]
    fn clones_share_state() {
        let a = MemoryUsedTokens::new();
        let b = a.clone();
        let token = Token::from_bytes([1; 16]);

        a.check_and_insert(&token).unwrap();
        assert!(b.contains(&token).unwrap());
    }
}
