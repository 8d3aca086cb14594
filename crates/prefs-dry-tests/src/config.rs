// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! In-memory blob store fake for testing without filesystem I/O.

use prefs_app_core::config::{BlobStore, StoreError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// In-memory implementation of [`BlobStore`] for testing.
///
/// Clones share state, so a test can keep a handle while the store under
/// test owns another. Failure injection and call counters let tests assert
/// how persistence was exercised.
///
/// # Example
///
/// ```
/// use prefs_dry_tests::InMemoryBlobStore;
/// use prefs_app_core::config::DocumentService;
///
/// let store = InMemoryBlobStore::new();
/// let service = DocumentService::new(store.clone());
///
/// service.save("preferences", &serde_json::json!({"theme": {}})).unwrap();
/// assert_eq!(store.save_count(), 1);
/// assert!(store.contains_key("preferences"));
/// ```
#[derive(Clone, Default)]
pub struct InMemoryBlobStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    data: HashMap<String, Vec<u8>>,
    load_count: usize,
    save_count: usize,
    fail_on_load: bool,
    fail_on_save: bool,
}

impl InMemoryBlobStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Configure the store to fail on load operations.
    pub fn set_fail_on_load(&self, fail: bool) {
        self.lock().fail_on_load = fail;
    }

    /// Configure the store to fail on save operations.
    pub fn set_fail_on_save(&self, fail: bool) {
        self.lock().fail_on_save = fail;
    }

    /// Number of `load_raw` attempts, including failed ones.
    pub fn load_count(&self) -> usize {
        self.lock().load_count
    }

    /// Number of `save_raw` attempts, including failed ones.
    pub fn save_count(&self) -> usize {
        self.lock().save_count
    }

    /// Check if a key exists in the store.
    pub fn contains_key(&self, key: &str) -> bool {
        self.lock().data.contains_key(key)
    }

    /// Raw bytes at `key` without counting or failure injection; empty if absent.
    pub fn load_raw_unchecked(&self, key: &str) -> Vec<u8> {
        self.lock().data.get(key).cloned().unwrap_or_default()
    }
}

impl BlobStore for InMemoryBlobStore {
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let mut inner = self.lock();
        inner.load_count += 1;
        if inner.fail_on_load {
            return Err(StoreError::Other("simulated load failure".into()));
        }
        inner.data.get(key).cloned().ok_or(StoreError::NotFound)
    }

    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.save_count += 1;
        if inner.fail_on_save {
            return Err(StoreError::Other("simulated save failure".into()));
        }
        inner.data.insert(key.to_string(), data.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clone_shares_data_and_counters() {
        let a = InMemoryBlobStore::new();
        let b = a.clone();
        a.save_raw("k", b"v").unwrap();
        assert_eq!(b.load_raw("k").unwrap(), b"v");
        assert_eq!((a.save_count(), a.load_count()), (1, 1));
    }

    #[test]
    fn failed_save_counts_but_stores_nothing() {
        let store = InMemoryBlobStore::new();
        store.set_fail_on_save(true);
        assert!(store.save_raw("k", b"v").is_err());
        assert_eq!(store.save_count(), 1);
        assert!(!store.contains_key("k"));
        store.set_fail_on_save(false);
        store.save_raw("k", b"v").unwrap();
        assert!(store.contains_key("k"));
    }

    #[test]
    fn failed_load_reports_other() {
        let store = InMemoryBlobStore::new();
        store.set_fail_on_load(true);
        assert!(matches!(store.load_raw("k"), Err(StoreError::Other(_))));
        assert_eq!(store.load_raw_unchecked("k"), Vec::<u8>::new());
    }
}
