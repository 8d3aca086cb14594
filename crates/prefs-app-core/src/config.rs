// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Durable key-value port and the JSON document service built on it.

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

/// Storage port for raw document blobs (keyed by logical name).
pub trait BlobStore {
    /// Load a raw blob. Returns `NotFound` when missing.
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, StoreError>;
    /// Persist a raw blob, replacing any previous value.
    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), StoreError>;
}

/// Error type for blob/document persistence.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Key not present in store.
    #[error("not found")]
    NotFound,
    /// I/O error while reading/writing.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization/deserialization failure.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
    /// Catch-all error variant.
    #[error("other: {0}")]
    Other(String),
}

/// Serializes documents as JSON and delegates storage to a [`BlobStore`].
pub struct DocumentService<S> {
    store: S,
}

impl<S> DocumentService<S> {
    /// Create a new service using the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Borrow the inner store.
    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S> DocumentService<S>
where
    S: BlobStore,
{
    /// Load and deserialize the document at `key`. Empty or missing blobs yield `Ok(None)`.
    pub fn load<T>(&self, key: &str) -> Result<Option<T>, StoreError>
    where
        T: DeserializeOwned,
    {
        match self.store.load_raw(key) {
            Ok(bytes) if bytes.is_empty() => Ok(None),
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(StoreError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Serialize and persist a document at `key`.
    pub fn save<T>(&self, key: &str, value: &T) -> Result<(), StoreError>
    where
        T: Serialize,
    {
        let data = serde_json::to_vec_pretty(value)?;
        self.store.save_raw(key, &data)
    }

    /// Load `key`, or build it with `init` and persist it once when absent.
    pub fn load_or_insert_with<T, F>(&self, key: &str, init: F) -> Result<T, StoreError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> T,
    {
        if let Some(existing) = self.load(key)? {
            return Ok(existing);
        }
        let value = init();
        self.save(key, &value)?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MapStore(RefCell<HashMap<String, Vec<u8>>>);

    impl BlobStore for MapStore {
        fn load_raw(&self, key: &str) -> Result<Vec<u8>, StoreError> {
            self.0.borrow().get(key).cloned().ok_or(StoreError::NotFound)
        }

        fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), StoreError> {
            self.0.borrow_mut().insert(key.into(), data.to_vec());
            Ok(())
        }
    }

    #[test]
    fn missing_and_empty_blobs_load_as_none() {
        let svc = DocumentService::new(MapStore::default());
        assert!(svc.load::<u32>("absent").unwrap().is_none());
        svc.store().save_raw("empty", b"").unwrap();
        assert!(svc.load::<u32>("empty").unwrap().is_none());
    }

    #[test]
    fn load_or_insert_persists_only_when_absent() {
        let svc = DocumentService::new(MapStore::default());
        let first: u32 = svc.load_or_insert_with("n", || 7).unwrap();
        let second: u32 = svc.load_or_insert_with("n", || 9).unwrap();
        assert_eq!((first, second), (7, 7));
    }

    #[test]
    fn corrupt_blob_surfaces_serde_error() {
        let svc = DocumentService::new(MapStore::default());
        svc.store().save_raw("bad", b"{not json").unwrap();
        assert!(matches!(svc.load::<u32>("bad"), Err(StoreError::Serde(_))));
    }
}
