//! Object store port for raw and compressed note payloads.

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;

use crate::error::StoreError;

/// Key-addressed blob storage. No query capability beyond point operations.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch the blob at `key`. Missing keys are `StoreError::NotFound`.
    async fn get(&self, key: &str) -> Result<Bytes, StoreError>;

    /// Write the blob at `key`, overwriting any previous value.
    async fn put(&self, key: &str, data: Bytes) -> Result<(), StoreError>;

    /// Delete the blob at `key`. Deleting a missing key succeeds.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

/// In-memory object store. Does not persist across restarts.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: DashMap<String, Bytes>,
}

impl MemoryObjectStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `key` currently holds a blob.
    pub fn contains(&self, key: &str) -> bool {
        self.objects.contains_key(key)
    }

    /// Number of stored blobs.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// True when no blobs are stored.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Total stored bytes across all blobs.
    pub fn total_bytes(&self) -> u64 {
        self.objects.iter().map(|e| e.value().len() as u64).sum()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn get(&self, key: &str) -> Result<Bytes, StoreError> {
        self.objects
            .get(key)
            .map(|e| e.value().clone())
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn put(&self, key: &str, data: Bytes) -> Result<(), StoreError> {
        tracing::trace!(key, bytes = data.len(), "put object");
        self.objects.insert(key.to_string(), data);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.objects.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get() {
        let store = MemoryObjectStore::new();
        store.put("notes/a.txt", Bytes::from_static(b"hello")).await.unwrap();
        assert_eq!(store.get("notes/a.txt").await.unwrap(), Bytes::from_static(b"hello"));
        assert_eq!(store.total_bytes(), 5);
    }

    #[tokio::test]
    async fn test_missing_key() {
        let store = MemoryObjectStore::new();
        assert_eq!(
            store.get("nope").await.unwrap_err(),
            StoreError::NotFound("nope".into())
        );
    }

    #[tokio::test]
    async fn test_overwrite_and_delete() {
        let store = MemoryObjectStore::new();
        store.put("k", Bytes::from_static(b"v1")).await.unwrap();
        store.put("k", Bytes::from_static(b"v2")).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Bytes::from_static(b"v2"));

        store.delete("k").await.unwrap();
        assert!(!store.contains("k"));
        // delete-if-exists
        store.delete("k").await.unwrap();
        assert!(store.is_empty());
    }
}
