//! Metadata index port: one [`DocumentRecord`] per (note id, version).
//!
//! Only single-key atomicity is assumed. `put` replaces a record wholesale
//! (last writer wins); `update` applies a [`RecordUpdate`] to one record
//! atomically, so telemetry writes never clobber status fields.

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::{PipelineError, StoreError};
use crate::record::{DocumentRecord, NoteKey, RecordUpdate};

/// Outcome of an [`MetadataIndex::update`] call.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    /// The update was applied; carries the resulting record.
    Applied(DocumentRecord),
    /// No record exists under the key.
    Missing,
    /// The record rejected the update (illegal transition or stale content).
    Rejected(PipelineError),
}

/// Key-value index of document records.
#[async_trait]
pub trait MetadataIndex: Send + Sync {
    /// Get a record. Returns `None` if it doesn't exist.
    async fn get(&self, key: &NoteKey) -> Result<Option<DocumentRecord>, StoreError>;

    /// Upsert a record, overwriting any existing one.
    async fn put(&self, record: DocumentRecord) -> Result<(), StoreError>;

    /// Atomically apply a partial update to one record.
    async fn update(&self, key: &NoteKey, update: RecordUpdate) -> Result<UpdateOutcome, StoreError>;

    /// Every record, in key order.
    async fn scan(&self) -> Result<Vec<DocumentRecord>, StoreError>;
}

/// In-memory index backed by a `DashMap`. Per-key updates hold the shard
/// lock for the duration of the mutation, which gives single-key atomicity.
#[derive(Debug, Default)]
pub struct MemoryMetadataIndex {
    records: DashMap<NoteKey, DocumentRecord>,
}

impl MemoryMetadataIndex {
    /// Creates a new empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when the index holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl MetadataIndex for MemoryMetadataIndex {
    async fn get(&self, key: &NoteKey) -> Result<Option<DocumentRecord>, StoreError> {
        Ok(self.records.get(key).map(|r| r.value().clone()))
    }

    async fn put(&self, record: DocumentRecord) -> Result<(), StoreError> {
        self.records.insert(record.key(), record);
        Ok(())
    }

    async fn update(&self, key: &NoteKey, update: RecordUpdate) -> Result<UpdateOutcome, StoreError> {
        let Some(mut entry) = self.records.get_mut(key) else {
            return Ok(UpdateOutcome::Missing);
        };
        let mut next = entry.value().clone();
        match next.apply(&update) {
            Ok(()) => {
                *entry.value_mut() = next.clone();
                Ok(UpdateOutcome::Applied(next))
            }
            Err(e) => Ok(UpdateOutcome::Rejected(e)),
        }
    }

    async fn scan(&self) -> Result<Vec<DocumentRecord>, StoreError> {
        let mut all: Vec<DocumentRecord> = self.records.iter().map(|e| e.value().clone()).collect();
        all.sort_by(|a, b| (&a.note_id, &a.version).cmp(&(&b.note_id, &b.version)));
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::CodecId;
    use crate::record::DocumentStatus;

    fn record(id: &str, version: &str) -> DocumentRecord {
        let key = NoteKey::new(id, version).unwrap();
        let raw = key.raw_key("notes/");
        DocumentRecord::uploaded(&key, "title".into(), raw, "digest".into())
    }

    fn mark() -> RecordUpdate {
        RecordUpdate::MarkCompressed {
            compressed_key: "notes/a_v1.zst".into(),
            codec: CodecId::Zstd,
            content_digest: "digest".into(),
            uncompressed_size: 100,
            compression_ratio: Some(0.4),
        }
    }

    #[tokio::test]
    async fn test_put_get() {
        let index = MemoryMetadataIndex::new();
        index.put(record("a", "1")).await.unwrap();
        let key = NoteKey::new("a", "1").unwrap();
        assert_eq!(index.get(&key).await.unwrap(), Some(record("a", "1")));
        assert_eq!(index.get(&NoteKey::new("a", "2").unwrap()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let index = MemoryMetadataIndex::new();
        let key = NoteKey::new("a", "1").unwrap();
        index.put(record("a", "1")).await.unwrap();
        index.update(&key, mark()).await.unwrap();

        index.put(record("a", "1")).await.unwrap();
        let stored = index.get(&key).await.unwrap().unwrap();
        assert_eq!(stored.status, DocumentStatus::Uploaded);
        assert_eq!(stored.compressed_key, None);
    }

    #[tokio::test]
    async fn test_update_applies() {
        let index = MemoryMetadataIndex::new();
        let key = NoteKey::new("a", "1").unwrap();
        index.put(record("a", "1")).await.unwrap();

        let outcome = index.update(&key, mark()).await.unwrap();
        let UpdateOutcome::Applied(updated) = outcome else {
            panic!("expected applied, got {:?}", outcome);
        };
        assert_eq!(updated.status, DocumentStatus::Compressed);
        assert_eq!(index.get(&key).await.unwrap(), Some(updated));
    }

    #[tokio::test]
    async fn test_update_missing() {
        let index = MemoryMetadataIndex::new();
        let key = NoteKey::new("ghost", "1").unwrap();
        assert_eq!(index.update(&key, mark()).await.unwrap(), UpdateOutcome::Missing);
        assert!(index.is_empty());
    }

    #[tokio::test]
    async fn test_scan_sorted() {
        let index = MemoryMetadataIndex::new();
        index.put(record("b", "1")).await.unwrap();
        index.put(record("a", "2")).await.unwrap();
        index.put(record("a", "1")).await.unwrap();

        let all = index.scan().await.unwrap();
        let keys: Vec<_> = all.iter().map(|r| (r.note_id.as_str(), r.version.as_str())).collect();
        assert_eq!(keys, vec![("a", "1"), ("a", "2"), ("b", "1")]);
    }
}
