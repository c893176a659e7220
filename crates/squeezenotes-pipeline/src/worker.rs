//! Compression worker: turns queued raw blobs into compressed ones.
//!
//! Per task: fetch raw → compress → write compressed → delete raw
//! (best-effort) → flip metadata to `Compressed` → acknowledge. The task is
//! acknowledged only after the metadata flip has committed, so any crash
//! before that point leads to redelivery. Compression and key derivation are
//! deterministic, which makes a re-run converge to the same final state.
//!
//! Every step is tied to the BLAKE3 digest recorded at ingest. A run whose
//! content no longer matches the record (the version was re-ingested under
//! it) stops before touching blobs and leaves the version to the newer task.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::blob::ObjectStore;
use crate::codec::Codec;
use crate::deadline::Deadlines;
use crate::error::{Dependency, PipelineError, Result, Stage, StoreError};
use crate::index::{MetadataIndex, UpdateOutcome};
use crate::policy::{enforce, require};
use crate::queue::{Delivery, WorkQueue};
use crate::record::{
    compressed_key, compression_ratio, CompressionTask, DocumentRecord, DocumentStatus, NoteKey,
    RecordUpdate,
};

/// What happened to one delivery.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    /// Compressed, committed and acknowledged.
    Compressed {
        /// Note version
        key: NoteKey,
        /// Raw size
        uncompressed_size: u64,
        /// Size of the compressed blob written
        compressed_size: u64,
        /// compressed / uncompressed
        compression_ratio: Option<f64>,
    },
    /// Redelivery of a task whose effect had already committed; acknowledged.
    AlreadyCompressed {
        /// Note version
        key: NoteKey,
    },
    /// The version was re-ingested mid-run; acknowledged in favour of the newer task.
    Superseded {
        /// Note version
        key: NoteKey,
    },
    /// Left in the queue for redelivery.
    Skipped {
        /// Why processing stopped
        reason: String,
    },
    /// Removed from circulation.
    DeadLettered {
        /// Why it can never succeed
        reason: String,
    },
}

/// Tally of a processed batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    /// Tasks compressed in this batch
    pub compressed: u64,
    /// Redeliveries acknowledged without work
    pub already_compressed: u64,
    /// Tasks overtaken by a re-ingest of the same version
    #[serde(default)]
    pub superseded: u64,
    /// Tasks left for redelivery
    pub skipped: u64,
    /// Tasks moved to the dead-letter list
    pub dead_lettered: u64,
    /// Raw bytes read
    pub bytes_in: u64,
    /// Compressed bytes written
    pub bytes_out: u64,
}

impl BatchReport {
    fn record(&mut self, outcome: &TaskOutcome) {
        match outcome {
            TaskOutcome::Compressed {
                uncompressed_size,
                compressed_size,
                ..
            } => {
                self.compressed += 1;
                self.bytes_in += uncompressed_size;
                self.bytes_out += compressed_size;
            }
            TaskOutcome::AlreadyCompressed { .. } => self.already_compressed += 1,
            TaskOutcome::Superseded { .. } => self.superseded += 1,
            TaskOutcome::Skipped { .. } => self.skipped += 1,
            TaskOutcome::DeadLettered { .. } => self.dead_lettered += 1,
        }
    }

    /// Fold another report into this one.
    pub fn merge(&mut self, other: &BatchReport) {
        self.compressed += other.compressed;
        self.already_compressed += other.already_compressed;
        self.superseded += other.superseded;
        self.skipped += other.skipped;
        self.dead_lettered += other.dead_lettered;
        self.bytes_in += other.bytes_in;
        self.bytes_out += other.bytes_out;
    }

    /// Total deliveries handled.
    pub fn total(&self) -> u64 {
        self.compressed + self.already_compressed + self.superseded + self.skipped + self.dead_lettered
    }
}

struct CompressedBlob {
    data: Vec<u8>,
    digest: String,
    uncompressed_size: u64,
}

/// Stateless compression worker over injected ports.
pub struct CompressionWorker {
    blobs: Arc<dyn ObjectStore>,
    index: Arc<dyn MetadataIndex>,
    queue: Arc<dyn WorkQueue>,
    codec: Codec,
    deadlines: Deadlines,
    max_deliveries: u32,
}

impl CompressionWorker {
    /// Wire the worker. Tasks delivered more than `max_deliveries` times are dead-lettered.
    pub fn new(
        blobs: Arc<dyn ObjectStore>,
        index: Arc<dyn MetadataIndex>,
        queue: Arc<dyn WorkQueue>,
        codec: Codec,
        deadlines: Deadlines,
        max_deliveries: u32,
    ) -> Self {
        Self {
            blobs,
            index,
            queue,
            codec,
            deadlines,
            max_deliveries,
        }
    }

    /// Handle one delivered batch. Never fails as a whole: every delivery
    /// gets its own outcome and a bad entry does not abort the rest.
    pub async fn process_batch(&self, batch: Vec<Delivery>) -> (Vec<TaskOutcome>, BatchReport) {
        let mut report = BatchReport::default();
        let mut outcomes = Vec::with_capacity(batch.len());
        for delivery in &batch {
            let outcome = self.process_delivery(delivery).await;
            report.record(&outcome);
            outcomes.push(outcome);
        }
        debug!(
            compressed = report.compressed,
            skipped = report.skipped,
            dead_lettered = report.dead_lettered,
            "Batch processed"
        );
        (outcomes, report)
    }

    /// Receive one batch from the queue and process it.
    pub async fn poll_once(&self, max: usize, visibility: Duration) -> Result<BatchReport> {
        let batch = require(
            Stage::Receive,
            self.deadlines
                .call(Dependency::WorkQueue, Stage::Receive, self.queue.receive(max, visibility))
                .await,
        )?;
        if batch.is_empty() {
            return Ok(BatchReport::default());
        }
        let (_, report) = self.process_batch(batch).await;
        Ok(report)
    }

    /// Poll until a receive comes back empty. Tasks hidden by an earlier
    /// delivery are not waited for.
    pub async fn drain(&self, max: usize, visibility: Duration) -> Result<BatchReport> {
        let mut total = BatchReport::default();
        loop {
            let report = self.poll_once(max, visibility).await?;
            if report.total() == 0 {
                return Ok(total);
            }
            total.merge(&report);
        }
    }

    /// Handle one delivery.
    pub async fn process_delivery(&self, delivery: &Delivery) -> TaskOutcome {
        let task = match CompressionTask::from_message(&delivery.body) {
            Ok(task) => task,
            Err(e) => {
                error!(message_id = %delivery.message_id, error = %e, "Malformed compression task");
                return self.dead_letter(delivery, e.to_string()).await;
            }
        };

        if delivery.receive_count > self.max_deliveries {
            let reason = format!(
                "delivered {} times, limit is {}",
                delivery.receive_count, self.max_deliveries
            );
            error!(note_id = %task.note_id, key = %task.raw_key, %reason, "Giving up on compression task");
            return self.dead_letter(delivery, reason).await;
        }

        match self.compress_task(&task, delivery).await {
            Ok(outcome) => outcome,
            Err(e) => {
                if matches!(e, PipelineError::CorruptData(_)) {
                    error!(note_id = %task.note_id, key = %task.raw_key, corrupt_data = true, error = %e, "Compression task hit corrupt data");
                } else {
                    warn!(note_id = %task.note_id, key = %task.raw_key, error = %e, "Compression task skipped, awaiting redelivery");
                }
                TaskOutcome::Skipped {
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn compress_task(&self, task: &CompressionTask, delivery: &Delivery) -> Result<TaskOutcome> {
        let key = task.key()?;
        let target_key = compressed_key(&task.raw_key, self.codec.id());

        let record = self.load_record(&key).await?;
        if is_committed(&record, &target_key) {
            self.acknowledge(delivery).await?;
            info!(note_id = %key.note_id, version = %key.version, "Duplicate delivery acknowledged");
            return Ok(TaskOutcome::AlreadyCompressed { key });
        }

        let compressed = match self.fetch_blob(&task.raw_key, Stage::FetchRaw).await? {
            Some(raw) => {
                let digest = blake3::hash(&raw).to_hex().to_string();
                // Raw blob and record disagree while a re-ingest is half written.
                if !record.describes(&digest) {
                    return Err(PipelineError::StaleContent(key.to_string()));
                }
                let data = self
                    .codec
                    .compress(&raw)
                    .map_err(|e| PipelineError::CorruptData(e.to_string()))?;
                CompressedBlob {
                    data,
                    digest,
                    uncompressed_size: raw.len() as u64,
                }
            }
            // A previous run got past the raw delete but not the metadata flip.
            None => self.recover_from_compressed(&record, &target_key, &task.raw_key).await?,
        };

        if !self.still_current(&key, &compressed.digest).await? {
            return self.supersede(delivery, key).await;
        }

        let ratio = compression_ratio(compressed.data.len(), compressed.uncompressed_size as usize);
        let compressed_size = compressed.data.len() as u64;

        require(
            Stage::StoreCompressed,
            self.deadlines
                .call(
                    Dependency::ObjectStore,
                    Stage::StoreCompressed,
                    self.blobs.put(&target_key, Bytes::from(compressed.data)),
                )
                .await,
        )?;

        // The raw key may already hold a newer upload of this version.
        if !self.still_current(&key, &compressed.digest).await? {
            return self.supersede(delivery, key).await;
        }

        enforce(
            Stage::DeleteRaw,
            self.deadlines
                .call(Dependency::ObjectStore, Stage::DeleteRaw, self.blobs.delete(&task.raw_key))
                .await,
        )?;

        let update = RecordUpdate::MarkCompressed {
            compressed_key: target_key.clone(),
            codec: self.codec.id(),
            content_digest: compressed.digest,
            uncompressed_size: compressed.uncompressed_size,
            compression_ratio: ratio,
        };
        let outcome = require(
            Stage::MarkCompressed,
            self.deadlines
                .call(Dependency::MetadataIndex, Stage::MarkCompressed, self.index.update(&key, update))
                .await,
        )?;
        match outcome {
            UpdateOutcome::Applied(_) => {}
            UpdateOutcome::Missing => return Err(PipelineError::NotFound),
            UpdateOutcome::Rejected(PipelineError::StaleContent(_)) => {
                return self.supersede(delivery, key).await
            }
            UpdateOutcome::Rejected(e) => return Err(e),
        }

        self.acknowledge(delivery).await?;

        info!(
            note_id = %key.note_id,
            version = %key.version,
            key = %target_key,
            uncompressed_size = compressed.uncompressed_size,
            compressed_size,
            ratio = ?ratio,
            "Note compressed"
        );
        Ok(TaskOutcome::Compressed {
            key,
            uncompressed_size: compressed.uncompressed_size,
            compressed_size,
            compression_ratio: ratio,
        })
    }

    async fn load_record(&self, key: &NoteKey) -> Result<DocumentRecord> {
        require(
            Stage::LoadMetadata,
            self.deadlines
                .call(Dependency::MetadataIndex, Stage::LoadMetadata, self.index.get(key))
                .await,
        )?
        .ok_or(PipelineError::NotFound)
    }

    /// Whether the record still describes the content being compressed.
    async fn still_current(&self, key: &NoteKey, digest: &str) -> Result<bool> {
        Ok(self.load_record(key).await?.describes(digest))
    }

    /// Acknowledge a task whose version was re-ingested under it. The newer
    /// upload queued its own task, so nothing here may be written or deleted.
    async fn supersede(&self, delivery: &Delivery, key: NoteKey) -> Result<TaskOutcome> {
        self.acknowledge(delivery).await?;
        info!(note_id = %key.note_id, version = %key.version, "Note re-ingested during compression, task superseded");
        Ok(TaskOutcome::Superseded { key })
    }

    /// Fetch a blob, mapping a missing key to `None`.
    async fn fetch_blob(&self, blob_key: &str, stage: Stage) -> Result<Option<Bytes>> {
        let fetch = async {
            match self.blobs.get(blob_key).await {
                Ok(bytes) => Ok(Some(bytes)),
                Err(StoreError::NotFound(_)) => Ok(None),
                Err(e) => Err(e),
            }
        };
        require(
            stage,
            self.deadlines
                .call(Dependency::ObjectStore, stage, fetch)
                .await,
        )
    }

    /// Rebuild the compression result from an already written compressed
    /// blob, checking it against the ingested digest.
    async fn recover_from_compressed(
        &self,
        record: &DocumentRecord,
        target_key: &str,
        raw_key: &str,
    ) -> Result<CompressedBlob> {
        let stored = self
            .fetch_blob(target_key, Stage::FetchCompressed)
            .await?
            .ok_or_else(|| {
                PipelineError::dependency(
                    Dependency::ObjectStore,
                    Stage::FetchRaw,
                    format!("no such key: {}", raw_key),
                )
            })?;
        let plain = self
            .codec
            .decompress(&stored, self.codec.id())
            .map_err(|e| PipelineError::CorruptData(e.to_string()))?;
        let digest = blake3::hash(&plain).to_hex().to_string();
        if !record.describes(&digest) {
            return Err(PipelineError::CorruptData(format!(
                "digest mismatch for {}",
                target_key
            )));
        }
        info!(key = %target_key, "Recovered interrupted compression from stored blob");
        Ok(CompressedBlob {
            data: stored.to_vec(),
            digest,
            uncompressed_size: plain.len() as u64,
        })
    }

    async fn acknowledge(&self, delivery: &Delivery) -> Result<()> {
        require(
            Stage::Acknowledge,
            self.deadlines
                .call(Dependency::WorkQueue, Stage::Acknowledge, self.queue.delete(&delivery.receipt))
                .await,
        )
    }

    async fn dead_letter(&self, delivery: &Delivery, reason: String) -> TaskOutcome {
        let result = self
            .deadlines
            .call(
                Dependency::WorkQueue,
                Stage::Acknowledge,
                self.queue.dead_letter(&delivery.receipt, &reason),
            )
            .await;
        match result {
            Ok(()) => TaskOutcome::DeadLettered { reason },
            Err(e) => {
                warn!(message_id = %delivery.message_id, error = %e, "Failed to dead-letter task");
                TaskOutcome::Skipped {
                    reason: e.to_string(),
                }
            }
        }
    }
}

fn is_committed(record: &DocumentRecord, target_key: &str) -> bool {
    record.status == DocumentStatus::Compressed
        && record.compressed_key.as_deref() == Some(target_key)
        && record.compressed_digest == record.content_digest
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::MemoryObjectStore;
    use crate::codec::CompressionAlgorithm;
    use crate::index::MemoryMetadataIndex;
    use crate::queue::MemoryWorkQueue;

    const HIDE: Duration = Duration::from_secs(30);

    struct Harness {
        blobs: Arc<MemoryObjectStore>,
        index: Arc<MemoryMetadataIndex>,
        queue: Arc<MemoryWorkQueue>,
        worker: CompressionWorker,
    }

    fn harness(max_deliveries: u32) -> Harness {
        let blobs = Arc::new(MemoryObjectStore::new());
        let index = Arc::new(MemoryMetadataIndex::new());
        let queue = Arc::new(MemoryWorkQueue::new());
        let worker = CompressionWorker::new(
            blobs.clone(),
            index.clone(),
            queue.clone(),
            Codec::new(CompressionAlgorithm::Zstd { level: 3 }),
            Deadlines::default(),
            max_deliveries,
        );
        Harness {
            blobs,
            index,
            queue,
            worker,
        }
    }

    async fn seed(h: &Harness, id: &str, version: &str, content: &[u8]) -> NoteKey {
        let key = NoteKey::new(id, version).unwrap();
        let raw_key = key.raw_key("notes/");
        h.blobs.put(&raw_key, Bytes::copy_from_slice(content)).await.unwrap();
        let digest = blake3::hash(content).to_hex().to_string();
        h.index
            .put(DocumentRecord::uploaded(&key, String::new(), raw_key.clone(), digest))
            .await
            .unwrap();
        h.queue
            .send(CompressionTask::new(&key, raw_key).to_message().unwrap())
            .await
            .unwrap();
        key
    }

    #[tokio::test]
    async fn test_compresses_and_acknowledges() {
        let h = harness(5);
        let key = seed(&h, "n1", "1", &b"abcde".repeat(200)).await;

        let batch = h.queue.receive(10, HIDE).await.unwrap();
        let (outcomes, report) = h.worker.process_batch(batch).await;

        assert_eq!(report.compressed, 1);
        assert!(matches!(outcomes[0], TaskOutcome::Compressed { uncompressed_size: 1000, .. }));
        assert_eq!(report.bytes_in, 1000);
        let stored = h.blobs.get("notes/n1_v1.zst").await.unwrap();
        assert_eq!(report.bytes_out, stored.len() as u64);
        assert!(!h.blobs.contains("notes/n1_v1.txt"));
        assert!(h.blobs.contains("notes/n1_v1.zst"));
        assert!(h.queue.is_empty().await);

        let record = h.index.get(&key).await.unwrap().unwrap();
        assert_eq!(record.status, DocumentStatus::Compressed);
        assert_eq!(record.compressed_key.as_deref(), Some("notes/n1_v1.zst"));
        assert_eq!(record.uncompressed_size, Some(1000));
        let ratio = record.compression_ratio.unwrap();
        assert!(ratio > 0.0 && ratio <= 1.0);
    }

    #[tokio::test]
    async fn test_malformed_entry_does_not_abort_batch() {
        let h = harness(5);
        h.queue.send("{not json".into()).await.unwrap();
        seed(&h, "n1", "1", b"hello hello hello").await;

        let batch = h.queue.receive(10, HIDE).await.unwrap();
        let (_, report) = h.worker.process_batch(batch).await;

        assert_eq!(report.dead_lettered, 1);
        assert_eq!(report.compressed, 1);
        assert_eq!(h.queue.dead_letters().await.len(), 1);
        assert!(h.queue.is_empty().await);
    }

    #[tokio::test]
    async fn test_duplicate_delivery_is_idempotent() {
        let h = harness(5);
        let key = seed(&h, "n1", "1", &b"abcde".repeat(200)).await;
        let body = CompressionTask::new(&key, key.raw_key("notes/")).to_message().unwrap();
        h.queue.send(body).await.unwrap();

        let batch = h.queue.receive(1, HIDE).await.unwrap();
        h.worker.process_batch(batch).await;
        let first = h.index.get(&key).await.unwrap().unwrap();

        let batch = h.queue.receive(1, HIDE).await.unwrap();
        let (outcomes, _) = h.worker.process_batch(batch).await;
        assert_eq!(outcomes[0], TaskOutcome::AlreadyCompressed { key: key.clone() });

        assert_eq!(h.index.get(&key).await.unwrap().unwrap(), first);
        assert!(h.queue.is_empty().await);
    }

    #[tokio::test]
    async fn test_missing_raw_blob_is_skipped() {
        let h = harness(5);
        let key = seed(&h, "n1", "1", b"content").await;
        h.blobs.delete(&key.raw_key("notes/")).await.unwrap();

        let batch = h.queue.receive(1, HIDE).await.unwrap();
        let (outcomes, _) = h.worker.process_batch(batch).await;

        assert!(matches!(outcomes[0], TaskOutcome::Skipped { .. }));
        assert_eq!(h.queue.len().await, 1);
        let record = h.index.get(&key).await.unwrap().unwrap();
        assert_eq!(record.status, DocumentStatus::Uploaded);
    }

    #[tokio::test]
    async fn test_recovers_after_raw_deleted_before_flip() {
        let h = harness(5);
        let content = b"abcde".repeat(200);
        let key = seed(&h, "n1", "1", &content).await;

        // Simulate a crash between the raw delete and the metadata flip.
        let compressed = Codec::default().compress(&content).unwrap();
        h.blobs.put("notes/n1_v1.zst", Bytes::from(compressed)).await.unwrap();
        h.blobs.delete("notes/n1_v1.txt").await.unwrap();

        let batch = h.queue.receive(1, HIDE).await.unwrap();
        let (outcomes, _) = h.worker.process_batch(batch).await;

        assert!(matches!(outcomes[0], TaskOutcome::Compressed { uncompressed_size: 1000, .. }));
        let record = h.index.get(&key).await.unwrap().unwrap();
        assert_eq!(record.status, DocumentStatus::Compressed);
        assert!(h.queue.is_empty().await);
    }

    #[tokio::test]
    async fn test_raw_newer_than_record_is_left_queued() {
        let h = harness(5);
        let key = seed(&h, "n1", "1", b"first").await;
        // Half-finished re-ingest: raw blob rewritten, record not yet.
        h.blobs
            .put(&key.raw_key("notes/"), Bytes::from_static(b"second"))
            .await
            .unwrap();

        let batch = h.queue.receive(1, HIDE).await.unwrap();
        let (outcomes, _) = h.worker.process_batch(batch).await;

        assert!(matches!(outcomes[0], TaskOutcome::Skipped { .. }));
        assert_eq!(h.queue.len().await, 1);
        assert_eq!(h.blobs.get("notes/n1_v1.txt").await.unwrap(), Bytes::from_static(b"second"));
        assert!(!h.blobs.contains("notes/n1_v1.zst"));
        let record = h.index.get(&key).await.unwrap().unwrap();
        assert_eq!(record.status, DocumentStatus::Uploaded);
    }

    #[test]
    fn test_commit_requires_matching_digest() {
        let key = NoteKey::new("n1", "1").unwrap();
        let mut record = DocumentRecord::uploaded(&key, String::new(), key.raw_key("notes/"), "new".into());
        record.status = DocumentStatus::Compressed;
        record.compressed_key = Some("notes/n1_v1.zst".into());
        record.compressed_digest = Some("old".into());
        assert!(!is_committed(&record, "notes/n1_v1.zst"));

        record.compressed_digest = Some("new".into());
        assert!(is_committed(&record, "notes/n1_v1.zst"));
        assert!(!is_committed(&record, "notes/n1_v1.lz4"));
    }

    /// Store whose reads of compressed blobs fail.
    struct CompressedReadsDown(MemoryObjectStore);

    #[async_trait::async_trait]
    impl ObjectStore for CompressedReadsDown {
        async fn get(&self, key: &str) -> std::result::Result<Bytes, StoreError> {
            if key.ends_with(".zst") {
                return Err(StoreError::Unavailable("read timeout".into()));
            }
            self.0.get(key).await
        }

        async fn put(&self, key: &str, data: Bytes) -> std::result::Result<(), StoreError> {
            self.0.put(key, data).await
        }

        async fn delete(&self, key: &str) -> std::result::Result<(), StoreError> {
            self.0.delete(key).await
        }
    }

    #[tokio::test]
    async fn test_recovery_fetch_failure_keeps_its_stage() {
        let index = Arc::new(MemoryMetadataIndex::new());
        let queue = Arc::new(MemoryWorkQueue::new());
        let worker = CompressionWorker::new(
            Arc::new(CompressedReadsDown(MemoryObjectStore::new())),
            index.clone(),
            queue.clone(),
            Codec::new(CompressionAlgorithm::Zstd { level: 3 }),
            Deadlines::default(),
            5,
        );
        // No raw blob, so the worker falls back to the compressed copy.
        let key = NoteKey::new("n1", "1").unwrap();
        let raw_key = key.raw_key("notes/");
        index
            .put(DocumentRecord::uploaded(&key, String::new(), raw_key.clone(), "d".into()))
            .await
            .unwrap();
        queue
            .send(CompressionTask::new(&key, raw_key).to_message().unwrap())
            .await
            .unwrap();

        let batch = queue.receive(1, HIDE).await.unwrap();
        let TaskOutcome::Skipped { reason } = worker.process_delivery(&batch[0]).await else {
            panic!("expected the task to be skipped");
        };
        assert!(reason.contains("fetch compressed note"), "{}", reason);
        assert!(reason.contains("read timeout"), "{}", reason);
    }

    #[tokio::test]
    async fn test_poison_task_is_dead_lettered() {
        let h = harness(1);
        let key = seed(&h, "n1", "1", b"content").await;
        h.blobs.delete(&key.raw_key("notes/")).await.unwrap();

        let batch = h.queue.receive(1, Duration::ZERO).await.unwrap();
        let (outcomes, _) = h.worker.process_batch(batch).await;
        assert!(matches!(outcomes[0], TaskOutcome::Skipped { .. }));

        let batch = h.queue.receive(1, Duration::ZERO).await.unwrap();
        assert_eq!(batch[0].receive_count, 2);
        let (outcomes, _) = h.worker.process_batch(batch).await;
        assert!(matches!(outcomes[0], TaskOutcome::DeadLettered { .. }));
        assert!(h.queue.is_empty().await);
    }

    #[tokio::test]
    async fn test_empty_content_has_null_ratio() {
        let h = harness(5);
        let key = seed(&h, "n1", "1", b"").await;

        let batch = h.queue.receive(1, HIDE).await.unwrap();
        h.worker.process_batch(batch).await;

        let record = h.index.get(&key).await.unwrap().unwrap();
        assert_eq!(record.status, DocumentStatus::Compressed);
        assert_eq!(record.uncompressed_size, Some(0));
        assert_eq!(record.compression_ratio, None);
    }

    #[tokio::test]
    async fn test_task_without_record_is_skipped() {
        let h = harness(5);
        let key = NoteKey::new("ghost", "1").unwrap();
        h.queue
            .send(CompressionTask::new(&key, key.raw_key("notes/")).to_message().unwrap())
            .await
            .unwrap();

        let batch = h.queue.receive(1, HIDE).await.unwrap();
        let (outcomes, _) = h.worker.process_batch(batch).await;
        assert!(matches!(outcomes[0], TaskOutcome::Skipped { .. }));
    }
}
