//! Write path: store raw bytes, record metadata, enqueue compression.
//!
//! The three steps run in order and each may fail independently. There is
//! no rollback: a failure after the blob write leaves a dangling raw blob,
//! and a failure after the metadata upsert leaves an `Uploaded` record with
//! no queued task. Both are tolerated by the at-least-once design.

use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::blob::ObjectStore;
use crate::deadline::Deadlines;
use crate::error::{Dependency, PipelineError, Result, Stage};
use crate::index::MetadataIndex;
use crate::policy::require;
use crate::queue::WorkQueue;
use crate::record::{CompressionTask, DocumentRecord, NoteKey, DEFAULT_VERSION};

/// Write request. Every field is optional on the wire so that missing
/// fields surface as `InvalidInput` rather than a decode failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestRequest {
    /// Document id (required)
    pub note_id: Option<String>,
    /// Version, defaults to "1". Numbers are accepted and kept as text.
    #[serde(default, deserialize_with = "crate::record::version_string")]
    pub version: Option<String>,
    /// Note body (required, non-empty)
    pub content: Option<String>,
    /// Title, defaults to empty
    pub title: Option<String>,
}

impl IngestRequest {
    /// Convenience constructor for a fully specified request.
    pub fn new(note_id: &str, version: &str, content: &str) -> Self {
        Self {
            note_id: Some(note_id.to_string()),
            version: Some(version.to_string()),
            content: Some(content.to_string()),
            title: None,
        }
    }

    /// Set the title.
    pub fn with_title(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }
}

/// Whether the caller is creating a note or writing a new version of it.
/// Only the success message differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IngestMode {
    /// First write (POST)
    #[default]
    Create,
    /// Subsequent write (PUT)
    Update,
}

/// Successful write acknowledgment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReceipt {
    /// Human-readable outcome
    pub message: String,
    /// Document id
    pub note_id: String,
    /// Stored version
    pub version: String,
    /// Raw object key
    #[serde(rename = "s3_key")]
    pub raw_key: String,
}

struct ValidatedNote {
    key: NoteKey,
    content: String,
    title: String,
}

fn validate(request: IngestRequest) -> Result<ValidatedNote> {
    let note_id = request
        .note_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| PipelineError::InvalidInput("missing note_id".into()))?;
    let content = request
        .content
        .filter(|c| !c.is_empty())
        .ok_or_else(|| PipelineError::InvalidInput("missing content".into()))?;
    let version = request.version.unwrap_or_else(|| DEFAULT_VERSION.to_string());
    let key = NoteKey::new(note_id, version)?;
    Ok(ValidatedNote {
        key,
        content,
        title: request.title.unwrap_or_default(),
    })
}

/// Ingestion service. Stateless apart from its injected ports.
pub struct IngestService {
    blobs: Arc<dyn ObjectStore>,
    index: Arc<dyn MetadataIndex>,
    queue: Arc<dyn WorkQueue>,
    deadlines: Deadlines,
    key_prefix: String,
}

impl IngestService {
    /// Wire the service to its ports.
    pub fn new(
        blobs: Arc<dyn ObjectStore>,
        index: Arc<dyn MetadataIndex>,
        queue: Arc<dyn WorkQueue>,
        deadlines: Deadlines,
        key_prefix: impl Into<String>,
    ) -> Self {
        Self {
            blobs,
            index,
            queue,
            deadlines,
            key_prefix: key_prefix.into(),
        }
    }

    /// Store a note version and schedule its compression.
    ///
    /// Re-submitting an existing (note id, version) overwrites it and
    /// schedules a fresh compression; last writer wins.
    pub async fn ingest(&self, request: IngestRequest, mode: IngestMode) -> Result<IngestReceipt> {
        let note = validate(request)?;
        let key = note.key;
        let raw_key = key.raw_key(&self.key_prefix);
        let bytes = Bytes::from(note.content.into_bytes());
        let digest = blake3::hash(&bytes).to_hex().to_string();

        self.step(
            Stage::StoreRaw,
            &key,
            self.deadlines
                .call(Dependency::ObjectStore, Stage::StoreRaw, self.blobs.put(&raw_key, bytes)),
        )
        .await?;

        let record = DocumentRecord::uploaded(&key, note.title, raw_key.clone(), digest);
        self.step(
            Stage::StoreMetadata,
            &key,
            self.deadlines
                .call(Dependency::MetadataIndex, Stage::StoreMetadata, self.index.put(record)),
        )
        .await?;

        let body = CompressionTask::new(&key, raw_key.clone()).to_message()?;
        self.step(
            Stage::Enqueue,
            &key,
            self.deadlines
                .call(Dependency::WorkQueue, Stage::Enqueue, self.queue.send(body)),
        )
        .await?;

        info!(note_id = %key.note_id, version = %key.version, key = %raw_key, "Note stored and queued for compression");

        let message = match mode {
            IngestMode::Create => "Note uploaded successfully",
            IngestMode::Update => "Note updated successfully",
        };
        Ok(IngestReceipt {
            message: message.to_string(),
            note_id: key.note_id,
            version: key.version,
            raw_key,
        })
    }

    async fn step<T>(
        &self,
        stage: Stage,
        key: &NoteKey,
        call: impl std::future::Future<Output = Result<T>>,
    ) -> Result<T> {
        let result = require(stage, call.await);
        if let Err(e) = &result {
            error!(note_id = %key.note_id, version = %key.version, %stage, error = %e, "Ingestion failed");
        }
        result
    }
}
