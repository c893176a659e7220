//! Read path: metadata lookup, compressed fetch, decompression, and
//! best-effort latency write-back.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::blob::ObjectStore;
use crate::codec::Codec;
use crate::deadline::Deadlines;
use crate::error::{Dependency, PipelineError, Result, Stage};
use crate::index::MetadataIndex;
use crate::policy::{enforce, require};
use crate::record::{NoteKey, RecordUpdate};

/// A note as returned to readers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Document id
    pub note_id: String,
    /// Version
    pub version: String,
    /// Title, empty when none was supplied
    pub title: String,
    /// Original content
    pub content: String,
}

/// Retrieval service.
pub struct RetrieveService {
    blobs: Arc<dyn ObjectStore>,
    index: Arc<dyn MetadataIndex>,
    codec: Codec,
    deadlines: Deadlines,
}

impl RetrieveService {
    /// `codec` supplies the dictionary; the algorithm comes from each record.
    pub fn new(
        blobs: Arc<dyn ObjectStore>,
        index: Arc<dyn MetadataIndex>,
        codec: Codec,
        deadlines: Deadlines,
    ) -> Self {
        Self {
            blobs,
            index,
            codec,
            deadlines,
        }
    }

    /// Read one note version.
    ///
    /// Fails with `NotFound` when no record exists and with `NotReady` while
    /// the compressed copy is still pending.
    pub async fn retrieve(&self, note_id: Option<&str>, version: Option<&str>) -> Result<Note> {
        let started = Instant::now();
        let (Some(note_id), Some(version)) = (note_id, version) else {
            return Err(PipelineError::InvalidInput(
                "note_id and version are required".into(),
            ));
        };
        let key = NoteKey::new(note_id, version)?;

        let record = require(
            Stage::LoadMetadata,
            self.deadlines
                .call(Dependency::MetadataIndex, Stage::LoadMetadata, self.index.get(&key))
                .await,
        )?
        .ok_or(PipelineError::NotFound)?;

        let Some((blob_key, codec_id)) = record.readable_blob() else {
            warn!(note_id = %key.note_id, version = %key.version, status = %record.status, "Note not compressed yet");
            return Err(PipelineError::NotReady);
        };

        let stored = require(
            Stage::FetchCompressed,
            self.deadlines
                .call(Dependency::ObjectStore, Stage::FetchCompressed, self.blobs.get(blob_key))
                .await,
        )?;

        let decompress_started = Instant::now();
        let plain = self
            .codec
            .decompress(&stored, codec_id)
            .map_err(|e| self.corrupt(&key, blob_key, e.to_string()))?;
        let decompression_ms = elapsed_ms(decompress_started);

        if let Some(expected) = &record.content_digest {
            if blake3::hash(&plain).to_hex().as_str() != expected {
                return Err(self.corrupt(&key, blob_key, "content digest mismatch".into()));
            }
        }
        let content = String::from_utf8(plain)
            .map_err(|e| self.corrupt(&key, blob_key, e.to_string()))?;

        let read_ms = elapsed_ms(started);
        let update = RecordUpdate::ReadLatency {
            decompression_ms,
            read_ms,
        };
        enforce(
            Stage::RecordLatency,
            self.deadlines
                .call(Dependency::MetadataIndex, Stage::RecordLatency, self.index.update(&key, update))
                .await,
        )?;

        info!(
            note_id = %key.note_id,
            version = %key.version,
            decompression_ms,
            read_ms,
            "Note retrieved"
        );
        Ok(Note {
            note_id: record.note_id,
            version: record.version,
            title: record.title,
            content,
        })
    }

    fn corrupt(&self, key: &NoteKey, blob_key: &str, reason: String) -> PipelineError {
        error!(note_id = %key.note_id, version = %key.version, key = %blob_key, corrupt_data = true, %reason, "Stored note failed to decode");
        PipelineError::CorruptData(reason)
    }
}

fn elapsed_ms(since: Instant) -> f64 {
    since.elapsed().as_secs_f64() * 1000.0
}
