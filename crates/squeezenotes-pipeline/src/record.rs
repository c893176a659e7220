//! Note version records, their status state machine, and the compression task message.

use std::fmt;

use serde::{de, Deserialize, Deserializer, Serialize};

use crate::codec::CodecId;
use crate::error::{PipelineError, Result};

/// Version assigned when a request omits one.
pub const DEFAULT_VERSION: &str = "1";

/// Suffix of raw (uncompressed) object keys.
pub const RAW_SUFFIX: &str = ".txt";

/// Identity of a note version in the metadata index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NoteKey {
    /// Document id
    pub note_id: String,
    /// Caller-supplied version string
    pub version: String,
}

impl NoteKey {
    /// Build a key, rejecting empty components.
    pub fn new(note_id: impl Into<String>, version: impl Into<String>) -> Result<Self> {
        let note_id = note_id.into();
        let version = version.into();
        if note_id.is_empty() {
            return Err(PipelineError::InvalidInput("note_id must not be empty".into()));
        }
        if version.is_empty() {
            return Err(PipelineError::InvalidInput("version must not be empty".into()));
        }
        Ok(Self { note_id, version })
    }

    /// Object store key for the raw bytes of this version.
    pub fn raw_key(&self, prefix: &str) -> String {
        format!("{}{}_v{}{}", prefix, self.note_id, self.version, RAW_SUFFIX)
    }
}

impl fmt::Display for NoteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@v{}", self.note_id, self.version)
    }
}

/// Compressed key derived from a raw key by substituting its suffix.
pub fn compressed_key(raw_key: &str, codec: CodecId) -> String {
    let stem = raw_key.strip_suffix(RAW_SUFFIX).unwrap_or(raw_key);
    format!("{}{}", stem, codec.extension())
}

/// Lifecycle status of a note version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    /// Raw bytes stored, compression pending
    Uploaded,
    /// Compressed bytes stored and authoritative
    Compressed,
}

impl DocumentStatus {
    /// Legal transitions. `Compressed -> Compressed` is the idempotent
    /// re-apply that a redelivered task performs.
    pub fn can_transition_to(self, next: DocumentStatus) -> bool {
        matches!(
            (self, next),
            (DocumentStatus::Uploaded, DocumentStatus::Compressed)
                | (DocumentStatus::Compressed, DocumentStatus::Compressed)
        )
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentStatus::Uploaded => f.write_str("uploaded"),
            DocumentStatus::Compressed => f.write_str("compressed"),
        }
    }
}

/// One row of the metadata index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Document id
    pub note_id: String,
    /// Version string
    pub version: String,
    /// Title, empty when none was supplied
    pub title: String,
    /// Current lifecycle status
    pub status: DocumentStatus,
    /// Raw blob key; cleared once the compressed copy is authoritative
    pub raw_key: Option<String>,
    /// Compressed blob key, set on the flip to `Compressed`
    pub compressed_key: Option<String>,
    /// Codec the compressed blob was written with
    pub codec: Option<CodecId>,
    /// BLAKE3 hex digest of the raw content
    pub content_digest: Option<String>,
    /// Digest of the content the compressed blob was built from
    #[serde(default)]
    pub compressed_digest: Option<String>,
    /// Raw size in bytes, set by the worker
    pub uncompressed_size: Option<u64>,
    /// compressed / uncompressed; `None` for empty content
    pub compression_ratio: Option<f64>,
    /// Last observed decompression time, milliseconds
    pub decompression_latency: Option<f64>,
    /// Last observed end-to-end read time, milliseconds
    pub read_latency: Option<f64>,
}

impl DocumentRecord {
    /// Fresh record as written by ingestion.
    pub fn uploaded(key: &NoteKey, title: String, raw_key: String, content_digest: String) -> Self {
        Self {
            note_id: key.note_id.clone(),
            version: key.version.clone(),
            title,
            status: DocumentStatus::Uploaded,
            raw_key: Some(raw_key),
            compressed_key: None,
            codec: None,
            content_digest: Some(content_digest),
            compressed_digest: None,
            uncompressed_size: None,
            compression_ratio: None,
            decompression_latency: None,
            read_latency: None,
        }
    }

    /// Index key of this record.
    pub fn key(&self) -> NoteKey {
        NoteKey {
            note_id: self.note_id.clone(),
            version: self.version.clone(),
        }
    }

    /// Compressed key and codec if the compressed copy is readable.
    pub fn readable_blob(&self) -> Option<(&str, CodecId)> {
        if self.status != DocumentStatus::Compressed {
            return None;
        }
        match (self.compressed_key.as_deref(), self.codec) {
            (Some(key), Some(codec)) => Some((key, codec)),
            _ => None,
        }
    }

    /// True when `digest` is the content this record currently describes.
    /// Records written before digests existed match anything.
    pub fn describes(&self, digest: &str) -> bool {
        self.content_digest.as_deref().map_or(true, |d| d == digest)
    }

    /// Apply a partial update in place. The status and digest checks live
    /// here so every index adapter enforces the same rules.
    pub fn apply(&mut self, update: &RecordUpdate) -> Result<()> {
        match update {
            RecordUpdate::MarkCompressed {
                compressed_key,
                codec,
                content_digest,
                uncompressed_size,
                compression_ratio,
            } => {
                let next = DocumentStatus::Compressed;
                if !self.status.can_transition_to(next) {
                    return Err(PipelineError::IllegalTransition {
                        from: self.status,
                        to: next,
                    });
                }
                if !self.describes(content_digest) {
                    return Err(PipelineError::StaleContent(self.key().to_string()));
                }
                self.status = next;
                self.raw_key = None;
                self.compressed_key = Some(compressed_key.clone());
                self.codec = Some(*codec);
                self.compressed_digest = Some(content_digest.clone());
                self.uncompressed_size = Some(*uncompressed_size);
                self.compression_ratio = *compression_ratio;
            }
            RecordUpdate::ReadLatency {
                decompression_ms,
                read_ms,
            } => {
                self.decompression_latency = Some(*decompression_ms);
                self.read_latency = Some(*read_ms);
            }
        }
        Ok(())
    }
}

/// Single-key partial update applied atomically by the metadata index.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordUpdate {
    /// Worker flip to `Compressed`
    MarkCompressed {
        /// Key of the compressed blob
        compressed_key: String,
        /// Codec used
        codec: CodecId,
        /// BLAKE3 hex digest of the content that was compressed
        content_digest: String,
        /// Raw length in bytes
        uncompressed_size: u64,
        /// compressed / uncompressed, `None` when uncompressed is 0
        compression_ratio: Option<f64>,
    },
    /// Read-path telemetry
    ReadLatency {
        /// Decompression wall time
        decompression_ms: f64,
        /// Whole-request wall time
        read_ms: f64,
    },
}

/// compressed / uncompressed, undefined for empty input.
pub fn compression_ratio(compressed_len: usize, uncompressed_len: usize) -> Option<f64> {
    if uncompressed_len == 0 {
        None
    } else {
        Some(compressed_len as f64 / uncompressed_len as f64)
    }
}

/// Accept a version given either as a JSON string or as a number.
/// Numbers keep their JSON spelling, so `2` becomes `"2"`.
pub(crate) fn version_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s)),
        Some(serde_json::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(de::Error::custom(format!(
            "version must be a string or a number, got {}",
            other
        ))),
    }
}

/// Queue message asking a worker to compress one raw blob.
///
/// Wire shape: `{"note_id": ..., "version": ..., "s3_key": ...}` with `version` optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressionTask {
    /// Document id
    pub note_id: String,
    /// Version, defaults to "1" when absent
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "version_string"
    )]
    pub version: Option<String>,
    /// Raw blob key
    #[serde(rename = "s3_key")]
    pub raw_key: String,
}

impl CompressionTask {
    /// Task for a freshly ingested version.
    pub fn new(key: &NoteKey, raw_key: String) -> Self {
        Self {
            note_id: key.note_id.clone(),
            version: Some(key.version.clone()),
            raw_key,
        }
    }

    /// Parse and validate a queue message body.
    pub fn from_message(body: &str) -> Result<Self> {
        let task: CompressionTask = serde_json::from_str(body)
            .map_err(|e| PipelineError::InvalidInput(format!("malformed task: {}", e)))?;
        if task.raw_key.is_empty() {
            return Err(PipelineError::InvalidInput("malformed task: empty s3_key".into()));
        }
        // Validates note_id/version as a side effect.
        task.key()?;
        Ok(task)
    }

    /// Serialize to a queue message body.
    pub fn to_message(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| PipelineError::InvalidInput(format!("unencodable task: {}", e)))
    }

    /// Index key the task refers to.
    pub fn key(&self) -> Result<NoteKey> {
        NoteKey::new(
            self.note_id.clone(),
            self.version.clone().unwrap_or_else(|| DEFAULT_VERSION.to_string()),
        )
    }
}
