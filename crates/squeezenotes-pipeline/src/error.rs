//! Error types for the squeezenotes pipeline

use std::fmt;

use serde::{Deserialize, Serialize};

/// Result alias used across the pipeline.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// External service a call was made against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dependency {
    /// Blob storage for raw and compressed payloads
    ObjectStore,
    /// Key-value index of document records
    MetadataIndex,
    /// At-least-once task queue
    WorkQueue,
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Dependency::ObjectStore => "object store",
            Dependency::MetadataIndex => "metadata index",
            Dependency::WorkQueue => "work queue",
        };
        f.write_str(name)
    }
}

/// Pipeline step an external call belongs to. Used to name the failing
/// stage in caller-visible error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Ingestion: raw blob write
    StoreRaw,
    /// Ingestion: metadata upsert
    StoreMetadata,
    /// Ingestion: task enqueue
    Enqueue,
    /// Worker: raw blob fetch
    FetchRaw,
    /// Worker: compressed blob write
    StoreCompressed,
    /// Worker: raw blob delete
    DeleteRaw,
    /// Worker: metadata flip to compressed
    MarkCompressed,
    /// Worker: task acknowledgment
    Acknowledge,
    /// Worker: queue receive
    Receive,
    /// Retrieval: metadata lookup
    LoadMetadata,
    /// Retrieval: compressed blob fetch
    FetchCompressed,
    /// Retrieval: latency write-back
    RecordLatency,
    /// Metrics: full index scan
    Scan,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::StoreRaw => "store note in object store",
            Stage::StoreMetadata => "store metadata",
            Stage::Enqueue => "enqueue compression task",
            Stage::FetchRaw => "fetch raw note",
            Stage::StoreCompressed => "store compressed note",
            Stage::DeleteRaw => "delete raw note",
            Stage::MarkCompressed => "mark note compressed",
            Stage::Acknowledge => "acknowledge task",
            Stage::Receive => "receive tasks",
            Stage::LoadMetadata => "fetch metadata",
            Stage::FetchCompressed => "fetch compressed note",
            Stage::RecordLatency => "record read latency",
            Stage::Scan => "scan metadata",
        };
        f.write_str(name)
    }
}

/// Errors returned by the storage and queue ports themselves, before the
/// pipeline attaches the dependency and stage they occurred in.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The addressed key or receipt does not exist
    #[error("no such key: {0}")]
    NotFound(String),
    /// The service is unreachable or rejected the call
    #[error("unavailable: {0}")]
    Unavailable(String),
}

/// All errors surfaced by the ingestion, compression, retrieval and metrics paths.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PipelineError {
    /// Caller supplied a malformed request. No side effects were attempted.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// No record exists for the requested note version.
    #[error("Note not found")]
    NotFound,
    /// The record exists but its compressed form is not available yet.
    #[error("Compressed note not found")]
    NotReady,
    /// An external service failed, timed out or returned an error.
    #[error("Failed to {stage}: {dependency} error: {reason}")]
    DependencyFailure {
        /// Service that failed
        dependency: Dependency,
        /// Pipeline step that was running
        stage: Stage,
        /// Underlying error text
        reason: String,
    },
    /// Stored bytes could not be decoded back into the original note.
    #[error("Corrupt data: {0}")]
    CorruptData(String),
    /// A worker result built from content the record no longer describes,
    /// because the version was re-ingested while compression ran.
    #[error("Stale content for {0}: note was re-ingested")]
    StaleContent(String),
    /// A status change that the record state machine does not allow.
    #[error("Illegal status transition: {from} -> {to}")]
    IllegalTransition {
        /// Current status
        from: crate::record::DocumentStatus,
        /// Requested status
        to: crate::record::DocumentStatus,
    },
}

impl PipelineError {
    /// Shorthand for a dependency failure.
    pub fn dependency(dependency: Dependency, stage: Stage, reason: impl Into<String>) -> Self {
        PipelineError::DependencyFailure {
            dependency,
            stage,
            reason: reason.into(),
        }
    }

    /// Attach dependency and stage to a port error.
    pub fn from_store(dependency: Dependency, stage: Stage, err: StoreError) -> Self {
        Self::dependency(dependency, stage, err.to_string())
    }

    /// HTTP-equivalent status code for the error.
    pub fn status_code(&self) -> u16 {
        match self {
            PipelineError::InvalidInput(_) => 400,
            PipelineError::NotFound | PipelineError::NotReady => 404,
            PipelineError::DependencyFailure { .. }
            | PipelineError::CorruptData(_)
            | PipelineError::StaleContent(_)
            | PipelineError::IllegalTransition { .. } => 500,
        }
    }

    /// Only `NotReady` is worth polling on; everything else is final for the request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PipelineError::NotReady)
    }

    /// The stage a dependency failure happened in, if any.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineError::DependencyFailure { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}
