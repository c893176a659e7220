#![warn(missing_docs)]

//! SqueezeNotes: versioned note storage with deferred background compression (Zstd/LZ4)
//!
//! Write path: Note → Raw blob → Metadata (uploaded) → Compression task
//! Worker:     Task → Raw blob → Compress → Compressed blob → Metadata (compressed) → Ack
//! Read path:  Metadata → Compressed blob → Decompress → Verify → Note (+ latency telemetry)

pub mod api;
pub mod background;
pub mod blob;
pub mod codec;
pub mod config;
pub mod deadline;
pub mod error;
pub mod index;
pub mod ingest;
pub mod metrics;
pub mod pipeline;
pub mod policy;
pub mod queue;
pub mod readiness;
pub mod record;
pub mod retrieve;
pub mod worker;

pub use api::{ApiResponse, ErrorBody, RetrieveQuery};
pub use background::{BackgroundHandle, BackgroundWorker, WorkerConfig, WorkerStats};
pub use blob::{MemoryObjectStore, ObjectStore};
pub use codec::{Codec, CodecError, CodecId, CompressionAlgorithm};
pub use config::{CodecConfig, PipelineConfig};
pub use deadline::{Deadlines, TimeoutConfig};
pub use error::{Dependency, PipelineError, Result, Stage, StoreError};
pub use index::{MemoryMetadataIndex, MetadataIndex, UpdateOutcome};
pub use ingest::{IngestMode, IngestReceipt, IngestRequest, IngestService};
pub use metrics::{MetricsAggregator, MetricsReport, MetricsSummary, NoteMetrics};
pub use pipeline::{Pipeline, Ports};
pub use policy::Criticality;
pub use queue::{DeadLetter, Delivery, MemoryWorkQueue, WorkQueue};
pub use readiness::{ReadinessConfig, ReadinessPoller};
pub use record::{CompressionTask, DocumentRecord, DocumentStatus, NoteKey, RecordUpdate};
pub use retrieve::{Note, RetrieveService};
pub use worker::{BatchReport, CompressionWorker, TaskOutcome};
