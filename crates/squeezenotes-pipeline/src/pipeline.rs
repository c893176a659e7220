//! Assembly: ingest → queue → worker → compressed store → retrieve → metrics

use std::sync::Arc;

use crate::background::{BackgroundHandle, BackgroundWorker};
use crate::blob::{MemoryObjectStore, ObjectStore};
use crate::config::PipelineConfig;
use crate::deadline::Deadlines;
use crate::error::Result;
use crate::index::{MemoryMetadataIndex, MetadataIndex};
use crate::ingest::IngestService;
use crate::metrics::MetricsAggregator;
use crate::queue::{MemoryWorkQueue, WorkQueue};
use crate::readiness::ReadinessPoller;
use crate::retrieve::{Note, RetrieveService};
use crate::worker::{BatchReport, CompressionWorker};

/// The three external services every component talks to.
#[derive(Clone)]
pub struct Ports {
    /// Raw and compressed blobs
    pub blobs: Arc<dyn ObjectStore>,
    /// Document records
    pub index: Arc<dyn MetadataIndex>,
    /// Compression tasks
    pub queue: Arc<dyn WorkQueue>,
}

impl Ports {
    /// Fresh in-memory adapters.
    pub fn in_memory() -> Self {
        Self {
            blobs: Arc::new(MemoryObjectStore::new()),
            index: Arc::new(MemoryMetadataIndex::new()),
            queue: Arc::new(MemoryWorkQueue::new()),
        }
    }
}

/// All services wired to one set of ports and one configuration.
pub struct Pipeline {
    config: PipelineConfig,
    /// Write path
    pub ingest: IngestService,
    /// Queue consumer
    pub worker: Arc<CompressionWorker>,
    /// Read path
    pub retrieve: RetrieveService,
    /// Read-all statistics
    pub metrics: MetricsAggregator,
    /// Client-side wait for pending compression
    pub poller: ReadinessPoller,
}

impl Pipeline {
    /// Wire every service. Fails only if the configured dictionary cannot be read.
    pub fn new(config: PipelineConfig, ports: Ports) -> std::io::Result<Self> {
        let codec = config.codec.build()?;
        let deadlines = Deadlines::new(config.timeouts.clone());

        let ingest = IngestService::new(
            ports.blobs.clone(),
            ports.index.clone(),
            ports.queue.clone(),
            deadlines.clone(),
            config.key_prefix.clone(),
        );
        let worker = Arc::new(CompressionWorker::new(
            ports.blobs.clone(),
            ports.index.clone(),
            ports.queue,
            codec.clone(),
            deadlines.clone(),
            config.worker.max_deliveries,
        ));
        let retrieve = RetrieveService::new(ports.blobs, ports.index.clone(), codec, deadlines.clone());
        let metrics = MetricsAggregator::new(ports.index, deadlines);
        let poller = ReadinessPoller::new(config.readiness.clone());

        Ok(Self {
            config,
            ingest,
            worker,
            retrieve,
            metrics,
            poller,
        })
    }

    /// Configuration the pipeline was built from.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Spawn the background queue consumer.
    pub fn start_worker(&self) -> BackgroundHandle {
        BackgroundWorker::start(self.worker.clone(), self.config.worker.clone())
    }

    /// Process everything currently visible in the queue, in the caller's task.
    pub async fn drain_queue(&self) -> Result<BatchReport> {
        self.worker
            .drain(self.config.worker.batch_size, self.config.worker.visibility_timeout())
            .await
    }

    /// Read a note, polling while its compression is pending.
    pub async fn retrieve_when_ready(&self, note_id: &str, version: &str) -> Result<Note> {
        self.poller.retrieve(&self.retrieve, note_id, version).await
    }
}
