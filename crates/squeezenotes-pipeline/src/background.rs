//! Long-running queue drain loop around a [`CompressionWorker`].
//! Handles:
//! - Batched receive with a visibility timeout
//! - Idle back-off between empty polls
//! - Statistics reporting over a watch channel

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::worker::{BatchReport, CompressionWorker};

/// Configuration for the background worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Maximum tasks received per poll.
    pub batch_size: usize,
    /// How long a received task stays hidden before redelivery.
    pub visibility_timeout_ms: u64,
    /// Sleep after an empty poll.
    pub poll_interval_ms: u64,
    /// Deliveries allowed before a task is dead-lettered.
    pub max_deliveries: u32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            visibility_timeout_ms: 30_000,
            poll_interval_ms: 1_000,
            max_deliveries: 5,
        }
    }
}

impl WorkerConfig {
    /// Visibility timeout as a `Duration`.
    pub fn visibility_timeout(&self) -> Duration {
        Duration::from_millis(self.visibility_timeout_ms)
    }

    /// Idle poll interval as a `Duration`.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Statistics tracked by the background worker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerStats {
    /// Non-empty batches processed.
    pub batches: u64,
    /// Receive calls that failed.
    pub receive_errors: u64,
    /// Cumulative task outcomes.
    pub totals: BatchReport,
}

/// Handle to a running background worker.
pub struct BackgroundHandle {
    shutdown: watch::Sender<bool>,
    stats: watch::Receiver<WorkerStats>,
    task: JoinHandle<()>,
}

impl BackgroundHandle {
    /// Get a snapshot of current stats.
    pub fn stats(&self) -> WorkerStats {
        self.stats.borrow().clone()
    }

    /// Wait until the published stats satisfy `pred`. Returns `None` if the
    /// worker stopped first.
    pub async fn wait_for<F>(&self, mut pred: F) -> Option<WorkerStats>
    where
        F: FnMut(&WorkerStats) -> bool,
    {
        let mut rx = self.stats.clone();
        let stats = match rx.wait_for(|s| pred(s)).await {
            Ok(stats) => Some((*stats).clone()),
            Err(_) => None,
        };
        stats
    }

    /// Check if the background loop is still running.
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stop the loop after the batch in progress and wait for it to exit.
    pub async fn shutdown(self) -> WorkerStats {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            warn!(error = %e, "Background worker ended abnormally");
        }
        let stats = self.stats.borrow().clone();
        stats
    }
}

/// Background loop that keeps draining the work queue.
pub struct BackgroundWorker {
    worker: Arc<CompressionWorker>,
    config: WorkerConfig,
    stats_tx: watch::Sender<WorkerStats>,
    stats: WorkerStats,
}

impl BackgroundWorker {
    /// Create and start the background loop.
    /// Returns a BackgroundHandle for reading stats and stopping it.
    pub fn start(worker: Arc<CompressionWorker>, config: WorkerConfig) -> BackgroundHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (stats_tx, stats_rx) = watch::channel(WorkerStats::default());

        let background = BackgroundWorker {
            worker,
            config,
            stats_tx,
            stats: WorkerStats::default(),
        };

        let task = tokio::spawn(background.run(shutdown_rx));

        BackgroundHandle {
            shutdown: shutdown_tx,
            stats: stats_rx,
            task,
        }
    }

    async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            batch_size = self.config.batch_size,
            visibility_ms = self.config.visibility_timeout_ms,
            "Compression worker started"
        );
        loop {
            if *shutdown.borrow() {
                break;
            }

            let idle = match self
                .worker
                .poll_once(self.config.batch_size, self.config.visibility_timeout())
                .await
            {
                Ok(report) if report.total() == 0 => true,
                Ok(report) => {
                    self.stats.batches += 1;
                    self.stats.totals.merge(&report);
                    false
                }
                Err(e) => {
                    self.stats.receive_errors += 1;
                    warn!(error = %e, "Failed to receive compression tasks");
                    true
                }
            };
            let _ = self.stats_tx.send(self.stats.clone());

            if idle {
                tokio::select! {
                    _ = tokio::time::sleep(self.config.poll_interval()) => {}
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
        }
        debug!(batches = self.stats.batches, "Compression worker stopped");
    }
}
