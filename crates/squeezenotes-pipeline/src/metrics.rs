//! Compression and read-latency statistics over the whole metadata index.
//!
//! Snapshot only: records still mid-transition show up as uploaded and do not
//! contribute to the averages.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::deadline::Deadlines;
use crate::error::{Dependency, Result, Stage};
use crate::index::MetadataIndex;
use crate::policy::require;
use crate::record::DocumentRecord;

/// Per-record projection. Missing values stay `None`, never zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteMetrics {
    /// Document id
    pub note_id: String,
    /// Version
    pub version: String,
    /// Raw size in bytes
    pub uncompressed_size: Option<u64>,
    /// compressed / uncompressed
    pub compression_ratio: Option<f64>,
    /// Last decompression time, ms
    pub decompression_latency: Option<f64>,
    /// Last total read time, ms
    pub read_latency: Option<f64>,
}

impl From<&DocumentRecord> for NoteMetrics {
    fn from(record: &DocumentRecord) -> Self {
        Self {
            note_id: record.note_id.clone(),
            version: record.version.clone(),
            uncompressed_size: record.uncompressed_size,
            compression_ratio: record.compression_ratio,
            decompression_latency: record.decompression_latency,
            read_latency: record.read_latency,
        }
    }
}

/// Aggregates over records that have a compression ratio.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSummary {
    /// Mean ratio, 2 decimals
    pub avg_compression_ratio: Option<f64>,
    /// Mean decompression latency in ms, 2 decimals
    pub avg_decompression_latency: Option<f64>,
    /// Mean read latency in ms, 2 decimals
    pub avg_read_latency: Option<f64>,
    /// `1 - Σ(size·ratio) / Σ size`; `None` when Σ size is 0
    pub storage_savings: Option<f64>,
    /// Records with a ratio
    pub compressed_count: usize,
    /// All records scanned
    pub total_count: usize,
}

impl MetricsSummary {
    /// Compute the summary for a set of projections.
    pub fn from_notes(notes: &[NoteMetrics]) -> Self {
        let rated: Vec<&NoteMetrics> = notes
            .iter()
            .filter(|n| n.compression_ratio.is_some())
            .collect();

        Self {
            avg_compression_ratio: mean(rated.iter().filter_map(|n| n.compression_ratio)),
            avg_decompression_latency: mean(rated.iter().filter_map(|n| n.decompression_latency)),
            avg_read_latency: mean(rated.iter().filter_map(|n| n.read_latency)),
            storage_savings: storage_savings(notes),
            compressed_count: rated.len(),
            total_count: notes.len(),
        }
    }
}

/// Full metrics response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsReport {
    /// One entry per record, in key order
    pub notes_metrics: Vec<NoteMetrics>,
    /// Aggregates
    pub summary: MetricsSummary,
}

/// Storage savings fraction over records carrying both size and ratio.
pub fn storage_savings(notes: &[NoteMetrics]) -> Option<f64> {
    let (total, compressed) = notes
        .iter()
        .filter_map(|n| Some((n.uncompressed_size? as f64, n.compression_ratio?)))
        .fold((0.0, 0.0), |(total, compressed), (size, ratio)| {
            (total + size, compressed + size * ratio)
        });
    if total == 0.0 {
        None
    } else {
        Some(1.0 - compressed / total)
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        None
    } else {
        Some(round2(sum / count as f64))
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Read-only aggregator over the metadata index.
pub struct MetricsAggregator {
    index: Arc<dyn MetadataIndex>,
    deadlines: Deadlines,
}

impl MetricsAggregator {
    /// Create an aggregator over `index`.
    pub fn new(index: Arc<dyn MetadataIndex>, deadlines: Deadlines) -> Self {
        Self { index, deadlines }
    }

    /// Scan every record and summarize.
    pub async fn collect(&self) -> Result<MetricsReport> {
        let records = require(
            Stage::Scan,
            self.deadlines
                .call(Dependency::MetadataIndex, Stage::Scan, self.index.scan())
                .await,
        )
        .inspect_err(|e| error!(error = %e, "Failed to fetch metrics"))?;

        let notes_metrics: Vec<NoteMetrics> = records.iter().map(NoteMetrics::from).collect();
        let summary = MetricsSummary::from_notes(&notes_metrics);
        info!(
            total = summary.total_count,
            compressed = summary.compressed_count,
            "Collected note metrics"
        );
        Ok(MetricsReport {
            notes_metrics,
            summary,
        })
    }
}
