//! Criticality table for side effects.
//!
//! A critical operation's failure aborts the current request or task. A
//! best-effort operation's failure is logged and the flow continues. Call
//! sites never decide this themselves; they route results through
//! [`enforce`].

use crate::error::{PipelineError, Result, Stage};

/// How a failing operation is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Criticality {
    /// Failure propagates
    Critical,
    /// Failure is logged and swallowed
    BestEffort,
}

/// Criticality of each pipeline stage.
pub fn criticality(stage: Stage) -> Criticality {
    match stage {
        // The compressed copy is already durable when the raw delete runs.
        Stage::DeleteRaw => Criticality::BestEffort,
        // Read correctness never depends on telemetry.
        Stage::RecordLatency => Criticality::BestEffort,
        Stage::StoreRaw
        | Stage::StoreMetadata
        | Stage::Enqueue
        | Stage::FetchRaw
        | Stage::StoreCompressed
        | Stage::MarkCompressed
        | Stage::Acknowledge
        | Stage::Receive
        | Stage::LoadMetadata
        | Stage::FetchCompressed
        | Stage::Scan => Criticality::Critical,
    }
}

/// Apply the table to the result of `stage`.
///
/// Critical failures are returned as-is. Best-effort failures are logged at
/// `warn` and turned into `Ok(None)`.
pub fn enforce<T>(stage: Stage, result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(e) => match criticality(stage) {
            Criticality::Critical => Err(e),
            Criticality::BestEffort => {
                tracing::warn!(%stage, error = %e, "Best-effort operation failed, continuing");
                Ok(None)
            }
        },
    }
}

/// Like [`enforce`] but for stages whose failure is always fatal.
pub fn require<T>(stage: Stage, result: Result<T>) -> Result<T> {
    debug_assert_eq!(criticality(stage), Criticality::Critical);
    result.map_err(|e: PipelineError| {
        tracing::debug!(%stage, error = %e, "Critical operation failed");
        e
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Dependency;

    fn failure(stage: Stage) -> Result<()> {
        Err(PipelineError::dependency(Dependency::ObjectStore, stage, "down"))
    }

    #[test]
    fn test_best_effort_stages() {
        assert_eq!(criticality(Stage::DeleteRaw), Criticality::BestEffort);
        assert_eq!(criticality(Stage::RecordLatency), Criticality::BestEffort);
        assert_eq!(criticality(Stage::MarkCompressed), Criticality::Critical);
        assert_eq!(criticality(Stage::Acknowledge), Criticality::Critical);
    }

    #[test]
    fn test_best_effort_failure_is_swallowed() {
        assert_eq!(enforce(Stage::DeleteRaw, failure(Stage::DeleteRaw)).unwrap(), None);
        assert_eq!(enforce(Stage::RecordLatency, failure(Stage::RecordLatency)).unwrap(), None);
    }

    #[test]
    fn test_critical_failure_propagates() {
        assert!(enforce(Stage::StoreRaw, failure(Stage::StoreRaw)).is_err());
        assert!(require(Stage::MarkCompressed, failure(Stage::MarkCompressed)).is_err());
    }

    #[test]
    fn test_success_passes_through() {
        assert_eq!(enforce(Stage::DeleteRaw, Ok(5)).unwrap(), Some(5));
        assert_eq!(require(Stage::FetchRaw, Ok(5)).unwrap(), 5);
    }
}
