//! Bounded timeouts for calls into external services.
//!
//! Every object store, metadata index and queue call goes through
//! [`Deadlines::call`]. A call that outlives its budget is reported as a
//! `DependencyFailure`, indistinguishable from the service erroring.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Dependency, PipelineError, Result, Stage, StoreError};

/// Per-dependency timeouts in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Blob get/put/delete
    pub object_store_ms: u64,
    /// Record get/put/update/scan
    pub metadata_index_ms: u64,
    /// Queue send/receive/delete
    pub work_queue_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            object_store_ms: 2000,
            metadata_index_ms: 2000,
            work_queue_ms: 2000,
        }
    }
}

impl TimeoutConfig {
    /// Budget for one call into `dependency`.
    pub fn limit(&self, dependency: Dependency) -> Duration {
        let ms = match dependency {
            Dependency::ObjectStore => self.object_store_ms,
            Dependency::MetadataIndex => self.metadata_index_ms,
            Dependency::WorkQueue => self.work_queue_ms,
        };
        Duration::from_millis(ms)
    }
}

/// Applies [`TimeoutConfig`] to port calls and tags failures with their stage.
#[derive(Debug, Clone, Default)]
pub struct Deadlines {
    config: TimeoutConfig,
}

impl Deadlines {
    /// Create from config.
    pub fn new(config: TimeoutConfig) -> Self {
        Self { config }
    }

    /// Run one port call under its dependency's timeout.
    pub async fn call<T, F>(&self, dependency: Dependency, stage: Stage, fut: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, StoreError>>,
    {
        let limit = self.config.limit(dependency);
        match tokio::time::timeout(limit, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(PipelineError::from_store(dependency, stage, e)),
            Err(_) => Err(PipelineError::dependency(
                dependency,
                stage,
                format!("timed out after {}ms", limit.as_millis()),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_call_passes_value_through() {
        let deadlines = Deadlines::default();
        let v = deadlines
            .call(Dependency::ObjectStore, Stage::FetchRaw, async { Ok::<_, StoreError>(7) })
            .await
            .unwrap();
        assert_eq!(v, 7);
    }

    #[tokio::test]
    async fn test_store_error_is_tagged() {
        let deadlines = Deadlines::default();
        let err = deadlines
            .call(Dependency::MetadataIndex, Stage::LoadMetadata, async {
                Err::<(), _>(StoreError::Unavailable("throttled".into()))
            })
            .await
            .unwrap_err();
        assert_eq!(
            err,
            PipelineError::dependency(Dependency::MetadataIndex, Stage::LoadMetadata, "unavailable: throttled")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_dependency_failure() {
        let deadlines = Deadlines::new(TimeoutConfig {
            work_queue_ms: 50,
            ..TimeoutConfig::default()
        });
        let err = deadlines
            .call(Dependency::WorkQueue, Stage::Enqueue, async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, StoreError>(())
            })
            .await
            .unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Enqueue));
        assert!(err.to_string().contains("timed out after 50ms"));
    }

    #[test]
    fn test_limits() {
        let config = TimeoutConfig {
            object_store_ms: 1,
            metadata_index_ms: 2,
            work_queue_ms: 3,
        };
        assert_eq!(config.limit(Dependency::ObjectStore), Duration::from_millis(1));
        assert_eq!(config.limit(Dependency::MetadataIndex), Duration::from_millis(2));
        assert_eq!(config.limit(Dependency::WorkQueue), Duration::from_millis(3));
    }
}
