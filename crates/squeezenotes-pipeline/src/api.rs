//! Wire shapes for the three request/response endpoints.
//!
//! Transport-agnostic: each handler returns a status code and a JSON body
//! that an HTTP adapter can forward unchanged.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{PipelineError, Result};
use crate::ingest::{IngestMode, IngestRequest, IngestService};
use crate::metrics::MetricsAggregator;
use crate::retrieve::RetrieveService;

/// `{"error": ...}` body of every failed response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Caller-visible message
    pub error: String,
}

/// Query parameters of the read endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrieveQuery {
    /// Document id
    pub note_id: Option<String>,
    /// Version
    pub version: Option<String>,
}

/// Status code plus JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    /// HTTP-equivalent status
    pub status: u16,
    /// Response body
    pub body: Value,
}

impl ApiResponse {
    /// 200 with a serialized payload.
    pub fn ok<T: Serialize>(payload: &T) -> Self {
        match serde_json::to_value(payload) {
            Ok(body) => Self { status: 200, body },
            Err(e) => Self::error(&PipelineError::CorruptData(format!("unencodable response: {}", e))),
        }
    }

    /// Error response with the status the error maps to.
    pub fn error(err: &PipelineError) -> Self {
        Self {
            status: err.status_code(),
            body: json!({ "error": err.to_string() }),
        }
    }

    /// Map a service result.
    pub fn from_result<T: Serialize>(result: Result<T>) -> Self {
        match result {
            Ok(payload) => Self::ok(&payload),
            Err(e) => Self::error(&e),
        }
    }

    /// True for 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Write endpoint. A body that is not a JSON object is `InvalidInput`.
pub async fn handle_ingest(service: &IngestService, body: &str, mode: IngestMode) -> ApiResponse {
    let request: IngestRequest = match serde_json::from_str(body) {
        Ok(request) => request,
        Err(e) => {
            return ApiResponse::error(&PipelineError::InvalidInput(format!("invalid JSON body: {}", e)))
        }
    };
    ApiResponse::from_result(service.ingest(request, mode).await)
}

/// Read endpoint.
pub async fn handle_retrieve(service: &RetrieveService, query: &RetrieveQuery) -> ApiResponse {
    let result = service
        .retrieve(query.note_id.as_deref(), query.version.as_deref())
        .await;
    ApiResponse::from_result(result)
}

/// Metrics endpoint.
pub async fn handle_metrics(aggregator: &MetricsAggregator) -> ApiResponse {
    ApiResponse::from_result(aggregator.collect().await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::MemoryObjectStore;
    use crate::codec::Codec;
    use crate::deadline::Deadlines;
    use crate::index::MemoryMetadataIndex;
    use crate::queue::MemoryWorkQueue;
    use std::sync::Arc;

    struct Services {
        ingest: IngestService,
        retrieve: RetrieveService,
        metrics: MetricsAggregator,
    }

    fn services() -> Services {
        let blobs = Arc::new(MemoryObjectStore::new());
        let index = Arc::new(MemoryMetadataIndex::new());
        let queue = Arc::new(MemoryWorkQueue::new());
        Services {
            ingest: IngestService::new(
                blobs.clone(),
                index.clone(),
                queue,
                Deadlines::default(),
                "notes/",
            ),
            retrieve: RetrieveService::new(blobs, index.clone(), Codec::default(), Deadlines::default()),
            metrics: MetricsAggregator::new(index, Deadlines::default()),
        }
    }

    #[tokio::test]
    async fn test_ingest_response_shape() {
        let s = services();
        let resp = handle_ingest(
            &s.ingest,
            r#"{"note_id":"n1","content":"hi"}"#,
            IngestMode::Create,
        )
        .await;
        assert_eq!(resp.status, 200);
        assert_eq!(
            resp.body,
            json!({
                "message": "Note uploaded successfully",
                "note_id": "n1",
                "version": "1",
                "s3_key": "notes/n1_v1.txt",
            })
        );
    }

    #[tokio::test]
    async fn test_ingest_numeric_version() {
        let s = services();
        let resp = handle_ingest(
            &s.ingest,
            r#"{"note_id":"n1","version":2,"content":"hi"}"#,
            IngestMode::Update,
        )
        .await;
        assert_eq!(resp.status, 200);
        assert_eq!(resp.body["version"], "2");
        assert_eq!(resp.body["s3_key"], "notes/n1_v2.txt");
    }

    #[tokio::test]
    async fn test_ingest_bad_bodies() {
        let s = services();
        for body in [
            "not json",
            r#"{"content":"hi"}"#,
            r#"{"note_id":"n1","content":""}"#,
            r#"{"note_id":"n1","version":true,"content":"hi"}"#,
        ] {
            let resp = handle_ingest(&s.ingest, body, IngestMode::Create).await;
            assert_eq!(resp.status, 400, "{}", body);
            let parsed: ErrorBody = serde_json::from_value(resp.body).unwrap();
            assert!(parsed.error.starts_with("Invalid input"));
        }
    }

    #[tokio::test]
    async fn test_retrieve_statuses() {
        let s = services();
        let missing = RetrieveQuery {
            note_id: Some("n1".into()),
            version: None,
        };
        assert_eq!(handle_retrieve(&s.retrieve, &missing).await.status, 400);

        let query = RetrieveQuery {
            note_id: Some("n1".into()),
            version: Some("1".into()),
        };
        let resp = handle_retrieve(&s.retrieve, &query).await;
        assert_eq!(resp.status, 404);
        assert_eq!(resp.body, json!({"error": "Note not found"}));

        handle_ingest(&s.ingest, r#"{"note_id":"n1","content":"hi"}"#, IngestMode::Create).await;
        let resp = handle_retrieve(&s.retrieve, &query).await;
        assert_eq!(resp.status, 404);
        assert_eq!(resp.body, json!({"error": "Compressed note not found"}));
    }

    #[tokio::test]
    async fn test_metrics_nulls_preserved() {
        let s = services();
        handle_ingest(&s.ingest, r#"{"note_id":"n1","content":"hi"}"#, IngestMode::Create).await;

        let resp = handle_metrics(&s.metrics).await;
        assert!(resp.is_success());
        let entry = &resp.body["notes_metrics"][0];
        assert_eq!(entry["note_id"], "n1");
        assert!(entry["uncompressed_size"].is_null());
        assert!(entry["compression_ratio"].is_null());
        assert!(entry["read_latency"].is_null());
    }

    #[test]
    fn test_dependency_failure_is_500() {
        use crate::error::{Dependency, Stage};
        let err = PipelineError::dependency(Dependency::ObjectStore, Stage::StoreRaw, "down");
        let resp = ApiResponse::error(&err);
        assert_eq!(resp.status, 500);
        assert!(resp.body["error"].as_str().unwrap().contains("store note in object store"));
    }
}
