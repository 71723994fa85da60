use api_state::ApiState;
use axum::{
    extract::{DefaultBodyLimit, FromRef},
    routing::{get, post},
    Router,
};
use routes::{
    ask::ask_question, batch::run_batch_questionnaire, health::health, ingest::start_ingestion,
};

pub mod api_state;
pub mod cors;
pub mod error;
/// Endpoint handlers.
mod routes;

/// JSON endpoints: health, document ingestion, single questions and batch questionnaires.
pub fn api_routes<S>(app_state: &ApiState) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    ApiState: FromRef<S>,
{
    Router::new()
        .route("/health", get(health))
        .route(
            "/ingest/start",
            post(start_ingestion).layer(DefaultBodyLimit::max(
                app_state.config.ingest_max_body_bytes,
            )),
        )
        .route("/ask", post(ask_question))
        .route("/batch", post(run_batch_questionnaire))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
        response::Response,
    };
    use common::{
        knowledge_base::testing::RecordingKnowledgeBase, storage::store::StorageManager,
        utils::config::AppConfig,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    const BOUNDARY: &str = "X-TEST-BOUNDARY";

    fn test_config() -> AppConfig {
        AppConfig {
            kb_id: "KB123".into(),
            model_arn: "arn:model".into(),
            raw_bucket: "raw".into(),
            export_bucket: "exports".into(),
            data_source_id: "DS1".into(),
            ..Default::default()
        }
    }

    fn app(kb: &Arc<RecordingKnowledgeBase>, storage: StorageManager) -> Router {
        app_with_config(&test_config(), kb, storage)
    }

    fn app_with_config(
        config: &AppConfig,
        kb: &Arc<RecordingKnowledgeBase>,
        storage: StorageManager,
    ) -> Router {
        let state = ApiState::new(config, storage, kb.clone());
        api_routes(&state).with_state(state)
    }

    struct Part<'a> {
        name: &'a str,
        file_name: Option<&'a str>,
        content_type: Option<&'a str>,
        body: &'a [u8],
    }

    fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
        let mut body = Vec::new();
        for part in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            let disposition = match part.file_name {
                Some(file_name) => format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{file_name}\"\r\n",
                    part.name
                ),
                None => format!("Content-Disposition: form-data; name=\"{}\"\r\n", part.name),
            };
            body.extend_from_slice(disposition.as_bytes());
            if let Some(content_type) = part.content_type {
                body.extend_from_slice(format!("Content-Type: {content_type}\r\n").as_bytes());
            }
            body.extend_from_slice(b"\r\n");
            body.extend_from_slice(part.body);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn multipart_request(uri: &str, parts: &[Part<'_>]) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(multipart_body(parts)))
            .unwrap()
    }

    fn json_request(uri: &str, body: &Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn ccpa_response() -> Value {
        json!({
            "output": { "text": "Deletion requests are honoured within 45 days." },
            "citations": [{
                "retrievedReferences": [{
                    "content": { "text": "...", "metadata": { "page": 3 } },
                    "location": { "s3Location": { "uri": "s3://bucket/doc.pdf" } }
                }]
            }]
        })
    }

    #[tokio::test]
    async fn health_does_not_touch_collaborators() {
        let kb = Arc::new(RecordingKnowledgeBase::default());
        let response = app(&kb, StorageManager::in_memory())
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!({ "ok": true }));
        assert!(kb.calls().is_empty());
    }

    #[tokio::test]
    async fn ask_returns_normalized_answer() {
        let kb = Arc::new(RecordingKnowledgeBase::new(ccpa_response()));
        let response = app(&kb, StorageManager::in_memory())
            .oneshot(json_request(
                "/ask",
                &json!({ "question": "What is the CCPA right to deletion?", "top_k": 5 }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["answer"], "Deletion requests are honoured within 45 days.");
        let citations = body["citations"].as_array().unwrap();
        assert_eq!(citations.len(), 1);
        assert_eq!(citations[0]["page"], json!(3));
        assert_eq!(citations[0]["uri"], "s3://bucket/doc.pdf");
        assert_eq!(body["raw"], ccpa_response());
    }

    #[tokio::test]
    async fn ask_rejects_blank_question() {
        let kb = Arc::new(RecordingKnowledgeBase::default());
        let response = app(&kb, StorageManager::in_memory())
            .oneshot(json_request("/ask", &json!({ "question": "  " })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["status"], "error");
        assert!(kb.calls().is_empty());
    }

    #[tokio::test]
    async fn ask_maps_knowledge_base_failure_to_bad_gateway() {
        let kb = Arc::new(RecordingKnowledgeBase::default().failing_on("boom"));
        let response = app(&kb, StorageManager::in_memory())
            .oneshot(json_request("/ask", &json!({ "question": "boom" })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            json_body(response).await,
            json!({ "error": "Upstream service error", "status": "error" })
        );
    }

    #[tokio::test]
    async fn ingest_stores_file_and_starts_job() {
        let kb = Arc::new(RecordingKnowledgeBase::default().with_job_id("JOB-7"));
        let storage = StorageManager::in_memory();
        let request = multipart_request(
            "/ingest/start",
            &[
                Part {
                    name: "file",
                    file_name: Some("ccpa.pdf"),
                    content_type: Some("application/pdf"),
                    body: b"%PDF-1.7",
                },
                Part {
                    name: "framework",
                    file_name: None,
                    content_type: None,
                    body: b"ccpa",
                },
            ],
        );

        let response = app(&kb, storage.clone()).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await,
            json!({
                "status": "ingestion_started",
                "ingestion_job_id": "JOB-7",
                "s3_uri": "s3://raw/uploads/ccpa/ccpa.pdf"
            })
        );
        assert_eq!(kb.ingestion_calls(), 1);
        assert_eq!(
            storage.get("raw", "uploads/ccpa/ccpa.pdf").await.unwrap().as_ref(),
            b"%PDF-1.7"
        );
    }

    #[tokio::test]
    async fn ingest_without_file_is_bad_request() {
        let kb = Arc::new(RecordingKnowledgeBase::default());
        let request = multipart_request(
            "/ingest/start",
            &[Part {
                name: "framework",
                file_name: None,
                content_type: None,
                body: b"gdpr",
            }],
        );

        let response = app(&kb, StorageManager::in_memory())
            .oneshot(request)
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(kb.ingestion_calls(), 0);
    }

    #[tokio::test]
    async fn ingest_over_body_limit_is_payload_too_large() {
        let kb = Arc::new(RecordingKnowledgeBase::default());
        let storage = StorageManager::in_memory();
        let config = AppConfig {
            ingest_max_body_bytes: 1024,
            ..test_config()
        };
        let oversized = vec![b'a'; 4096];
        let request = multipart_request(
            "/ingest/start",
            &[Part {
                name: "file",
                file_name: Some("big.pdf"),
                content_type: Some("application/pdf"),
                body: &oversized,
            }],
        );

        let response = app_with_config(&config, &kb, storage.clone())
            .oneshot(request)
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(kb.ingestion_calls(), 0);
        assert!(!storage.exists("raw", "uploads/generic/big.pdf").await.unwrap());
    }

    async fn seed_questionnaire(storage: &StorageManager) {
        storage
            .upload(
                "raw",
                "uploads/batch/q.csv",
                "question_id,question_text\n1,What is CCPA?\n2,\n".into(),
                "text/csv",
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn batch_accepts_urlencoded_form() {
        let kb = Arc::new(RecordingKnowledgeBase::new(ccpa_response()));
        let storage = StorageManager::in_memory();
        seed_questionnaire(&storage).await;

        let request = Request::builder()
            .method("POST")
            .uri("/batch")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("file_s3_uri=s3%3A%2F%2Fraw%2Fuploads%2Fbatch%2Fq.csv"))
            .unwrap();
        let response = app(&kb, storage).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["count"], 1);
        assert!(body["download_url"].as_str().unwrap().contains("batch/results_"));
        assert_eq!(kb.questions(), vec!["What is CCPA?".to_string()]);
    }

    #[tokio::test]
    async fn batch_accepts_multipart_form() {
        let kb = Arc::new(RecordingKnowledgeBase::new(ccpa_response()));
        let storage = StorageManager::in_memory();
        seed_questionnaire(&storage).await;

        let request = multipart_request(
            "/batch",
            &[Part {
                name: "file_s3_uri",
                file_name: None,
                content_type: None,
                body: b"s3://raw/uploads/batch/q.csv",
            }],
        );
        let response = app(&kb, storage).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["count"], 1);
    }

    #[tokio::test]
    async fn batch_with_missing_file_is_not_found() {
        let kb = Arc::new(RecordingKnowledgeBase::default());
        let request = Request::builder()
            .method("POST")
            .uri("/batch")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("file_s3_uri=s3%3A%2F%2Fraw%2Fmissing.csv"))
            .unwrap();

        let response = app(&kb, StorageManager::in_memory())
            .oneshot(request)
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(kb.calls().is_empty());
    }
}
