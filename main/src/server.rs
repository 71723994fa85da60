use std::sync::Arc;

use api_router::{api_routes, api_state::ApiState, cors::cors_layer};
use axum::{extract::FromRef, Router};
use common::{
    knowledge_base::{bedrock::BedrockKnowledgeBase, KnowledgeBaseClient},
    storage::store::StorageManager,
    utils::config::{get_config, AppConfig},
};
use html_router::{html_routes, html_state::HtmlState};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set up tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    // Get config
    let config = get_config()?;

    // Create global storage manager
    let storage = StorageManager::new(&config).await?;
    info!(backend = ?storage.backend_kind(), "Storage initialized");

    let knowledge_base: Arc<dyn KnowledgeBaseClient> =
        Arc::new(BedrockKnowledgeBase::from_env(config.aws_region.as_deref()).await);
    info!(kb_id = %config.kb_id, "Knowledge base client initialized");

    let app = build_app(&config, storage, knowledge_base);

    info!("Starting server listening on 0.0.0.0:{}", config.http_port);
    let serve_address = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(serve_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Merges the JSON and html routers over shared state and applies CORS.
fn build_app(
    config: &AppConfig,
    storage: StorageManager,
    knowledge_base: Arc<dyn KnowledgeBaseClient>,
) -> Router {
    let api_state = ApiState::new(config, storage.clone(), Arc::clone(&knowledge_base));
    let html_state = HtmlState::new_with_resources(config.clone(), storage, knowledge_base, None);

    Router::new()
        .merge(api_routes(&api_state))
        .merge(html_routes(&html_state))
        .with_state(AppState {
            api_state,
            html_state,
        })
        .layer(cors_layer(config))
}

#[derive(Clone, FromRef)]
struct AppState {
    api_state: ApiState,
    html_state: HtmlState,
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use common::{knowledge_base::testing::RecordingKnowledgeBase, utils::config::StorageKind};
    use tower::ServiceExt;

    fn smoke_test_config() -> AppConfig {
        AppConfig {
            kb_id: "KB123".into(),
            model_arn: "arn:model".into(),
            raw_bucket: "raw".into(),
            export_bucket: "exports".into(),
            data_source_id: "DS1".into(),
            storage: StorageKind::Memory,
            http_port: 0,
            ..Default::default()
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn smoke_startup_with_memory_storage() {
        let config = smoke_test_config();
        let storage = StorageManager::new(&config)
            .await
            .expect("failed to build memory storage");
        let knowledge_base = Arc::new(RecordingKnowledgeBase::default());

        let app = build_app(&config, storage, knowledge_base.clone());

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router response");
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let json: serde_json::Value = serde_json::from_slice(&body).expect("json body");
        assert_eq!(json, serde_json::json!({ "ok": true }));

        let index_response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).expect("request"))
            .await
            .expect("index response");
        assert_eq!(index_response.status(), StatusCode::OK);

        assert!(knowledge_base.calls().is_empty());
    }
}
