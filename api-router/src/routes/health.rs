use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

/// Liveness only; never reaches storage or the knowledge base.
pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "ok": true })))
}
