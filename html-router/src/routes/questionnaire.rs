use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, FromRef, State},
    response::IntoResponse,
    routing::post,
    Router,
};
use axum_htmx::HxRequest;
use axum_typed_multipart::{FieldData, TryFromMultipart, TypedMultipart};
use common::error::AppError;
use ingestion_pipeline::{ingest_document, DocumentUpload};
use retrieval_pipeline::run_batch;
use serde::Serialize;
use tracing::info;

use crate::{
    html_state::HtmlState,
    middlewares::response_middleware::{HtmlError, TemplateResponse},
    routes::{index::IndexPageData, selected_file},
};

/// Framework tag for questionnaires uploaded from the form.
const QUESTIONNAIRE_FRAMEWORK: &str = "batch";

#[derive(Debug, TryFromMultipart)]
pub struct QuestionnaireForm {
    #[form_data(limit = "unlimited")]
    pub file: Option<FieldData<Bytes>>,
    pub file_s3_uri: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BatchView {
    pub source_uri: String,
    pub download_url: String,
    pub count: usize,
}

pub async fn run_questionnaire(
    State(state): State<HtmlState>,
    HxRequest(is_htmx): HxRequest,
    TypedMultipart(input): TypedMultipart<QuestionnaireForm>,
) -> Result<impl IntoResponse, HtmlError> {
    let source_uri = match selected_file(input.file) {
        Some(file) => {
            let receipt = ingest_document(
                &state.storage,
                state.knowledge_base.as_ref(),
                &state.config,
                DocumentUpload {
                    file_name: file.metadata.file_name.unwrap_or_default(),
                    content_type: Some("text/csv".to_string()),
                    framework: Some(QUESTIONNAIRE_FRAMEWORK.to_string()),
                    bytes: file.contents,
                },
            )
            .await?;
            info!(s3_uri = %receipt.s3_uri, "Questionnaire uploaded");
            receipt.s3_uri
        }
        None => input
            .file_s3_uri
            .map(|uri| uri.trim().to_string())
            .filter(|uri| !uri.is_empty())
            .ok_or_else(|| {
                AppError::Validation("Upload a CSV file or enter an S3 URI.".to_string())
            })?,
    };

    let summary = run_batch(
        &state.storage,
        state.knowledge_base.as_ref(),
        &state.config,
        &source_uri,
    )
    .await?;

    Ok(TemplateResponse::page_or_block(
        is_htmx,
        "index.html",
        "batch_result",
        IndexPageData {
            batch: Some(BatchView {
                source_uri,
                download_url: summary.download_url,
                count: summary.count,
            }),
            ..IndexPageData::new(&state.config)
        },
    ))
}

pub fn router<S>(max_body_bytes: usize) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    HtmlState: FromRef<S>,
{
    Router::new().route(
        "/ui/questionnaire",
        post(run_questionnaire).layer(DefaultBodyLimit::max(max_body_bytes)),
    )
}
