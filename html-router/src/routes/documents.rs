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
use tracing::info;

use crate::{
    html_state::HtmlState,
    middlewares::response_middleware::{HtmlError, TemplateResponse},
    routes::{index::IndexPageData, selected_file},
};

#[derive(Debug, TryFromMultipart)]
pub struct DocumentForm {
    #[form_data(limit = "unlimited")]
    pub file: Option<FieldData<Bytes>>,
    pub framework: Option<String>,
}

pub async fn upload_document(
    State(state): State<HtmlState>,
    HxRequest(is_htmx): HxRequest,
    TypedMultipart(input): TypedMultipart<DocumentForm>,
) -> Result<impl IntoResponse, HtmlError> {
    let file = selected_file(input.file)
        .ok_or_else(|| AppError::Validation("Please select a file.".to_string()))?;

    info!(
        file_name = ?file.metadata.file_name,
        framework = ?input.framework,
        size = file.contents.len(),
        "Received document upload form"
    );

    let receipt = ingest_document(
        &state.storage,
        state.knowledge_base.as_ref(),
        &state.config,
        DocumentUpload {
            file_name: file.metadata.file_name.unwrap_or_default(),
            content_type: file.metadata.content_type,
            framework: input.framework,
            bytes: file.contents,
        },
    )
    .await?;

    Ok(TemplateResponse::page_or_block(
        is_htmx,
        "index.html",
        "ingest_result",
        IndexPageData {
            receipt: Some(receipt),
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
        "/ui/documents",
        post(upload_document).layer(DefaultBodyLimit::max(max_body_bytes)),
    )
}
