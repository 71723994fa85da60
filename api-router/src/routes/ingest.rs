use axum::{body::Bytes, extract::State, response::IntoResponse, Json};
use axum_typed_multipart::{FieldData, TryFromMultipart, TypedMultipart};
use ingestion_pipeline::{ingest_document, DocumentUpload};
use tracing::info;

use crate::{api_state::ApiState, error::ApiError};

#[derive(Debug, TryFromMultipart)]
pub struct IngestParams {
    #[form_data(limit = "unlimited")]
    pub file: Option<FieldData<Bytes>>,
    pub framework: Option<String>,
}

pub async fn start_ingestion(
    State(state): State<ApiState>,
    TypedMultipart(input): TypedMultipart<IngestParams>,
) -> Result<impl IntoResponse, ApiError> {
    let file = input
        .file
        .ok_or_else(|| ApiError::ValidationError("file is required".to_string()))?;

    info!(
        file_name = ?file.metadata.file_name,
        framework = ?input.framework,
        size = file.contents.len(),
        "Received ingestion request"
    );

    let upload = DocumentUpload {
        file_name: file.metadata.file_name.unwrap_or_default(),
        content_type: file.metadata.content_type,
        framework: input.framework,
        bytes: file.contents,
    };

    let receipt = ingest_document(
        &state.storage,
        state.knowledge_base.as_ref(),
        &state.config,
        upload,
    )
    .await?;

    Ok(Json(receipt))
}
