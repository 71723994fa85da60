use axum::{
    extract::{FromRequest, Request, State},
    http::header::CONTENT_TYPE,
    response::{IntoResponse, Response},
    Form, Json,
};
use axum_typed_multipart::{TryFromMultipart, TypedMultipart};
use retrieval_pipeline::run_batch;
use serde::Deserialize;

use crate::{api_state::ApiState, error::ApiError};

#[derive(Debug, Deserialize, TryFromMultipart)]
pub struct BatchParams {
    pub file_s3_uri: String,
}

/// Accepts the batch form either url-encoded or as multipart.
#[derive(Debug)]
pub struct BatchForm(pub BatchParams);

impl<S> FromRequest<S> for BatchForm
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("multipart/form-data"));

        if is_multipart {
            let TypedMultipart(params) = TypedMultipart::<BatchParams>::from_request(req, state)
                .await
                .map_err(IntoResponse::into_response)?;
            Ok(Self(params))
        } else {
            let Form(params) = Form::<BatchParams>::from_request(req, state)
                .await
                .map_err(IntoResponse::into_response)?;
            Ok(Self(params))
        }
    }
}

pub async fn run_batch_questionnaire(
    State(state): State<ApiState>,
    BatchForm(params): BatchForm,
) -> Result<impl IntoResponse, ApiError> {
    let summary = run_batch(
        &state.storage,
        state.knowledge_base.as_ref(),
        &state.config,
        params.file_s3_uri.trim(),
    )
    .await?;

    Ok(Json(summary))
}
