use axum::{extract::State, response::IntoResponse, Json};
use retrieval_pipeline::{ask, AskRequest};

use crate::{api_state::ApiState, error::ApiError};

pub async fn ask_question(
    State(state): State<ApiState>,
    Json(request): Json<AskRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let answer = ask(state.knowledge_base.as_ref(), &state.config, &request).await?;
    Ok(Json(answer))
}
