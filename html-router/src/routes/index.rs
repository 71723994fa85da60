use axum::{
    extract::{FromRef, State},
    response::IntoResponse,
    routing::get,
    Router,
};
use common::utils::config::AppConfig;
use ingestion_pipeline::IngestionReceipt;
use serde::Serialize;

use crate::{
    html_state::HtmlState,
    middlewares::response_middleware::{HtmlError, TemplateResponse},
    routes::{chat::ChatView, chat::MAX_FORM_TOP_K, questionnaire::BatchView},
};

pub const DEFAULT_FORM_FRAMEWORK: &str = "ccpa";

/// Context of `index.html`. Result sections are filled by the form handlers.
#[derive(Serialize, Default)]
pub struct IndexPageData {
    pub default_framework: &'static str,
    pub default_top_k: u32,
    pub max_top_k: u32,
    pub receipt: Option<IngestionReceipt>,
    pub chat: Option<ChatView>,
    pub batch: Option<BatchView>,
}

impl IndexPageData {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            default_framework: DEFAULT_FORM_FRAMEWORK,
            default_top_k: config.default_top_k.clamp(1, MAX_FORM_TOP_K),
            max_top_k: MAX_FORM_TOP_K,
            ..Default::default()
        }
    }
}

pub async fn index_handler(State(state): State<HtmlState>) -> Result<impl IntoResponse, HtmlError> {
    Ok(TemplateResponse::new_template(
        "index.html",
        IndexPageData::new(&state.config),
    ))
}

pub fn router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    HtmlState: FromRef<S>,
{
    Router::new().route("/", get(index_handler))
}
