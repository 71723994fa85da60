use axum::{
    extract::{FromRef, State},
    response::IntoResponse,
    routing::post,
    Form, Router,
};
use axum_htmx::HxRequest;
use common::error::AppError;
use retrieval_pipeline::{ask, AskRequest, Citation};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    html_state::HtmlState,
    middlewares::response_middleware::{HtmlError, TemplateResponse},
    routes::index::IndexPageData,
};

pub const MAX_FORM_TOP_K: u32 = 20;

#[derive(Debug, Deserialize)]
pub struct ChatForm {
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub top_k: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CitationView {
    pub label: String,
    pub snippet: Option<String>,
    pub uri: Option<String>,
}

impl CitationView {
    /// `position` is 1-based.
    pub fn new(position: usize, citation: &Citation) -> Self {
        let title = citation.title.as_deref().unwrap_or("document");
        let label = match citation.page.as_ref().and_then(page_label) {
            Some(page) => format!("{position}. {title} (p.{page})"),
            None => format!("{position}. {title}"),
        };

        Self {
            label,
            snippet: citation.snippet.clone(),
            uri: citation.uri.clone(),
        }
    }
}

/// Display form of a page value. Blank, zero and `false` pages yield `None`.
fn page_label(page: &Value) -> Option<String> {
    match page {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        other => Some(other.to_string()),
    }
}

#[derive(Debug, Serialize)]
pub struct ChatView {
    pub question: String,
    pub top_k: u32,
    pub answer: String,
    pub citations: Vec<CitationView>,
}

/// Empty means the configured default; anything else must lie in `1..=20`.
fn form_top_k(raw: Option<&str>, default_top_k: u32) -> Result<u32, AppError> {
    match raw.map(str::trim).filter(|value| !value.is_empty()) {
        None => Ok(default_top_k.clamp(1, MAX_FORM_TOP_K)),
        Some(value) => value
            .parse::<u32>()
            .ok()
            .filter(|top_k| (1..=MAX_FORM_TOP_K).contains(top_k))
            .ok_or_else(|| {
                AppError::Validation(format!("Top-K must be between 1 and {MAX_FORM_TOP_K}"))
            }),
    }
}

pub async fn ask_from_form(
    State(state): State<HtmlState>,
    HxRequest(is_htmx): HxRequest,
    Form(form): Form<ChatForm>,
) -> Result<impl IntoResponse, HtmlError> {
    let top_k = form_top_k(form.top_k.as_deref(), state.config.default_top_k)?;
    let request = AskRequest::new(form.question.trim(), Some(i64::from(top_k)));

    let answer = ask(state.knowledge_base.as_ref(), &state.config, &request).await?;

    let view = ChatView {
        question: request.question,
        top_k,
        citations: answer
            .citations
            .iter()
            .enumerate()
            .map(|(index, citation)| CitationView::new(index + 1, citation))
            .collect(),
        answer: answer.answer,
    };

    Ok(TemplateResponse::page_or_block(
        is_htmx,
        "index.html",
        "chat_result",
        IndexPageData {
            chat: Some(view),
            ..IndexPageData::new(&state.config)
        },
    ))
}

pub fn router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    HtmlState: FromRef<S>,
{
    Router::new().route("/ui/chat", post(ask_from_form))
}
