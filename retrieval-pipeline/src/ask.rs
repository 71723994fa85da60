use common::{
    error::AppError,
    knowledge_base::{GenerationRequest, KnowledgeBaseClient},
    utils::config::AppConfig,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::answer::NormalizedAnswer;

/// Largest result count the retrieve-and-generate service accepts.
pub const MAX_TOP_K: u32 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AskRequest {
    pub question: String,
    #[serde(default)]
    pub top_k: Option<i64>,
}

impl AskRequest {
    pub fn new(question: impl Into<String>, top_k: Option<i64>) -> Self {
        Self {
            question: question.into(),
            top_k,
        }
    }
}

/// Resolves the requested result count. Absent or zero means the configured default.
pub fn resolve_top_k(requested: Option<i64>, default_top_k: u32) -> Result<u32, AppError> {
    match requested {
        None | Some(0) => Ok(default_top_k),
        Some(value) => u32::try_from(value)
            .ok()
            .filter(|top_k| *top_k <= MAX_TOP_K)
            .ok_or_else(|| {
                AppError::Validation(format!("top_k must be between 1 and {MAX_TOP_K}"))
            }),
    }
}

/// Answers one question against the configured knowledge base.
#[instrument(skip_all)]
pub async fn ask(
    knowledge_base: &dyn KnowledgeBaseClient,
    config: &AppConfig,
    request: &AskRequest,
) -> Result<NormalizedAnswer, AppError> {
    let question = request.question.trim();
    if question.is_empty() {
        return Err(AppError::Validation("question is required".to_string()));
    }
    let top_k = resolve_top_k(request.top_k, config.default_top_k)?;

    let raw = knowledge_base
        .retrieve_and_generate(GenerationRequest {
            question,
            kb_id: &config.kb_id,
            model_arn: &config.model_arn,
            top_k,
        })
        .await?;

    let normalized = NormalizedAnswer::from_raw(raw);
    info!(
        top_k,
        question_chars = question.chars().count(),
        answer_chars = normalized.answer.chars().count(),
        citations = normalized.citations.len(),
        "Answered question"
    );

    Ok(normalized)
}
