//! Retrieval-generation adapter.
//!
//! The orchestrator only talks to [`KnowledgeBaseClient`]; the Bedrock implementation
//! lives in [`bedrock`] and tests swap in [`testing::RecordingKnowledgeBase`].

pub mod bedrock;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::AppError;

/// Inputs of one retrieve-and-generate call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest<'a> {
    pub question: &'a str,
    pub kb_id: &'a str,
    pub model_arn: &'a str,
    /// Upper bound on retrieved source chunks. Hybrid search is always requested.
    pub top_k: u32,
}

#[async_trait]
pub trait KnowledgeBaseClient: Send + Sync {
    /// Starts an ingestion job and returns its identifier without waiting for it.
    async fn start_ingestion(&self, kb_id: &str, data_source_id: &str) -> Result<String, AppError>;

    /// Returns the provider response untouched, as JSON in the provider's wire shape.
    async fn retrieve_and_generate(
        &self,
        request: GenerationRequest<'_>,
    ) -> Result<Value, AppError>;
}
