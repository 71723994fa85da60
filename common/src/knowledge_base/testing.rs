use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{GenerationRequest, KnowledgeBaseClient};
use crate::error::AppError;

/// One recorded adapter call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedCall {
    StartIngestion {
        kb_id: String,
        data_source_id: String,
    },
    RetrieveAndGenerate {
        question: String,
        kb_id: String,
        model_arn: String,
        top_k: u32,
    },
}

/// Scripted stand-in for the knowledge base service.
///
/// Queued responses are returned in order; when the queue is empty the default
/// response is used. Questions listed in `failing_questions` produce a
/// retrieval error.
#[derive(Debug)]
pub struct RecordingKnowledgeBase {
    calls: Mutex<Vec<RecordedCall>>,
    responses: Mutex<VecDeque<Value>>,
    default_response: Value,
    failing_questions: Vec<String>,
    job_id: String,
}

impl Default for RecordingKnowledgeBase {
    fn default() -> Self {
        Self::new(json!({ "output": { "text": "" } }))
    }
}

impl RecordingKnowledgeBase {
    pub fn new(default_response: Value) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            responses: Mutex::new(VecDeque::new()),
            default_response,
            failing_questions: Vec::new(),
            job_id: "JOB123".to_string(),
        }
    }

    #[must_use]
    pub fn with_queued_responses(self, responses: impl IntoIterator<Item = Value>) -> Self {
        if let Ok(mut queue) = self.responses.lock() {
            queue.extend(responses);
        }
        self
    }

    #[must_use]
    pub fn failing_on(mut self, question: impl Into<String>) -> Self {
        self.failing_questions.push(question.into());
        self
    }

    #[must_use]
    pub fn with_job_id(mut self, job_id: impl Into<String>) -> Self {
        self.job_id = job_id.into();
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn ingestion_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, RecordedCall::StartIngestion { .. }))
            .count()
    }

    pub fn questions(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                RecordedCall::RetrieveAndGenerate { question, .. } => Some(question),
                RecordedCall::StartIngestion { .. } => None,
            })
            .collect()
    }

    fn record(&self, call: RecordedCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }
}

#[async_trait]
impl KnowledgeBaseClient for RecordingKnowledgeBase {
    async fn start_ingestion(&self, kb_id: &str, data_source_id: &str) -> Result<String, AppError> {
        self.record(RecordedCall::StartIngestion {
            kb_id: kb_id.to_string(),
            data_source_id: data_source_id.to_string(),
        });
        Ok(self.job_id.clone())
    }

    async fn retrieve_and_generate(
        &self,
        request: GenerationRequest<'_>,
    ) -> Result<Value, AppError> {
        self.record(RecordedCall::RetrieveAndGenerate {
            question: request.question.to_string(),
            kb_id: request.kb_id.to_string(),
            model_arn: request.model_arn.to_string(),
            top_k: request.top_k,
        });

        if self.failing_questions.iter().any(|q| q == request.question) {
            return Err(AppError::Retrieval(format!(
                "scripted failure for '{}'",
                request.question
            )));
        }

        let queued = self.responses.lock().ok().and_then(|mut q| q.pop_front());
        Ok(queued.unwrap_or_else(|| self.default_response.clone()))
    }
}
