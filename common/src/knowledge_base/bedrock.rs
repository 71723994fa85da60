use std::collections::HashMap;

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_bedrockagentruntime::{
    error::DisplayErrorContext,
    operation::retrieve_and_generate::RetrieveAndGenerateOutput,
    types::{
        Citation, KnowledgeBaseRetrievalConfiguration,
        KnowledgeBaseRetrieveAndGenerateConfiguration, KnowledgeBaseVectorSearchConfiguration,
        RetrievalResultLocation, RetrieveAndGenerateConfiguration, RetrieveAndGenerateInput,
        RetrieveAndGenerateType, RetrievedReference, SearchType,
    },
};
use aws_smithy_types::{Document, Number};
use serde_json::{json, Map, Value};
use tracing::{info, instrument};

use super::{GenerationRequest, KnowledgeBaseClient};
use crate::error::AppError;

/// Knowledge base adapter backed by Amazon Bedrock.
///
/// Ingestion jobs go through the `bedrock-agent` control plane, questions through
/// `bedrock-agent-runtime`.
#[derive(Clone, Debug)]
pub struct BedrockKnowledgeBase {
    control: aws_sdk_bedrockagent::Client,
    runtime: aws_sdk_bedrockagentruntime::Client,
}

impl BedrockKnowledgeBase {
    pub fn new(
        control: aws_sdk_bedrockagent::Client,
        runtime: aws_sdk_bedrockagentruntime::Client,
    ) -> Self {
        Self { control, runtime }
    }

    /// Builds both clients from the default AWS credential chain.
    pub async fn from_env(region: Option<&str>) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(Region::new(region.to_string()));
        }
        let sdk_config = loader.load().await;

        Self::new(
            aws_sdk_bedrockagent::Client::new(&sdk_config),
            aws_sdk_bedrockagentruntime::Client::new(&sdk_config),
        )
    }
}

/// Maps an SDK request-builder failure onto a retrieval error.
fn build_error(err: impl std::error::Error) -> AppError {
    AppError::Retrieval(format!("invalid retrieve-and-generate request: {err}"))
}

#[async_trait]
impl KnowledgeBaseClient for BedrockKnowledgeBase {
    #[instrument(skip(self))]
    async fn start_ingestion(&self, kb_id: &str, data_source_id: &str) -> Result<String, AppError> {
        let output = self
            .control
            .start_ingestion_job()
            .knowledge_base_id(kb_id)
            .data_source_id(data_source_id)
            .send()
            .await
            .map_err(|e| AppError::Retrieval(DisplayErrorContext(e).to_string()))?;

        let job = output.ingestion_job().ok_or_else(|| {
            AppError::Retrieval("start_ingestion_job returned no ingestion job".to_string())
        })?;

        info!(
            ingestion_job_id = job.ingestion_job_id(),
            status = job.status().as_str(),
            "Knowledge base ingestion job started"
        );
        Ok(job.ingestion_job_id().to_string())
    }

    #[instrument(skip_all, fields(top_k = request.top_k))]
    async fn retrieve_and_generate(
        &self,
        request: GenerationRequest<'_>,
    ) -> Result<Value, AppError> {
        let vector_search = KnowledgeBaseVectorSearchConfiguration::builder()
            .number_of_results(i32::try_from(request.top_k).unwrap_or(i32::MAX))
            .override_search_type(SearchType::Hybrid)
            .build();

        let retrieval = KnowledgeBaseRetrievalConfiguration::builder()
            .vector_search_configuration(vector_search)
            .build();

        let knowledge_base = KnowledgeBaseRetrieveAndGenerateConfiguration::builder()
            .knowledge_base_id(request.kb_id)
            .model_arn(request.model_arn)
            .retrieval_configuration(retrieval)
            .build()
            .map_err(build_error)?;

        let configuration = RetrieveAndGenerateConfiguration::builder()
            .r#type(RetrieveAndGenerateType::KnowledgeBase)
            .knowledge_base_configuration(knowledge_base)
            .build()
            .map_err(build_error)?;

        let input = RetrieveAndGenerateInput::builder()
            .text(request.question)
            .build()
            .map_err(build_error)?;

        let output = self
            .runtime
            .retrieve_and_generate()
            .input(input)
            .retrieve_and_generate_configuration(configuration)
            .send()
            .await
            .map_err(|e| AppError::Retrieval(DisplayErrorContext(e).to_string()))?;

        Ok(output_to_json(&output))
    }
}

/// Renders the SDK's typed output back into the service's JSON wire shape.
fn output_to_json(output: &RetrieveAndGenerateOutput) -> Value {
    let mut body = Map::new();
    body.insert("sessionId".into(), json!(output.session_id()));
    if let Some(generated) = output.output() {
        body.insert("output".into(), json!({ "text": generated.text() }));
    }
    body.insert(
        "citations".into(),
        Value::Array(output.citations().iter().map(citation_to_json).collect()),
    );
    if let Some(action) = output.guardrail_action() {
        body.insert("guardrailAction".into(), json!(action.as_str()));
    }
    Value::Object(body)
}

/// One citation: the generated span it supports and the references behind it.
fn citation_to_json(citation: &Citation) -> Value {
    let mut body = Map::new();

    if let Some(part) = citation
        .generated_response_part()
        .and_then(|p| p.text_response_part())
    {
        let span = part
            .span()
            .map(|s| json!({ "start": s.start(), "end": s.end() }));
        body.insert(
            "generatedResponsePart".into(),
            json!({ "textResponsePart": { "text": part.text(), "span": span } }),
        );
    }

    body.insert(
        "retrievedReferences".into(),
        Value::Array(
            citation
                .retrieved_references()
                .iter()
                .map(reference_to_json)
                .collect(),
        ),
    );
    Value::Object(body)
}

/// Retrieved chunk with its text, source location and metadata.
fn reference_to_json(reference: &RetrievedReference) -> Value {
    let mut body = Map::new();

    if let Some(content) = reference.content() {
        body.insert("content".into(), json!({ "text": content.text() }));
    }
    if let Some(location) = reference.location() {
        body.insert("location".into(), location_to_json(location));
    }
    if let Some(metadata) = reference.metadata() {
        body.insert("metadata".into(), metadata_to_json(metadata));
    }

    Value::Object(body)
}

/// Source location of a reference. Every location kind the SDK models is kept.
fn location_to_json(location: &RetrievalResultLocation) -> Value {
    let mut body = Map::new();
    body.insert("type".into(), json!(location.r#type().as_str()));
    if let Some(s3) = location.s3_location() {
        body.insert("s3Location".into(), json!({ "uri": s3.uri() }));
    }
    if let Some(web) = location.web_location() {
        body.insert("webLocation".into(), json!({ "url": web.url() }));
    }
    if let Some(confluence) = location.confluence_location() {
        body.insert("confluenceLocation".into(), json!({ "url": confluence.url() }));
    }
    if let Some(salesforce) = location.salesforce_location() {
        body.insert("salesforceLocation".into(), json!({ "url": salesforce.url() }));
    }
    if let Some(share_point) = location.share_point_location() {
        body.insert("sharePointLocation".into(), json!({ "url": share_point.url() }));
    }
    if let Some(kendra) = location.kendra_document_location() {
        body.insert("kendraDocumentLocation".into(), json!({ "uri": kendra.uri() }));
    }
    if let Some(sql) = location.sql_location() {
        body.insert("sqlLocation".into(), json!({ "query": sql.query() }));
    }
    if let Some(custom) = location.custom_document_location() {
        body.insert("customDocumentLocation".into(), json!({ "id": custom.id() }));
    }
    Value::Object(body)
}

/// Metadata map, keys unchanged.
fn metadata_to_json(metadata: &HashMap<String, Document>) -> Value {
    Value::Object(
        metadata
            .iter()
            .map(|(key, value)| (key.clone(), document_to_json(value)))
            .collect(),
    )
}

/// Untyped metadata value. Non-finite floats become `null`.
fn document_to_json(document: &Document) -> Value {
    match document {
        Document::Object(map) => metadata_to_json(map),
        Document::Array(items) => Value::Array(items.iter().map(document_to_json).collect()),
        Document::Number(Number::PosInt(n)) => json!(n),
        Document::Number(Number::NegInt(n)) => json!(n),
        Document::Number(Number::Float(f)) => serde_json::Number::from_f64(*f)
            .map_or(Value::Null, Value::Number),
        Document::String(s) => Value::String(s.clone()),
        Document::Bool(b) => Value::Bool(*b),
        Document::Null => Value::Null,
    }
}
