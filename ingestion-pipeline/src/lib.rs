//! Document intake: store the upload in the raw bucket, then ask the knowledge
//! base to re-index its data source. Job completion is not tracked here.

use bytes::Bytes;
use common::{
    error::AppError,
    knowledge_base::KnowledgeBaseClient,
    storage::{location::ObjectLocation, store::StorageManager},
    utils::config::AppConfig,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

pub const DEFAULT_FRAMEWORK: &str = "generic";
pub const INGESTION_STARTED: &str = "ingestion_started";

/// A document received from a client.
#[derive(Debug, Clone)]
pub struct DocumentUpload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub framework: Option<String>,
    pub bytes: Bytes,
}

impl DocumentUpload {
    /// Framework tag, `generic` when absent or blank.
    pub fn framework(&self) -> &str {
        self.framework
            .as_deref()
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .unwrap_or(DEFAULT_FRAMEWORK)
    }

    /// Client file name without any directory part some browsers still send.
    pub fn base_file_name(&self) -> Result<&str, AppError> {
        let name = self
            .file_name
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or_default()
            .trim();
        if name.is_empty() {
            return Err(AppError::Validation("file name is required".to_string()));
        }
        Ok(name)
    }

    /// Declared content type, else a guess from the file name.
    pub fn resolved_content_type(&self) -> String {
        self.content_type
            .as_deref()
            .map(str::trim)
            .filter(|ct| !ct.is_empty())
            .map_or_else(
                || {
                    mime_guess::from_path(&self.file_name)
                        .first_or(mime::APPLICATION_OCTET_STREAM)
                        .to_string()
                },
                String::from,
            )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionReceipt {
    pub status: String,
    pub ingestion_job_id: String,
    pub s3_uri: String,
}

pub fn upload_key(framework: &str, file_name: &str) -> String {
    format!("uploads/{framework}/{file_name}")
}

/// Uploads the document and starts one ingestion job for the raw bucket's data source.
///
/// A failed upload returns before the ingestion job is requested.
#[instrument(skip_all, fields(file_name = %upload.file_name))]
pub async fn ingest_document(
    storage: &StorageManager,
    knowledge_base: &dyn KnowledgeBaseClient,
    config: &AppConfig,
    upload: DocumentUpload,
) -> Result<IngestionReceipt, AppError> {
    let framework = upload.framework();
    let key = upload_key(framework, upload.base_file_name()?);
    let content_type = upload.resolved_content_type();
    let size = upload.bytes.len();

    storage
        .upload(&config.raw_bucket, &key, upload.bytes.clone(), &content_type)
        .await?;

    let ingestion_job_id = knowledge_base
        .start_ingestion(&config.kb_id, &config.data_source_id)
        .await?;

    let location = ObjectLocation::s3(&config.raw_bucket, key);
    info!(
        %location,
        framework,
        %content_type,
        size,
        %ingestion_job_id,
        "Document stored and ingestion started"
    );

    Ok(IngestionReceipt {
        status: INGESTION_STARTED.to_string(),
        ingestion_job_id,
        s3_uri: location.to_string(),
    })
}
