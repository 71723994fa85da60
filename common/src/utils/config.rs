use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Clone, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    S3,
    Local,
    Memory,
}

fn default_storage_kind() -> StorageKind {
    StorageKind::S3
}

#[derive(Clone, Deserialize, Debug)]
pub struct AppConfig {
    pub kb_id: String,
    pub model_arn: String,
    pub raw_bucket: String,
    pub export_bucket: String,
    pub data_source_id: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(default = "default_storage_kind")]
    pub storage: StorageKind,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default)]
    pub aws_region: Option<String>,
    #[serde(default)]
    pub s3_endpoint: Option<String>,
    #[serde(default = "default_top_k")]
    pub default_top_k: u32,
    #[serde(default = "default_presign_ttl_secs")]
    pub presign_ttl_secs: u64,
    #[serde(default = "default_ingest_max_body_bytes")]
    pub ingest_max_body_bytes: usize,
    #[serde(default = "default_batch_concurrency")]
    pub batch_concurrency: usize,
    #[serde(default)]
    pub batch_continue_on_error: bool,
    #[serde(default = "default_cors_allowed_origins")]
    pub cors_allowed_origins: String,
}

fn default_http_port() -> u16 {
    8000
}

fn default_data_dir() -> String {
    "./data".to_string()
}

fn default_top_k() -> u32 {
    8
}

fn default_presign_ttl_secs() -> u64 {
    3600
}

fn default_ingest_max_body_bytes() -> usize {
    50 * 1024 * 1024
}

fn default_batch_concurrency() -> usize {
    1
}

fn default_cors_allowed_origins() -> String {
    "*".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            kb_id: String::new(),
            model_arn: String::new(),
            raw_bucket: String::new(),
            export_bucket: String::new(),
            data_source_id: String::new(),
            http_port: default_http_port(),
            storage: default_storage_kind(),
            data_dir: default_data_dir(),
            aws_region: None,
            s3_endpoint: None,
            default_top_k: default_top_k(),
            presign_ttl_secs: default_presign_ttl_secs(),
            ingest_max_body_bytes: default_ingest_max_body_bytes(),
            batch_concurrency: default_batch_concurrency(),
            batch_continue_on_error: false,
            cors_allowed_origins: default_cors_allowed_origins(),
        }
    }
}

impl AppConfig {
    /// Parsed origin allow-list. `None` means any origin is accepted.
    pub fn allowed_origins(&self) -> Option<Vec<String>> {
        let origins: Vec<String> = self
            .cors_allowed_origins
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(String::from)
            .collect();

        if origins.is_empty() || origins.iter().any(|origin| origin == "*") {
            None
        } else {
            Some(origins)
        }
    }

    fn validate(self) -> Result<Self, ConfigError> {
        let required = [
            ("kb_id", &self.kb_id),
            ("model_arn", &self.model_arn),
            ("raw_bucket", &self.raw_bucket),
            ("export_bucket", &self.export_bucket),
            ("data_source_id", &self.data_source_id),
        ];
        if let Some((key, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(ConfigError::Message(format!("{key} must not be empty")));
        }
        if self.batch_concurrency == 0 {
            return Err(ConfigError::Message(
                "batch_concurrency must be at least 1".to_string(),
            ));
        }
        Ok(self)
    }
}

pub fn get_config() -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(Environment::default())
        .build()?;

    config.try_deserialize::<AppConfig>()?.validate()
}
