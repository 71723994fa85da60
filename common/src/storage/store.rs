use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use axum::http::Method;
use bytes::Bytes;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::signer::Signer;
use object_store::{path::Path as ObjPath, Attribute, Attributes, ObjectStore, PutOptions};
use tracing::{debug, info};
use url::Url;

use crate::error::AppError;
use crate::storage::csv_table::{parse_csv, CsvRow};
use crate::storage::location::ObjectLocation;
use crate::utils::config::{AppConfig, StorageKind};

pub type DynStore = Arc<dyn ObjectStore>;

/// Where objects actually go.
///
/// S3 keeps one client per bucket. Local and memory backends keep every bucket
/// in one store, below a `<bucket>/` prefix.
#[derive(Clone)]
enum Backend {
    S3(Arc<S3Buckets>),
    Shared(DynStore),
}

/// Per-bucket S3 clients sharing one builder.
///
/// Configured buckets are built at startup. Buckets first seen in a location
/// URI are built on first use and reused afterwards.
struct S3Buckets {
    builder: AmazonS3Builder,
    clients: RwLock<HashMap<String, Arc<AmazonS3>>>,
}

impl S3Buckets {
    fn new<'a>(
        builder: AmazonS3Builder,
        buckets: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self, AppError> {
        let mut clients = HashMap::new();
        for bucket in buckets.into_iter().filter(|b| !b.is_empty()) {
            let client = builder.clone().with_bucket_name(bucket).build()?;
            clients.insert(bucket.to_string(), Arc::new(client));
        }
        Ok(Self {
            builder,
            clients: RwLock::new(clients),
        })
    }

    fn client(&self, bucket: &str) -> Result<Arc<AmazonS3>, AppError> {
        let cached = self
            .clients
            .read()
            .map_err(|_| AppError::InternalError("S3 client cache lock poisoned".into()))?
            .get(bucket)
            .cloned();
        if let Some(client) = cached {
            return Ok(client);
        }

        let mut clients = self
            .clients
            .write()
            .map_err(|_| AppError::InternalError("S3 client cache lock poisoned".into()))?;
        if let Some(client) = clients.get(bucket) {
            return Ok(Arc::clone(client));
        }
        let client = Arc::new(self.builder.clone().with_bucket_name(bucket).build()?);
        clients.insert(bucket.to_string(), Arc::clone(&client));
        debug!(bucket, "Built S3 client");
        Ok(client)
    }
}

/// Object store adapter: upload, presign and CSV reads against named buckets.
#[derive(Clone)]
pub struct StorageManager {
    backend: Backend,
    backend_kind: StorageKind,
    local_base: Option<PathBuf>,
}

/// A validated `bucket/key` mapped onto the store that holds it.
struct ResolvedObject {
    store: DynStore,
    path: ObjPath,
    signer: Option<Arc<AmazonS3>>,
}

impl StorageManager {
    /// Create a new StorageManager for the configured backend.
    pub async fn new(cfg: &AppConfig) -> Result<Self, AppError> {
        let backend_kind = cfg.storage.clone();
        let (backend, local_base) = create_storage_backend(cfg).await?;

        info!(backend = ?backend_kind, "Object storage configured");

        Ok(Self {
            backend,
            backend_kind,
            local_base,
        })
    }

    /// Create a StorageManager around an existing store. Buckets become top-level prefixes.
    pub fn with_backend(store: DynStore, backend_kind: StorageKind) -> Self {
        Self {
            backend: Backend::Shared(store),
            backend_kind,
            local_base: None,
        }
    }

    /// In-memory storage, mainly for tests and local experiments.
    pub fn in_memory() -> Self {
        Self::with_backend(Arc::new(InMemory::new()), StorageKind::Memory)
    }

    pub fn backend_kind(&self) -> &StorageKind {
        &self.backend_kind
    }

    /// Resolved base directory when using the local backend.
    pub fn local_base_path(&self) -> Option<&Path> {
        self.local_base.as_deref()
    }

    fn resolve(&self, bucket: &str, key: &str) -> Result<ResolvedObject, AppError> {
        if bucket.is_empty() || key.is_empty() {
            return Err(AppError::Validation(
                "bucket and key must not be empty".to_string(),
            ));
        }

        match &self.backend {
            Backend::S3(buckets) => {
                let s3 = buckets.client(bucket)?;
                Ok(ResolvedObject {
                    store: Arc::clone(&s3) as DynStore,
                    path: ObjPath::from(key),
                    signer: Some(s3),
                })
            }
            Backend::Shared(store) => Ok(ResolvedObject {
                store: Arc::clone(store),
                path: ObjPath::from(format!("{bucket}/{key}")),
                signer: None,
            }),
        }
    }

    /// Store `data` under `bucket/key` with the given content type.
    ///
    /// No retry: a rejected write surfaces immediately.
    pub async fn upload(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<(), AppError> {
        let resolved = self.resolve(bucket, key)?;
        let size = data.len();

        // The local filesystem store rejects object attributes.
        let mut options = PutOptions::default();
        if self.backend_kind != StorageKind::Local {
            let mut attributes = Attributes::new();
            attributes.insert(Attribute::ContentType, content_type.to_string().into());
            options.attributes = attributes;
        }

        resolved
            .store
            .put_opts(&resolved.path, data.into(), options)
            .await?;

        debug!(bucket, key, size, content_type, "Uploaded object");
        Ok(())
    }

    /// Retrieve the full contents of `bucket/key`.
    pub async fn get(&self, bucket: &str, key: &str) -> Result<Bytes, AppError> {
        let resolved = self.resolve(bucket, key)?;
        let result = resolved.store.get(&resolved.path).await?;
        Ok(result.bytes().await?)
    }

    /// Time-limited download URL for `bucket/key`.
    ///
    /// S3 URLs are SigV4 query-signed. Local and memory backends cannot sign, so
    /// they return a `file://` or `memory://` URL that still records the expiry.
    pub async fn presign(&self, bucket: &str, key: &str, ttl_secs: u64) -> Result<Url, AppError> {
        let resolved = self.resolve(bucket, key)?;

        if let Some(signer) = resolved.signer {
            let url = signer
                .signed_url(Method::GET, &resolved.path, Duration::from_secs(ttl_secs))
                .await?;
            return Ok(url);
        }

        let object_path = resolved.path.to_string();
        let mut url = match self.local_base_path() {
            Some(base) => Url::from_file_path(base.join(&object_path)).map_err(|()| {
                AppError::Storage(format!("cannot build a file URL below {}", base.display()))
            })?,
            None => {
                let mut url = Url::parse("memory://objects/")
                    .map_err(|e| AppError::InternalError(e.to_string()))?;
                url.set_path(&object_path);
                url
            }
        };
        url.query_pairs_mut()
            .append_pair("expires_in", &ttl_secs.to_string());
        Ok(url)
    }

    /// Fetch a CSV object addressed as `scheme://bucket/key` and parse it into rows.
    pub async fn read_csv(&self, location_uri: &str) -> Result<Vec<CsvRow>, AppError> {
        let location = ObjectLocation::parse(location_uri)?;
        let bytes = self.get(&location.bucket, &location.key).await?;
        let text = std::str::from_utf8(&bytes).map_err(|e| {
            AppError::Storage(format!("{location} is not valid UTF-8: {e}"))
        })?;
        let rows = parse_csv(text)?;

        debug!(%location, rows = rows.len(), "Read CSV object");
        Ok(rows)
    }

    /// Check if an object exists. Only tests call this; request paths write
    /// without looking first.
    pub async fn exists(&self, bucket: &str, key: &str) -> Result<bool, AppError> {
        let resolved = self.resolve(bucket, key)?;
        match resolved.store.head(&resolved.path).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// Create a storage backend based on configuration.
async fn create_storage_backend(cfg: &AppConfig) -> Result<(Backend, Option<PathBuf>), AppError> {
    match cfg.storage {
        StorageKind::S3 => {
            let mut builder = AmazonS3Builder::from_env();
            if let Some(region) = &cfg.aws_region {
                builder = builder.with_region(region);
            }
            if let Some(endpoint) = &cfg.s3_endpoint {
                builder = builder
                    .with_endpoint(endpoint)
                    .with_allow_http(endpoint.starts_with("http://"));
            }
            let buckets = S3Buckets::new(
                builder,
                [cfg.raw_bucket.as_str(), cfg.export_bucket.as_str()],
            )?;
            Ok((Backend::S3(Arc::new(buckets)), None))
        }
        StorageKind::Local => {
            let base = PathBuf::from(&cfg.data_dir);
            if !base.exists() {
                tokio::fs::create_dir_all(&base).await?;
            }
            let base = tokio::fs::canonicalize(&base).await?;
            let store = LocalFileSystem::new_with_prefix(&base)?;
            Ok((Backend::Shared(Arc::new(store)), Some(base)))
        }
        StorageKind::Memory => Ok((Backend::Shared(Arc::new(InMemory::new())), None)),
    }
}
