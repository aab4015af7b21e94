use async_trait::async_trait;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use chrono::Utc;
use dashmap::DashMap;
use service_core::error::AppError;
use service_core::utils::signature::sign_object_url;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::fs;
use uuid::Uuid;

/// Byte storage for uploaded files.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `data` under `key` and return a backend-specific locator.
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<String, AppError>;
    async fn get(&self, key: &str) -> Result<Vec<u8>, AppError>;
    /// Deleting a missing key succeeds.
    async fn delete(&self, key: &str) -> Result<(), AppError>;
    /// Time-limited URL from which the object can be fetched without a token.
    async fn signed_get_url(&self, key: &str, ttl_seconds: u64) -> Result<String, AppError>;
    async fn health_check(&self) -> Result<(), AppError>;
    fn backend(&self) -> &'static str;
}

/// Storage key for a new upload: `<owner>/<uuid>-<sanitized name>`.
pub fn object_key(owner_id: &str, file_name: &str) -> String {
    let sanitized: String = file_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let sanitized = sanitized.trim_start_matches('.');
    let sanitized = if sanitized.is_empty() { "file" } else { sanitized };
    format!("{}/{}-{}", owner_id, Uuid::new_v4(), sanitized)
}

/// Keys must be relative paths without parent components.
pub fn validate_key(key: &str) -> Result<(), AppError> {
    let path = Path::new(key);
    let valid = !key.is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
    if valid {
        Ok(())
    } else {
        Err(AppError::BadRequest(anyhow::anyhow!("Invalid object key")))
    }
}

/// Issues URLs served by this service's `/storage` route, signed with a shared key.
#[derive(Clone)]
pub struct LocalUrlSigner {
    public_url: String,
    secret: String,
}

impl LocalUrlSigner {
    pub fn new(public_url: &str, secret: &str) -> Self {
        Self {
            public_url: public_url.trim_end_matches('/').to_string(),
            secret: secret.to_string(),
        }
    }

    pub fn sign(&self, key: &str, ttl_seconds: u64) -> Result<String, AppError> {
        let expires = Utc::now().timestamp() + ttl_seconds as i64;
        let signature = sign_object_url(&self.secret, key, expires)?;
        Ok(format!(
            "{}/storage/{}?expires={}&signature={}",
            self.public_url, key, expires, signature
        ))
    }
}

pub struct LocalStorage {
    base_path: PathBuf,
    signer: LocalUrlSigner,
}

impl LocalStorage {
    pub async fn new(
        base_path: impl Into<PathBuf>,
        signer: LocalUrlSigner,
    ) -> Result<Self, AppError> {
        let base_path = base_path.into();
        if !base_path.exists() {
            fs::create_dir_all(&base_path).await?;
        }
        Ok(Self { base_path, signer })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, AppError> {
        validate_key(key)?;
        Ok(self.base_path.join(key))
    }
}

#[async_trait]
impl ObjectStore for LocalStorage {
    async fn put(&self, key: &str, data: Vec<u8>, _content_type: &str) -> Result<String, AppError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::upstream("Failed to prepare storage directory", e))?;
        }
        fs::write(&path, data)
            .await
            .map_err(|e| AppError::upstream("Failed to write object", e))?;
        Ok(path.display().to_string())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, AppError> {
        let path = self.path_for(key)?;
        match fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(AppError::NotFound(anyhow::anyhow!("Object not found")))
            }
            Err(e) => Err(AppError::upstream("Failed to read object", e)),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::upstream("Failed to delete object", e)),
        }
    }

    async fn signed_get_url(&self, key: &str, ttl_seconds: u64) -> Result<String, AppError> {
        validate_key(key)?;
        self.signer.sign(key, ttl_seconds)
    }

    async fn health_check(&self) -> Result<(), AppError> {
        fs::metadata(&self.base_path)
            .await
            .map(|_| ())
            .map_err(|e| AppError::upstream("Storage directory unavailable", e))
    }

    fn backend(&self) -> &'static str {
        "local"
    }
}

pub struct S3Storage {
    client: S3Client,
    bucket: String,
}

impl S3Storage {
    pub fn new(client: S3Client, bucket: String) -> Self {
        Self { client, bucket }
    }

    pub async fn from_env(bucket: String, region: Option<String>) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(aws_sdk_s3::config::Region::new(region));
        }
        let sdk_config = loader.load().await;
        tracing::info!(bucket = %bucket, "Using S3 object storage");
        Self::new(S3Client::new(&sdk_config), bucket)
    }
}

#[async_trait]
impl ObjectStore for S3Storage {
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<String, AppError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| AppError::upstream("S3 upload failed", e))?;
        Ok(format!("s3://{}/{}", self.bucket, key))
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, AppError> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| AppError::upstream("S3 download failed", e))?;

        let data = output
            .body
            .collect()
            .await
            .map_err(|e| AppError::upstream("S3 body collection failed", e))?
            .into_bytes()
            .to_vec();

        Ok(data)
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| AppError::upstream("S3 delete failed", e))?;
        Ok(())
    }

    async fn signed_get_url(&self, key: &str, ttl_seconds: u64) -> Result<String, AppError> {
        let presigning = PresigningConfig::expires_in(Duration::from_secs(ttl_seconds))
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("Invalid URL lifetime: {}", e)))?;

        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| AppError::upstream("S3 presign failed", e))?;

        Ok(request.uri().to_string())
    }

    async fn health_check(&self) -> Result<(), AppError> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| AppError::upstream("S3 bucket unavailable", e))?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "s3"
    }
}

/// Process-local object store for tests and development.
pub struct InMemoryStorage {
    objects: DashMap<String, (Vec<u8>, String)>,
    signer: LocalUrlSigner,
    fail_puts: AtomicBool,
    fail_deletes: AtomicBool,
}

impl InMemoryStorage {
    pub fn new(signer: LocalUrlSigner) -> Self {
        Self {
            objects: DashMap::new(),
            signer,
            fail_puts: AtomicBool::new(false),
            fail_deletes: AtomicBool::new(false),
        }
    }

    pub fn set_fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn content_type(&self, key: &str) -> Option<String> {
        self.objects.get(key).map(|entry| entry.1.clone())
    }
}

#[async_trait]
impl ObjectStore for InMemoryStorage {
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<String, AppError> {
        validate_key(key)?;
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(AppError::upstream("Memory put failed", "injected failure"));
        }
        self.objects
            .insert(key.to_string(), (data, content_type.to_string()));
        Ok(format!("memory://{}", key))
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, AppError> {
        self.objects
            .get(key)
            .map(|entry| entry.0.clone())
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Object not found")))
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(AppError::upstream("Memory delete failed", "injected failure"));
        }
        self.objects.remove(key);
        Ok(())
    }

    async fn signed_get_url(&self, key: &str, ttl_seconds: u64) -> Result<String, AppError> {
        validate_key(key)?;
        self.signer.sign(key, ttl_seconds)
    }

    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
