//! Storage abstraction trait

use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<StorageError> for folio_core::AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => folio_core::AppError::NotFound(key),
            StorageError::InvalidKey(msg) => folio_core::AppError::InvalidInput(msg),
            other => folio_core::AppError::Storage(other.to_string()),
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Location of a stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub key: String,
    pub url: String,
}

/// Storage abstraction trait
///
/// `store` has overwrite semantics: the key is derived from `namespace` and
/// `logical_name` only, so storing the same logical object twice replaces it.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn store(
        &self,
        data: Bytes,
        logical_name: &str,
        namespace: &str,
        content_type: &str,
    ) -> StorageResult<StoredObject>;

    /// Download an object by its storage key
    async fn download(&self, storage_key: &str) -> StorageResult<Bytes>;

    async fn exists(&self, storage_key: &str) -> StorageResult<bool>;

    async fn delete(&self, storage_key: &str) -> StorageResult<()>;

    /// Publicly resolvable URL for a key. Does not check existence.
    fn public_url(&self, storage_key: &str) -> String;

    fn backend_type(&self) -> StorageBackend;

    /// Reverse of `public_url` for URLs issued by this backend.
    fn key_for_url(&self, url: &str) -> Option<String> {
        let base = self.public_url("");
        url.strip_prefix(base.as_str())
            .filter(|key| !key.is_empty())
            .map(str::to_string)
    }
}
