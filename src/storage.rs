//! File storage for uploaded documents.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;

use crate::core::config::{AppPaths, StorageSettings};
use crate::core::errors::ApiError;

/// Bucket-style byte storage keyed by relative paths such as
/// `uploads/<uuid>.pdf`.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, path: &str, bytes: &[u8]) -> Result<(), ApiError>;

    /// Missing objects are `NotFound`.
    async fn get(&self, path: &str) -> Result<Vec<u8>, ApiError>;

    async fn remove(&self, path: &str) -> Result<(), ApiError>;
}

/// `<root>/<bucket>/<path>` on the local filesystem.
pub struct LocalBlobStore {
    base: PathBuf,
}

impl LocalBlobStore {
    pub fn new(base: PathBuf) -> Self {
        Self { base }
    }

    pub fn from_settings(paths: &AppPaths, settings: &StorageSettings) -> Self {
        Self::new(paths.resolve_data_path(&settings.root).join(&settings.bucket))
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, ApiError> {
        let relative = Path::new(path);
        let is_plain = relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
        if path.trim().is_empty() || !is_plain {
            return Err(ApiError::BadRequest(format!(
                "Invalid storage path: {}",
                path
            )));
        }
        Ok(self.base.join(relative))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, path: &str, bytes: &[u8]) -> Result<(), ApiError> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(ApiError::upstream)?;
        }
        tokio::fs::write(&target, bytes)
            .await
            .map_err(ApiError::upstream)
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>, ApiError> {
        let target = self.resolve(path)?;
        match tokio::fs::read(&target).await {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == ErrorKind::NotFound => Err(ApiError::NotFound(format!(
                "File not found in storage: {}",
                path
            ))),
            Err(err) => Err(ApiError::upstream(err)),
        }
    }

    async fn remove(&self, path: &str) -> Result<(), ApiError> {
        let target = self.resolve(path)?;
        match tokio::fs::remove_file(&target).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Err(ApiError::NotFound(format!(
                "File not found in storage: {}",
                path
            ))),
            Err(err) => Err(ApiError::upstream(err)),
        }
    }
}
