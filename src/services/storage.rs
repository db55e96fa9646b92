//! File storage collaborators for supporting documents.

use async_trait::async_trait;
use dashmap::DashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::errors::ServiceError;

#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Persists `bytes` and returns the URL that references them.
    async fn store(&self, file_name: &str, bytes: Vec<u8>) -> Result<String, ServiceError>;

    async fn delete(&self, url: &str) -> Result<(), ServiceError>;
}

/// Only the final path component survives, and anything outside `[A-Za-z0-9._-]` becomes `_`.
fn sanitize_file_name(file_name: &str) -> String {
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.trim_matches('.').is_empty() {
        "document".to_string()
    } else {
        cleaned
    }
}

fn object_key(file_name: &str) -> String {
    format!("{}-{}", Uuid::new_v4(), sanitize_file_name(file_name))
}

const LOCAL_SCHEME: &str = "file://";

/// Stores documents below a root directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalFileStorage {
    root: PathBuf,
}

impl LocalFileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, url: &str) -> Result<PathBuf, ServiceError> {
        let key = url
            .strip_prefix(LOCAL_SCHEME)
            .filter(|k| !k.is_empty() && !k.contains(['/', '\\']) && *k != "..")
            .ok_or_else(|| ServiceError::ValidationError(format!("Unknown document url '{}'", url)))?;
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl FileStorage for LocalFileStorage {
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    async fn store(&self, file_name: &str, bytes: Vec<u8>) -> Result<String, ServiceError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| ServiceError::InternalError(format!("storage unavailable: {}", e)))?;

        let key = object_key(file_name);
        tokio::fs::write(self.root.join(&key), bytes)
            .await
            .map_err(|e| ServiceError::InternalError(format!("failed to store document: {}", e)))?;

        debug!(key = %key, "document stored");
        Ok(format!("{}{}", LOCAL_SCHEME, key))
    }

    async fn delete(&self, url: &str) -> Result<(), ServiceError> {
        let path = self.path_for(url)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ServiceError::InternalError(format!(
                "failed to delete document: {}",
                e
            ))),
        }
    }
}

/// Keeps documents in memory; used by tests and local demos.
#[derive(Debug, Clone, Default)]
pub struct InMemoryFileStorage {
    objects: Arc<DashMap<String, Vec<u8>>>,
}

impl InMemoryFileStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn contains(&self, url: &str) -> bool {
        self.objects.contains_key(url)
    }
}

#[async_trait]
impl FileStorage for InMemoryFileStorage {
    async fn store(&self, file_name: &str, bytes: Vec<u8>) -> Result<String, ServiceError> {
        let url = format!("memory://{}", object_key(file_name));
        self.objects.insert(url.clone(), bytes);
        Ok(url)
    }

    async fn delete(&self, url: &str) -> Result<(), ServiceError> {
        self.objects.remove(url);
        Ok(())
    }
}
