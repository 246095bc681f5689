use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

pub const DEFAULT_CONTAINER: &str = "simulation-data";

#[derive(Error, Debug)]
pub enum BlobStoreError {
    #[error("resource not found")]
    NotFound,
    #[error("connection error: {0}")]
    Connection(String),
    #[error("unauthorized")]
    Unauthorized,
    #[error("resource already exists")]
    Conflict,
    #[error("parse error: {0}")]
    Parse(String),
    #[error("storage i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobInfo {
    pub name: String,
    pub url: String,
    pub created_on: Option<DateTime<Utc>>,
    pub size: Option<u64>,
    pub content_type: Option<String>,
}

/// Describes a single container of named blobs.
#[async_trait::async_trait]
pub trait BlobStore: Send + Sync {
    fn container_name(&self) -> &str;

    fn blob_url(&self, name: &str) -> String;

    async fn container_exists(&self) -> Result<bool, BlobStoreError>;

    async fn create_container(&self) -> Result<(), BlobStoreError>;

    async fn list_blobs(&self) -> Result<Vec<BlobInfo>, BlobStoreError>;

    async fn blob_exists(&self, name: &str) -> Result<bool, BlobStoreError>;

    /// Stores `bytes` under `name`, replacing any existing blob, and returns its url.
    async fn upload(&self, name: &str, bytes: Vec<u8>, content_type: &str) -> Result<String, BlobStoreError>;

    async fn download(&self, name: &str) -> Result<Vec<u8>, BlobStoreError>;

    async fn delete(&self, name: &str) -> Result<(), BlobStoreError>;

    async fn ensure_container(&self) -> Result<(), BlobStoreError> {
        if !self.container_exists().await? {
            self.create_container().await?;
        }
        Ok(())
    }
}

/// Newest first; blobs without a creation time sort last.
pub fn sort_newest_first(blobs: &mut [BlobInfo]) {
    blobs.sort_by(|a, b| b.created_on.cmp(&a.created_on));
}
