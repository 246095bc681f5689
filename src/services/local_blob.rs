use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::services::blob_store::{BlobInfo, BlobStore, BlobStoreError};
use crate::services::dataset_codec::DatasetFormat;

/// A container kept as a plain directory under `root`.
pub struct LocalBlobStore {
    root: PathBuf,
    container: String,
}

impl LocalBlobStore {
    pub fn new<P: AsRef<Path>>(root: P, container: &str) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            container: container.to_string(),
        }
    }

    fn container_dir(&self) -> PathBuf {
        self.root.join(&self.container)
    }

    fn blob_path(&self, name: &str) -> Result<PathBuf, BlobStoreError> {
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(BlobStoreError::Other(format!("invalid blob name: {name}")));
        }
        Ok(self.container_dir().join(name))
    }
}

#[async_trait::async_trait]
impl BlobStore for LocalBlobStore {
    fn container_name(&self) -> &str {
        &self.container
    }

    fn blob_url(&self, name: &str) -> String {
        format!("file://{}", self.container_dir().join(name).display())
    }

    async fn container_exists(&self) -> Result<bool, BlobStoreError> {
        Ok(tokio::fs::metadata(self.container_dir())
            .await
            .map(|metadata| metadata.is_dir())
            .unwrap_or(false))
    }

    async fn create_container(&self) -> Result<(), BlobStoreError> {
        tokio::fs::create_dir_all(self.container_dir()).await?;
        Ok(())
    }

    async fn list_blobs(&self) -> Result<Vec<BlobInfo>, BlobStoreError> {
        let mut entries = match tokio::fs::read_dir(self.container_dir()).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Err(BlobStoreError::NotFound),
            Err(err) => return Err(err.into()),
        };

        let mut blobs = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let created_on = metadata
                .created()
                .or_else(|_| metadata.modified())
                .ok()
                .map(DateTime::<Utc>::from);
            let content_type = DatasetFormat::from_file_name(&name)
                .ok()
                .map(|format| format.content_type().to_string());
            blobs.push(BlobInfo {
                url: self.blob_url(&name),
                name,
                created_on,
                size: Some(metadata.len()),
                content_type,
            });
        }
        blobs.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(blobs)
    }

    async fn blob_exists(&self, name: &str) -> Result<bool, BlobStoreError> {
        let path = self.blob_path(name)?;
        Ok(tokio::fs::metadata(path)
            .await
            .map(|metadata| metadata.is_file())
            .unwrap_or(false))
    }

    async fn upload(&self, name: &str, bytes: Vec<u8>, _content_type: &str) -> Result<String, BlobStoreError> {
        let path = self.blob_path(name)?;
        tokio::fs::write(&path, bytes).await?;
        Ok(self.blob_url(name))
    }

    async fn download(&self, name: &str) -> Result<Vec<u8>, BlobStoreError> {
        let path = self.blob_path(name)?;
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Err(BlobStoreError::NotFound),
            Err(err) => Err(err.into()),
        }
    }

    async fn delete(&self, name: &str) -> Result<(), BlobStoreError> {
        let path = self.blob_path(name)?;
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Err(BlobStoreError::NotFound),
            Err(err) => Err(err.into()),
        }
    }
}
