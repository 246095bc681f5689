use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::domain::record::SimulationRecord;
use crate::services::dataset_codec::{DatasetCodecError, encode_json};

#[derive(Error, Debug)]
pub enum DatasetCacheError {
    #[error("failed to access dataset cache {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("failed to encode cached dataset: {0}")]
    Encode(#[from] DatasetCodecError),
    #[error("cached dataset is corrupt: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Keeps the most recently loaded dataset on disk between invocations.
#[derive(Debug, Clone)]
pub struct DatasetCache {
    path: PathBuf,
}

impl DatasetCache {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn store(&self, records: &[SimulationRecord]) -> Result<(), DatasetCacheError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| self.io_error(source))?;
        }
        let bytes = encode_json(records)?;
        tokio::fs::write(&self.path, bytes)
            .await
            .map_err(|source| self.io_error(source))
    }

    pub async fn load(&self) -> Result<Option<Vec<SimulationRecord>>, DatasetCacheError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(self.io_error(source)),
        }
    }

    pub async fn clear(&self) -> Result<(), DatasetCacheError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(self.io_error(source)),
        }
    }

    fn io_error(&self, source: io::Error) -> DatasetCacheError {
        DatasetCacheError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample_records;

    #[tokio::test]
    async fn store_load_and_clear() {
        let dir = assert_fs::TempDir::new().unwrap();
        let cache = DatasetCache::new(dir.path().join("nested").join("last.json"));

        assert_eq!(cache.load().await.unwrap(), None);

        cache.store(&sample_records()).await.unwrap();
        assert_eq!(cache.load().await.unwrap(), Some(sample_records()));

        cache.clear().await.unwrap();
        assert_eq!(cache.load().await.unwrap(), None);
        cache.clear().await.unwrap();
    }

    #[tokio::test]
    async fn corrupt_cache_is_reported() {
        let dir = assert_fs::TempDir::new().unwrap();
        let path = dir.path().join("last.json");
        std::fs::write(&path, "not json").unwrap();

        let error = DatasetCache::new(&path).load().await.unwrap_err();
        assert!(matches!(error, DatasetCacheError::Decode(_)));
    }
}
