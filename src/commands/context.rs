use std::sync::Arc;

use thiserror::Error;

use crate::domain::record::SimulationRecord;
use crate::services::config::{ConfigError, DashboardConfig};
use crate::services::dataset_cache::{DatasetCache, DatasetCacheError};
use crate::services::dataset_codec::{DatasetCodecError, decode_dataset};
use crate::services::dataset_service::DatasetService;

#[derive(Error, Debug)]
pub enum LoadRecordsError {
    #[error("failed to read {path}: {source}")]
    Read { path: String, source: std::io::Error },
    #[error(transparent)]
    Decode(#[from] DatasetCodecError),
    #[error(transparent)]
    Cache(#[from] DatasetCacheError),
    #[error("no dataset loaded; run generate, upload, get-file or latest first, or pass --input")]
    NothingLoaded,
}

/// Shared state handed to every command.
///
/// A broken storage configuration only fails the commands that reach for storage.
pub struct CommandContext {
    pub config: DashboardConfig,
    service: Result<Arc<DatasetService>, ConfigError>,
    pub cache: DatasetCache,
}

impl CommandContext {
    pub fn from_config(config: DashboardConfig) -> Self {
        let service = config.blob_store().map(|store| {
            if store.is_none() {
                tracing::debug!("blob storage not configured");
            }
            Arc::new(DatasetService::new(store))
        });
        if let Err(err) = &service {
            tracing::debug!(error = %err, "storage configuration rejected");
        }
        let cache = DatasetCache::new(&config.cache_path);
        Self { service, cache, config }
    }

    pub fn service(&self) -> Result<&Arc<DatasetService>, &ConfigError> {
        self.service.as_ref()
    }

    /// The dataset service, or `None` after reporting why storage could not be set up.
    pub fn storage_service(&self) -> Option<&Arc<DatasetService>> {
        match self.service() {
            Ok(service) => Some(service),
            Err(e) => {
                eprintln!("Failed to configure storage: {e}");
                None
            }
        }
    }

    /// Records from `input` when given, otherwise from the last loaded dataset.
    pub async fn load_records(&self, input: Option<&str>) -> Result<Vec<SimulationRecord>, LoadRecordsError> {
        match input {
            Some(path) => {
                let bytes = tokio::fs::read(path).await.map_err(|source| LoadRecordsError::Read {
                    path: path.to_string(),
                    source,
                })?;
                Ok(decode_dataset(path, &bytes)?)
            }
            None => self.cache.load().await?.ok_or(LoadRecordsError::NothingLoaded),
        }
    }

    /// Remembers `records` as the current dataset. A cache failure is only logged.
    pub async fn remember(&self, records: &[SimulationRecord]) {
        match self.cache.store(records).await {
            Ok(()) => tracing::debug!(path = %self.cache.path().display(), records = records.len(), "cached dataset"),
            Err(err) => tracing::warn!(error = %err, "failed to cache dataset"),
        }
    }

    pub async fn forget(&self) {
        if let Err(err) = self.cache.clear().await {
            tracing::warn!(error = %err, "failed to clear dataset cache");
        }
    }
}
