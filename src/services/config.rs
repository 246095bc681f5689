use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;

use crate::domain::factors::FactorOverrides;
use crate::services::azure_blob::{AzureBlobStore, AzureConnection};
use crate::services::blob_store::{BlobStore, BlobStoreError, DEFAULT_CONTAINER};
use crate::services::local_blob::LocalBlobStore;

pub const CONNECTION_STRING_ENV: &str = "AZURE_STORAGE_CONNECTION_STRING";
pub const CACHE_PATH_ENV: &str = "MALL_TRAFFIC_CACHE";
pub const STORAGE_DIR_ENV: &str = "MALL_TRAFFIC_STORAGE_DIR";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("failed to parse config file {path}: {source}")]
    Parse { path: PathBuf, source: serde_yaml::Error },
    #[error("invalid storage configuration: {0}")]
    Storage(#[from] BlobStoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Azure when a connection string is available, otherwise no storage.
    Auto,
    Azure,
    Local,
    None,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub container: String,
    pub local_dir: String,
    pub connection_string: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Auto,
            container: DEFAULT_CONTAINER.to_string(),
            local_dir: "blob-storage".to_string(),
            connection_string: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub storage: StorageConfig,
    pub server: ServerConfig,
    pub cache_path: String,
    pub log_level: String,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            server: ServerConfig::default(),
            cache_path: ".mall-traffic/last-dataset.json".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl DashboardConfig {
    pub fn from_yaml_file(filepath: &str) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(filepath).map_err(|source| ConfigError::Read {
            path: PathBuf::from(filepath),
            source,
        })?;
        serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: PathBuf::from(filepath),
            source,
        })
    }

    /// Reads the optional config file, then lets environment variables override it.
    pub fn load(filepath: Option<&str>) -> Result<Self, ConfigError> {
        let mut config = match filepath {
            Some(path) => Self::from_yaml_file(path)?,
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Some(connection_string) = non_empty_env(CONNECTION_STRING_ENV) {
            self.storage.connection_string = Some(connection_string);
        }
        if let Some(dir) = non_empty_env(STORAGE_DIR_ENV) {
            self.storage.local_dir = dir;
            if self.storage.backend == StorageBackend::Auto {
                self.storage.backend = StorageBackend::Local;
            }
        }
        if let Some(cache_path) = non_empty_env(CACHE_PATH_ENV) {
            self.cache_path = cache_path;
        }
    }

    /// The configured blob store, or `None` when storage is not configured.
    pub fn blob_store(&self) -> Result<Option<Arc<dyn BlobStore>>, ConfigError> {
        let storage = &self.storage;
        let connection_string = storage
            .connection_string
            .as_deref()
            .filter(|value| !value.trim().is_empty());

        let store: Option<Arc<dyn BlobStore>> = match (storage.backend, connection_string) {
            (StorageBackend::None, _) => None,
            (StorageBackend::Local, _) => Some(Arc::new(LocalBlobStore::new(
                &storage.local_dir,
                &storage.container,
            ))),
            (StorageBackend::Azure, None) | (StorageBackend::Auto, None) => None,
            (StorageBackend::Azure, Some(value)) | (StorageBackend::Auto, Some(value)) => {
                let connection = AzureConnection::parse(value)?;
                Some(Arc::new(AzureBlobStore::new(connection, &storage.container)?))
            }
        };
        Ok(store)
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

pub fn load_factor_overrides(filepath: &str) -> Result<FactorOverrides, ConfigError> {
    let contents = fs::read_to_string(filepath).map_err(|source| ConfigError::Read {
        path: PathBuf::from(filepath),
        source,
    })?;
    serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: PathBuf::from(filepath),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::factors::FactorTables;
    use assert_fs::prelude::*;

    #[test]
    fn partial_yaml_falls_back_to_defaults() {
        let file = assert_fs::NamedTempFile::new("config.yaml").unwrap();
        file.write_str("storage:\n  backend: local\n  local_dir: /tmp/blobs\n").unwrap();

        let config = DashboardConfig::from_yaml_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.storage.backend, StorageBackend::Local);
        assert_eq!(config.storage.local_dir, "/tmp/blobs");
        assert_eq!(config.storage.container, "simulation-data");
        assert_eq!(config.server.bind, "127.0.0.1:8080");
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn unknown_backend_is_a_parse_error() {
        let file = assert_fs::NamedTempFile::new("config.yaml").unwrap();
        file.write_str("storage:\n  backend: s3\n").unwrap();

        let error = DashboardConfig::from_yaml_file(file.path().to_str().unwrap()).unwrap_err();
        assert!(matches!(error, ConfigError::Parse { .. }));
    }

    #[test]
    fn storage_selection_follows_backend_and_connection_string() {
        let mut config = DashboardConfig::default();
        assert!(config.blob_store().unwrap().is_none());

        config.storage.connection_string =
            Some("BlobEndpoint=https://mall.blob.core.windows.net;SharedAccessSignature=sig=x".to_string());
        let store = config.blob_store().unwrap().unwrap();
        assert_eq!(
            store.blob_url("a.json"),
            "https://mall.blob.core.windows.net/simulation-data/a.json"
        );

        config.storage.connection_string = Some(
            "DefaultEndpointsProtocol=https;AccountName=mall;AccountKey=c2VjcmV0;EndpointSuffix=core.windows.net"
                .to_string(),
        );
        let store = config.blob_store().unwrap().unwrap();
        assert_eq!(
            store.blob_url("a.json"),
            "https://mall.blob.core.windows.net/simulation-data/a.json"
        );

        config.storage.connection_string = Some("AccountKey=c2VjcmV0".to_string());
        assert!(matches!(config.blob_store(), Err(ConfigError::Storage(_))));

        config.storage.backend = StorageBackend::None;
        assert!(config.blob_store().unwrap().is_none());

        config.storage.backend = StorageBackend::Local;
        let store = config.blob_store().unwrap().unwrap();
        assert!(store.blob_url("a.json").starts_with("file://"));
    }

    #[test]
    fn factor_overrides_load_from_yaml() {
        let file = assert_fs::NamedTempFile::new("factors.yaml").unwrap();
        file.write_str("weather:\n  Sunny: 1.2\n  Foggy: 0.5\n").unwrap();

        let overrides = load_factor_overrides(file.path().to_str().unwrap()).unwrap();
        let tables =
            FactorTables::with_overrides(overrides.weather, overrides.weekday, overrides.discounts).unwrap();
        assert_eq!(tables.weather().len(), 2);
        assert_eq!(tables.weekday().len(), 7);
    }
}
