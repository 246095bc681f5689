use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::factors::{FactorTableError, FactorTables};
use crate::domain::record::SimulationRecord;
use crate::services::blob_store::{BlobInfo, BlobStore, BlobStoreError, sort_newest_first};
use crate::services::dataset_codec::{DatasetCodecError, DatasetFormat, decode_dataset, encode_json};
use crate::services::generator::{GenerationRequestError, SimulationWindow, generate_with_rng};

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Internal(String),
}

impl ServiceError {
    pub fn status_code(&self) -> u16 {
        match self {
            ServiceError::BadRequest(_) => 400,
            ServiceError::NotFound(_) => 404,
            ServiceError::Internal(_) => 500,
        }
    }
}

impl From<GenerationRequestError> for ServiceError {
    fn from(err: GenerationRequestError) -> Self {
        ServiceError::BadRequest(err.to_string())
    }
}

impl From<FactorTableError> for ServiceError {
    fn from(err: FactorTableError) -> Self {
        ServiceError::BadRequest(format!("invalid custom factors: {err}"))
    }
}

/// Minutes arrive either as a number or as the string a form field produced.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum IntervalValue {
    Minutes(u32),
    Text(String),
}

impl IntervalValue {
    fn minutes(&self) -> Option<u32> {
        match self {
            IntervalValue::Minutes(minutes) => Some(*minutes),
            IntervalValue::Text(text) => text.trim().parse().ok(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GenerateSimulationRequest {
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub time_interval: Option<IntervalValue>,
    pub simulation_date: Option<String>,
    pub use_custom_factors: bool,
    pub weather_factors: Option<BTreeMap<String, f64>>,
    pub weekday_factors: Option<BTreeMap<String, f64>>,
    pub weekday_discounts: Option<BTreeMap<String, u32>>,
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateSimulationResponse {
    pub message: String,
    pub data: Vec<SimulationRecord>,
    pub record_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub success: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub message: String,
    pub file_name: String,
    pub blob_name: String,
    pub file_size: usize,
    pub file_type: String,
    pub url: String,
    pub data: Vec<SimulationRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileListResponse {
    pub files: Vec<BlobInfo>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_count: Option<usize>,
    pub success: bool,
}

/// Dataset operations behind both the CLI and the HTTP routes.
pub struct DatasetService {
    store: Option<Arc<dyn BlobStore>>,
}

impl DatasetService {
    pub fn new(store: Option<Arc<dyn BlobStore>>) -> Self {
        Self { store }
    }

    pub fn is_storage_configured(&self) -> bool {
        self.store.is_some()
    }

    pub async fn generate_simulation(
        &self,
        request: GenerateSimulationRequest,
    ) -> Result<GenerateSimulationResponse, ServiceError> {
        let (Some(start_time), Some(end_time), Some(interval), Some(date)) = (
            request.start_time.as_deref().filter(|v| !v.is_empty()),
            request.end_time.as_deref().filter(|v| !v.is_empty()),
            request.time_interval.as_ref(),
            request.simulation_date.as_deref().filter(|v| !v.is_empty()),
        ) else {
            return Err(ServiceError::BadRequest("missing required parameters".to_string()));
        };
        let interval = interval
            .minutes()
            .ok_or(GenerationRequestError::InvalidInterval)?;
        let window = SimulationWindow::parse(start_time, end_time, interval, date)?;

        let tables = if request.use_custom_factors {
            FactorTables::with_overrides(
                request.weather_factors.clone(),
                request.weekday_factors.clone(),
                request.weekday_discounts.clone(),
            )?
        } else {
            FactorTables::default()
        };

        let mut rng = match request.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let data = generate_with_rng(&window, &tables, &mut rng);
        let record_count = data.len();
        tracing::info!(record_count, date, start_time, end_time, interval, "generated simulation");

        let Some(store) = self.store.as_ref() else {
            return Ok(GenerateSimulationResponse {
                message: "Simulation generated (storage not configured)".to_string(),
                data,
                record_count,
                file_name: None,
                url: None,
                error: None,
                success: true,
            });
        };

        let file_name = format!("simulation_{date}_{}.json", Utc::now().timestamp_millis());
        let stored = async {
            let bytes = encode_json(&data).map_err(|e| BlobStoreError::Other(e.to_string()))?;
            store.ensure_container().await?;
            store.upload(&file_name, bytes, DatasetFormat::Json.content_type()).await
        }
        .await;

        match stored {
            Ok(url) => {
                tracing::info!(container = store.container_name(), blob = %file_name, "saved simulation");
                Ok(GenerateSimulationResponse {
                    message: "Simulation generated and saved to storage".to_string(),
                    data,
                    record_count,
                    file_name: Some(file_name),
                    url: Some(url),
                    error: None,
                    success: true,
                })
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to store generated simulation");
                Ok(GenerateSimulationResponse {
                    message: "Simulation generated but saving it to storage failed".to_string(),
                    data,
                    record_count,
                    file_name: None,
                    url: None,
                    error: Some(err.to_string()),
                    success: true,
                })
            }
        }
    }

    pub async fn upload_file(&self, file_name: &str, bytes: Vec<u8>) -> Result<UploadResponse, ServiceError> {
        let file_name = file_name.trim();
        if file_name.is_empty() {
            return Err(ServiceError::BadRequest("no valid file provided".to_string()));
        }
        if !is_plain_file_name(file_name) {
            return Err(ServiceError::BadRequest("invalid file name".to_string()));
        }
        let format = DatasetFormat::from_file_name(file_name).map_err(|_| {
            ServiceError::BadRequest("invalid file type, only JSON or CSV files are accepted".to_string())
        })?;
        let store = self
            .store
            .as_ref()
            .ok_or_else(|| ServiceError::Internal("storage connection string not found".to_string()))?;

        let blob_name = format!("{}-{}", Utc::now().timestamp_millis(), file_name);
        let file_size = bytes.len();
        store.ensure_container().await.map_err(internal("failed to prepare storage"))?;
        let url = store
            .upload(&blob_name, bytes.clone(), format.content_type())
            .await
            .map_err(internal("failed to upload file"))?;
        tracing::info!(container = store.container_name(), blob = %blob_name, file_size, "uploaded dataset");

        let data = decode_dataset(file_name, &bytes).map_err(|err: DatasetCodecError| {
            ServiceError::BadRequest(format!("failed to parse file: {err}"))
        })?;

        Ok(UploadResponse {
            message: "File uploaded to storage".to_string(),
            file_name: file_name.to_string(),
            blob_name,
            file_size,
            file_type: format.content_type().to_string(),
            url,
            data,
        })
    }

    pub async fn list_files(&self) -> Result<FileListResponse, ServiceError> {
        let Some(store) = self.existing_container().await? else {
            return Ok(FileListResponse { files: Vec::new() });
        };
        let mut files = store
            .list_blobs()
            .await
            .map_err(internal("failed to list files"))?;
        sort_newest_first(&mut files);
        Ok(FileListResponse { files })
    }

    pub async fn get_file(&self, file_name: &str) -> Result<Vec<SimulationRecord>, ServiceError> {
        let store = self.require_blob(file_name).await?;
        let bytes = store
            .download(file_name)
            .await
            .map_err(internal("failed to fetch file"))?;
        decode_dataset(file_name, &bytes)
            .map_err(|err| ServiceError::Internal(format!("failed to fetch file: {err}")))
    }

    pub async fn delete_file(&self, file_name: &str) -> Result<DeleteResponse, ServiceError> {
        let store = self.require_blob(file_name).await?;
        store
            .delete(file_name)
            .await
            .map_err(internal("failed to delete file"))?;
        tracing::info!(container = store.container_name(), blob = file_name, "deleted file");
        Ok(DeleteResponse {
            message: format!("File {file_name} deleted"),
            deleted_count: Some(1),
            success: true,
        })
    }

    pub async fn delete_data(&self, delete_all: bool) -> Result<DeleteResponse, ServiceError> {
        if !delete_all {
            return Err(ServiceError::BadRequest(
                "only deleting all files is supported".to_string(),
            ));
        }
        if self.store.is_none() {
            return Ok(DeleteResponse {
                message: "Storage not configured, only local data was removed".to_string(),
                deleted_count: None,
                success: true,
            });
        }
        let Some(store) = self.existing_container().await? else {
            return Ok(DeleteResponse {
                message: "Storage container not found, only local data was removed".to_string(),
                deleted_count: None,
                success: true,
            });
        };

        let blobs = store
            .list_blobs()
            .await
            .map_err(internal("failed to delete data"))?;
        let mut deleted_count = 0;
        for blob in &blobs {
            store
                .delete(&blob.name)
                .await
                .map_err(internal("failed to delete data"))?;
            deleted_count += 1;
        }
        tracing::info!(container = store.container_name(), deleted_count, "deleted all files");

        Ok(DeleteResponse {
            message: format!("Deleted {deleted_count} files from storage"),
            deleted_count: Some(deleted_count),
            success: true,
        })
    }

    /// The newest stored dataset with its blob name, if any.
    pub async fn latest_dataset(&self) -> Result<Option<(String, Vec<SimulationRecord>)>, ServiceError> {
        let listing = self.list_files().await?;
        let Some(newest) = listing.files.into_iter().next() else {
            return Ok(None);
        };
        let records = self.get_file(&newest.name).await?;
        Ok(Some((newest.name, records)))
    }

    async fn existing_container(&self) -> Result<Option<&Arc<dyn BlobStore>>, ServiceError> {
        let Some(store) = self.store.as_ref() else {
            return Ok(None);
        };
        let exists = store
            .container_exists()
            .await
            .map_err(internal("failed to reach storage"))?;
        Ok(exists.then_some(store))
    }

    async fn require_blob(&self, file_name: &str) -> Result<&Arc<dyn BlobStore>, ServiceError> {
        if !is_plain_file_name(file_name) {
            return Err(ServiceError::BadRequest("invalid file name".to_string()));
        }
        if self.store.is_none() {
            return Err(ServiceError::NotFound("storage not configured".to_string()));
        }
        let store = self
            .existing_container()
            .await?
            .ok_or_else(|| ServiceError::NotFound("container not found".to_string()))?;
        let exists = store
            .blob_exists(file_name)
            .await
            .map_err(internal("failed to reach storage"))?;
        if !exists {
            return Err(ServiceError::NotFound("file not found".to_string()));
        }
        Ok(store)
    }
}

/// A single path component: no separators, not empty, not `.` or `..`.
fn is_plain_file_name(name: &str) -> bool {
    let name = name.trim();
    !name.is_empty() && !name.contains(['/', '\\']) && name != "." && name != ".."
}

fn internal(context: &'static str) -> impl Fn(BlobStoreError) -> ServiceError {
    move |err| {
        tracing::error!(error = %err, "{context}");
        ServiceError::Internal(format!("{context}: {err}"))
    }
}
