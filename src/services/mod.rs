pub mod aggregation;
pub mod azure_blob;
pub mod blob_store;
pub mod bucket_chart;
pub mod config;
pub mod dataset_cache;
pub mod dataset_codec;
pub mod dataset_service;
pub mod generator;
pub mod http_api;
pub mod local_blob;
pub mod logging;
pub mod sensor_panel;
