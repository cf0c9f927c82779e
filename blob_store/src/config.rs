//! Backend configuration.

use std::{env, path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

/// Configuration for all storage backends.
///
/// A backend without a section is not served; requests addressed to it fail
/// with `BackendUnavailable`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobStorageConfig {
    #[serde(default)]
    pub local: Option<LocalStoreConfig>,

    #[serde(default)]
    pub table: Option<TableStoreConfig>,

    #[serde(default)]
    pub object_store: Option<ObjectStoreConfig>,
}

impl Default for BlobStorageConfig {
    fn default() -> Self {
        Self {
            local: Some(LocalStoreConfig::default()),
            table: Some(TableStoreConfig::default()),
            object_store: None,
        }
    }
}

/// Local filesystem backend. Blobs live under `<path>/local/<id>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalStoreConfig {
    #[serde(default = "default_local_path")]
    pub path: String,
}

impl Default for LocalStoreConfig {
    fn default() -> Self {
        Self {
            path: default_local_path(),
        }
    }
}

/// Relational table backend (SQLite file).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableStoreConfig {
    #[serde(default = "default_table_path")]
    pub path: String,
}

impl Default for TableStoreConfig {
    fn default() -> Self {
        Self {
            path: default_table_path(),
        }
    }
}

/// S3-style object store reached over plain HTTP.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectStoreConfig {
    /// Base URL of the service, e.g. `http://127.0.0.1:9000`.
    pub endpoint: String,

    pub bucket: String,

    /// Key prefix inside the bucket.
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Upper bound of a single HTTP attempt.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Retries after the first attempt for retryable failures.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay of the exponential backoff between retries.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl ObjectStoreConfig {
    pub fn new(endpoint: &str, bucket: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            bucket: bucket.to_string(),
            prefix: default_prefix(),
            request_timeout_ms: default_request_timeout_ms(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

fn storage_root() -> PathBuf {
    env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join("blobgate_storage")
}

/// Default storage root of the local backend.
pub fn default_local_path() -> String {
    storage_root().to_string_lossy().into_owned()
}

/// Default SQLite file of the table backend.
pub fn default_table_path() -> String {
    storage_root().join("blobs.db").to_string_lossy().into_owned()
}

fn default_prefix() -> String {
    "uploads".to_string()
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    100
}
