//! Resolves a backend selector to its adapter.

use std::{collections::BTreeMap, sync::Arc};

use data_model::BackendKind;
use tracing::info;

use crate::{
    backends::{local::LocalBlobStore, s3::ObjectStoreBlobStore, table::TableBlobStore},
    metrics::{BlobMetrics, InstrumentedBlobStore},
    BlobResult,
    BlobStorageConfig,
    BlobStore,
};

/// The set of configured backends, built once at startup.
#[derive(Clone, Default)]
pub struct BlobStoreRegistry {
    backends: BTreeMap<BackendKind, Arc<dyn BlobStore>>,
}

impl BlobStoreRegistry {
    /// Create every backend that has a configuration section.
    pub fn from_config(config: &BlobStorageConfig) -> BlobResult<Self> {
        let metrics = BlobMetrics::new(&opentelemetry::global::meter("blob_store"));
        let mut registry = Self::default();

        if let Some(local) = &config.local {
            info!(path = %local.path, "using local blob store");
            registry = registry.with_backend(Arc::new(InstrumentedBlobStore::new(
                Arc::new(LocalBlobStore::new(local)?),
                metrics.clone(),
            )));
        }
        if let Some(table) = &config.table {
            info!(path = %table.path, "using table blob store");
            registry = registry.with_backend(Arc::new(InstrumentedBlobStore::new(
                Arc::new(TableBlobStore::open(table)?),
                metrics.clone(),
            )));
        }
        if let Some(object_store) = &config.object_store {
            info!(
                endpoint = %object_store.endpoint,
                bucket = %object_store.bucket,
                "using object store"
            );
            registry = registry.with_backend(Arc::new(InstrumentedBlobStore::new(
                Arc::new(ObjectStoreBlobStore::new(object_store)?),
                metrics,
            )));
        }

        Ok(registry)
    }

    /// Register `store` under its own kind, replacing any previous adapter.
    pub fn with_backend(mut self, store: Arc<dyn BlobStore>) -> Self {
        self.backends.insert(store.kind(), store);
        self
    }

    pub fn get(&self, kind: BackendKind) -> Option<Arc<dyn BlobStore>> {
        self.backends.get(&kind).cloned()
    }

    /// Configured backends in a stable order.
    pub fn kinds(&self) -> Vec<BackendKind> {
        self.backends.keys().copied().collect()
    }
}
