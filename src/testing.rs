use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use axum::Router;
use blob_store::{
    testing::FakeObjectStore,
    BlobError,
    BlobResult,
    BlobStorageConfig,
    BlobStoreRegistry,
    BlobStore,
    LocalStoreConfig,
    ObjectStoreConfig,
    TableStoreConfig,
};
use bytes::Bytes;
use data_model::{BackendKind, MetadataKey, MetadataRecord};
use metadata_store::{MetadataError, MetadataStore, MetadataStoreConfig, MetadataStoreKind};
use tempfile::TempDir;
use tracing::subscriber;
use tracing_subscriber::{layer::SubscriberExt, Layer};

use crate::{config::ServerConfig, service::Service};

/// A service wired to every backend: local and table in a temporary
/// directory, and an in-process fake object store. Every backend and the
/// metadata store are wrapped for fault injection.
pub struct TestService {
    pub service: Service,
    pub object_store: FakeObjectStore,
    pub metadata: Arc<FaultyMetadataStore>,
    backends: BTreeMap<BackendKind, Arc<FaultyBlobStore>>,
    _temp_dir: TempDir,
}

impl TestService {
    pub async fn new() -> Result<Self> {
        Self::with_config(|_| {}).await
    }

    pub async fn with_config(customize: impl FnOnce(&mut ServerConfig)) -> Result<Self> {
        let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug"));
        let _ = subscriber::set_global_default(
            tracing_subscriber::registry()
                .with(tracing_subscriber::fmt::layer().with_filter(env_filter)),
        );

        let temp_dir = tempfile::tempdir()?;
        let object_store = FakeObjectStore::start().await;
        let root = temp_dir.path().to_string_lossy().into_owned();

        let mut config = ServerConfig {
            blob_storage: BlobStorageConfig {
                local: Some(LocalStoreConfig { path: root.clone() }),
                table: Some(TableStoreConfig {
                    path: format!("{}/blobs.db", root),
                }),
                object_store: Some(ObjectStoreConfig {
                    retry_backoff_ms: 1,
                    ..ObjectStoreConfig::new(&object_store.endpoint, "test-bucket")
                }),
            },
            metadata_store: MetadataStoreConfig {
                kind: MetadataStoreKind::Sqlite,
                path: format!("{}/metadata.db", root),
            },
            ..Default::default()
        };
        customize(&mut config);
        config.validate()?;

        let configured = BlobStoreRegistry::from_config(&config.blob_storage)?;
        let mut registry = BlobStoreRegistry::default();
        let mut backends = BTreeMap::new();
        for kind in configured.kinds() {
            if let Some(store) = configured.get(kind) {
                let faulty = Arc::new(FaultyBlobStore::new(store));
                registry = registry.with_backend(faulty.clone());
                backends.insert(kind, faulty);
            }
        }
        let metadata = Arc::new(FaultyMetadataStore::new(metadata_store::from_config(
            &config.metadata_store,
        )?));

        let service = Service::with_stores(config, registry, metadata.clone());
        Ok(Self {
            service,
            object_store,
            metadata,
            backends,
            _temp_dir: temp_dir,
        })
    }

    /// Fault injection handle of a configured backend.
    pub fn backend(&self, kind: BackendKind) -> &Arc<FaultyBlobStore> {
        &self.backends[&kind]
    }

    pub fn routes(&self) -> Router {
        self.service.routes()
    }
}

/// Wraps a backend and fails or delays its calls on demand.
pub struct FaultyBlobStore {
    inner: Arc<dyn BlobStore>,
    fail_puts: AtomicBool,
    fail_gets: AtomicBool,
    fail_deletes: AtomicBool,
    delay_ms: AtomicU64,
}

impl FaultyBlobStore {
    pub fn new(inner: Arc<dyn BlobStore>) -> Self {
        Self {
            inner,
            fail_puts: AtomicBool::new(false),
            fail_gets: AtomicBool::new(false),
            fail_deletes: AtomicBool::new(false),
            delay_ms: AtomicU64::new(0),
        }
    }

    /// The wrapped backend, bypassing fault injection.
    pub fn inner(&self) -> &Arc<dyn BlobStore> {
        &self.inner
    }

    pub fn fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    pub fn fail_gets(&self, fail: bool) {
        self.fail_gets.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn delay_calls(&self, delay: Duration) {
        self.delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    async fn inject(&self, fail: &AtomicBool) -> BlobResult<()> {
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if fail.load(Ordering::SeqCst) {
            return Err(BlobError::Unavailable {
                source: anyhow!("injected backend failure"),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl BlobStore for FaultyBlobStore {
    fn kind(&self) -> BackendKind {
        self.inner.kind()
    }

    async fn put(&self, id: &str, data: Bytes) -> BlobResult<()> {
        self.inject(&self.fail_puts).await?;
        self.inner.put(id, data).await
    }

    async fn get(&self, id: &str) -> BlobResult<Bytes> {
        self.inject(&self.fail_gets).await?;
        self.inner.get(id).await
    }

    async fn delete(&self, id: &str) -> BlobResult<()> {
        self.inject(&self.fail_deletes).await?;
        self.inner.delete(id).await
    }
}

/// Wraps a metadata store and fails its calls on demand.
pub struct FaultyMetadataStore {
    inner: Arc<dyn MetadataStore>,
    fail_upserts: AtomicBool,
    fail_reads: AtomicBool,
    fail_removes: AtomicBool,
    /// `(size, timestamp)` committed by another writer just before the next
    /// upsert.
    competing_upsert: Mutex<Option<(u64, u64)>>,
}

impl FaultyMetadataStore {
    pub fn new(inner: Arc<dyn MetadataStore>) -> Self {
        Self {
            inner,
            fail_upserts: AtomicBool::new(false),
            fail_reads: AtomicBool::new(false),
            fail_removes: AtomicBool::new(false),
            competing_upsert: Mutex::new(None),
        }
    }

    pub fn fail_upserts(&self, fail: bool) {
        self.fail_upserts.store(fail, Ordering::SeqCst);
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_removes(&self, fail: bool) {
        self.fail_removes.store(fail, Ordering::SeqCst);
    }

    /// Commit `(size, timestamp)` for the key right before the next upsert
    /// reaches the store, as a second instance sharing it would.
    pub fn compete_next_upsert(&self, size: u64, timestamp: u64) {
        if let Ok(mut competing) = self.competing_upsert.lock() {
            *competing = Some((size, timestamp));
        }
    }

    fn inject(fail: &AtomicBool) -> Result<(), MetadataError> {
        if fail.load(Ordering::SeqCst) {
            return Err(MetadataError::Other {
                source: anyhow!("injected metadata failure"),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl MetadataStore for FaultyMetadataStore {
    async fn upsert(
        &self,
        key: &MetadataKey,
        size: u64,
        timestamp: u64,
    ) -> Result<MetadataRecord, MetadataError> {
        Self::inject(&self.fail_upserts)?;
        let competing = self
            .competing_upsert
            .lock()
            .ok()
            .and_then(|mut competing| competing.take());
        if let Some((other_size, other_timestamp)) = competing {
            self.inner.upsert(key, other_size, other_timestamp).await?;
        }
        self.inner.upsert(key, size, timestamp).await
    }

    async fn fetch(&self, key: &MetadataKey) -> Result<MetadataRecord, MetadataError> {
        Self::inject(&self.fail_reads)?;
        self.inner.fetch(key).await
    }

    async fn remove(&self, key: &MetadataKey) -> Result<(), MetadataError> {
        Self::inject(&self.fail_removes)?;
        self.inner.remove(key).await
    }
}
