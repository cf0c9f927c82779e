use std::{
    collections::BTreeSet,
    sync::{Arc, Mutex},
    time::Duration,
};

use blob_store::BlobStoreRegistry;
use data_model::MetadataKey;
use metadata_store::MetadataStoreTS;
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Notify};
use tracing::{debug, error, info, warn};

use crate::{coordinator::call_backend, locks::KeyLocks};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReclaimerConfig {
    /// Delay before retrying keys whose deletion failed.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for ReclaimerConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            batch_size: default_batch_size(),
        }
    }
}

fn default_interval_ms() -> u64 {
    5_000
}

fn default_batch_size() -> usize {
    64
}

/// Keys whose backend bytes no metadata points to anymore.
#[derive(Clone, Default)]
pub struct ReclaimQueue {
    pending: Arc<Mutex<BTreeSet<MetadataKey>>>,
    notify: Arc<Notify>,
}

impl ReclaimQueue {
    pub fn push(&self, key: MetadataKey) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.insert(key);
        }
        self.notify.notify_one();
    }

    fn take(&self, limit: usize) -> Vec<MetadataKey> {
        let Ok(mut pending) = self.pending.lock() else {
            return Vec::new();
        };
        let mut batch = Vec::with_capacity(limit.min(pending.len()));
        while batch.len() < limit {
            match pending.pop_first() {
                Some(key) => batch.push(key),
                None => break,
            }
        }
        batch
    }

    pub fn contains(&self, key: &MetadataKey) -> bool {
        self.pending
            .lock()
            .map(|pending| pending.contains(key))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.pending.lock().map(|pending| pending.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Reclaimed {
    Deleted,
    AlreadyGone,
    /// The key has a record again; its bytes are live.
    Live,
}

/// Deletes bytes of orphaned or deleted blobs in the background.
pub struct Reclaimer {
    queue: ReclaimQueue,
    backends: BlobStoreRegistry,
    metadata: MetadataStoreTS,
    locks: KeyLocks,
    call_timeout: Duration,
    interval: Duration,
    batch_size: usize,
    shutdown_rx: watch::Receiver<()>,
}

impl Reclaimer {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        queue: ReclaimQueue,
        backends: BlobStoreRegistry,
        metadata: MetadataStoreTS,
        locks: KeyLocks,
        call_timeout: Duration,
        config: &ReclaimerConfig,
        shutdown_rx: watch::Receiver<()>,
    ) -> Self {
        Self {
            queue,
            backends,
            metadata,
            locks,
            call_timeout,
            interval: Duration::from_millis(config.interval_ms),
            batch_size: config.batch_size.max(1),
            shutdown_rx,
        }
    }

    pub async fn start(&self) {
        info!("starting reclaimer");
        let mut shutdown_rx = self.shutdown_rx.clone();
        loop {
            if self.queue.is_empty() {
                tokio::select! {
                    _ = self.queue.notify.notified() => {},
                    _ = shutdown_rx.changed() => break,
                }
            }

            let processed = self.run_once().await;
            if processed > 0 {
                debug!(processed, "reclaimer batch done");
            }

            // Whatever is left failed this round; wait before retrying it.
            if !self.queue.is_empty() {
                tokio::select! {
                    _ = tokio::time::sleep(self.interval) => {},
                    _ = shutdown_rx.changed() => break,
                }
            }
        }
        info!("reclaimer shutting down");
    }

    /// Process one batch. Failed keys are re-queued. Returns the number of
    /// keys taken off the queue.
    pub async fn run_once(&self) -> usize {
        let batch = self.queue.take(self.batch_size);
        let taken = batch.len();
        for key in batch {
            match self.reclaim(&key).await {
                Ok(Reclaimed::Deleted) => info!(%key, "reclaimed blob data"),
                Ok(Reclaimed::AlreadyGone) => debug!(%key, "blob data already gone"),
                Ok(Reclaimed::Live) => debug!(%key, "blob was re-created, keeping its data"),
                Err(err) => {
                    warn!(%key, "reclamation failed, will retry: {:?}", err);
                    self.queue.push(key);
                }
            }
        }
        taken
    }

    async fn reclaim(&self, key: &MetadataKey) -> anyhow::Result<Reclaimed> {
        let Some(backend) = self.backends.get(key.backend) else {
            error!(%key, "backend is not configured, dropping reclamation");
            return Ok(Reclaimed::AlreadyGone);
        };
        let _guard = self.locks.lock(key).await;

        match self.metadata.fetch(key).await {
            Ok(_) => return Ok(Reclaimed::Live),
            Err(err) if err.is_not_found() => {}
            Err(err) => return Err(err.into()),
        }

        match call_backend(self.call_timeout, "delete", backend.delete(&key.id)).await {
            Ok(()) => Ok(Reclaimed::Deleted),
            Err(err) if err.is_not_found() => Ok(Reclaimed::AlreadyGone),
            Err(err) => Err(err.into()),
        }
    }
}
