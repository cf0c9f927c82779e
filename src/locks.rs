use std::sync::Arc;

use dashmap::DashMap;
use data_model::MetadataKey;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// One async mutex per `(backend, id)`.
///
/// Requests for different keys never contend. Entries are created on demand
/// and dropped by the last guard to leave, so the map only holds keys that
/// are in use.
#[derive(Clone, Default)]
pub struct KeyLocks {
    locks: Arc<DashMap<MetadataKey, Arc<Mutex<()>>>>,
}

impl KeyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, key: &MetadataKey) -> KeyGuard {
        let mutex = self.locks.entry(key.clone()).or_default().clone();
        let guard = mutex.lock_owned().await;
        KeyGuard {
            guard: Some(guard),
            key: key.clone(),
            locks: self.locks.clone(),
        }
    }

    /// Number of keys currently locked or waited on.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

pub struct KeyGuard {
    guard: Option<OwnedMutexGuard<()>>,
    key: MetadataKey,
    locks: Arc<DashMap<MetadataKey, Arc<Mutex<()>>>>,
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        self.guard.take();
        // Only the map still references the mutex: nobody holds or awaits it.
        self.locks
            .remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}
