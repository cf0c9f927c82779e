use std::sync::Arc;

use bytes::Bytes;
use data_model::{BackendKind, MetadataKey, MetadataRecord};
use tracing::warn;

use crate::coordinator::{Coordinator, CoordinatorError, DeleteOutcome};

/// Generated ids that collide with an existing record are redrawn at most
/// this many times.
const GENERATED_ID_ATTEMPTS: usize = 5;

/// Entry point of the blob operations, independent of HTTP.
pub struct Gateway {
    coordinator: Arc<Coordinator>,
}

impl Gateway {
    pub fn new(coordinator: Arc<Coordinator>) -> Self {
        Self { coordinator }
    }

    /// Store `data` under `id`, or under a fresh id when none is given.
    pub async fn create_blob(
        &self,
        backend: BackendKind,
        id: Option<String>,
        data: Bytes,
    ) -> Result<MetadataRecord, CoordinatorError> {
        let id = match id {
            Some(id) => id,
            None => self.generate_id(backend).await?,
        };
        self.coordinator
            .put(MetadataKey::new(backend, id), data)
            .await
    }

    pub async fn read_blob(
        &self,
        backend: BackendKind,
        id: &str,
    ) -> Result<(MetadataRecord, Bytes), CoordinatorError> {
        self.coordinator.get(&MetadataKey::new(backend, id)).await
    }

    pub async fn delete_blob(
        &self,
        backend: BackendKind,
        id: &str,
    ) -> Result<DeleteOutcome, CoordinatorError> {
        self.coordinator
            .delete(&MetadataKey::new(backend, id))
            .await
    }

    /// Backends that can serve requests.
    pub fn backends(&self) -> Vec<BackendKind> {
        self.coordinator.backends().kinds()
    }

    async fn generate_id(&self, backend: BackendKind) -> Result<String, CoordinatorError> {
        let mut last = MetadataKey::new(backend, String::new());
        for _ in 0..GENERATED_ID_ATTEMPTS {
            let key = MetadataKey::new(backend, nanoid::nanoid!());
            if !self.coordinator.exists(&key).await? {
                return Ok(key.id);
            }
            warn!(%key, "generated id already in use");
            last = key;
        }
        Err(CoordinatorError::Conflict { key: last })
    }
}
