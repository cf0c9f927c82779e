use async_trait::async_trait;
use dashmap::{mapref::entry::Entry, DashMap};
use data_model::{MetadataKey, MetadataRecord};

use crate::{MetadataError, MetadataStore};

/// Metadata kept in process memory. The shard lock held by the entry API
/// makes each upsert an atomic compare-and-set for its key.
#[derive(Debug, Default)]
pub struct InMemoryMetadataStore {
    records: DashMap<MetadataKey, MetadataRecord>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn upsert(
        &self,
        key: &MetadataKey,
        size: u64,
        timestamp: u64,
    ) -> Result<MetadataRecord, MetadataError> {
        match self.records.entry(key.clone()) {
            Entry::Occupied(mut entry) => {
                let current = entry.get().timestamp;
                if current > timestamp {
                    return Err(MetadataError::StaleWrite {
                        key: key.clone(),
                        current,
                        attempted: timestamp,
                    });
                }
                let record = entry.get_mut();
                record.size = size;
                record.timestamp = timestamp;
                Ok(record.clone())
            }
            Entry::Vacant(entry) => {
                let record = MetadataRecord {
                    backend: key.backend,
                    id: key.id.clone(),
                    size,
                    timestamp,
                };
                entry.insert(record.clone());
                Ok(record)
            }
        }
    }

    async fn fetch(&self, key: &MetadataKey) -> Result<MetadataRecord, MetadataError> {
        self.records
            .get(key)
            .map(|record| record.value().clone())
            .ok_or_else(|| MetadataError::NotFound { key: key.clone() })
    }

    async fn remove(&self, key: &MetadataKey) -> Result<(), MetadataError> {
        self.records
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| MetadataError::NotFound { key: key.clone() })
    }
}
