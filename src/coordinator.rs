//! Sequences backend writes and metadata commits for one key at a time.
//!
//! Metadata is the source of truth for visibility: a blob exists for callers
//! exactly when a record exists. Bytes are written before the record is
//! committed and the record is removed before the bytes are deleted, so a
//! failure between the two steps can only leave unreachable bytes behind,
//! never a record pointing at nothing. Unreachable bytes are handed to the
//! [`Reclaimer`](crate::reclaimer::Reclaimer).

use std::{fmt, future::Future, sync::Arc, time::Duration};

use blob_store::{BlobError, BlobResult, BlobStore, BlobStoreRegistry};
use blobgate_utils::MonotonicClock;
use bytes::Bytes;
use data_model::{validate_blob_id, BackendKind, MetadataKey, MetadataRecord};
use metadata_store::{MetadataError, MetadataStoreTS};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::{
    locks::{KeyGuard, KeyLocks},
    reclaimer::ReclaimQueue,
};

/// What a Put does when a record for the key already exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WritePolicy {
    #[default]
    Overwrite,
    CreateOnly,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Upper bound of every single backend call.
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,

    #[serde(default)]
    pub write_policy: WritePolicy,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            call_timeout_ms: default_call_timeout_ms(),
            write_policy: WritePolicy::default(),
        }
    }
}

impl CoordinatorConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }
}

fn default_call_timeout_ms() -> u64 {
    30_000
}

/// The ways backend bytes and metadata can disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inconsistency {
    /// Bytes were written but the record could not be committed.
    OrphanedData,
    /// A record exists but the backend has no bytes for it.
    MissingData,
    /// The stored bytes do not have the recorded length.
    SizeMismatch { expected: u64, actual: u64 },
    /// A newer record was committed while this write was in flight.
    Superseded,
}

impl fmt::Display for Inconsistency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OrphanedData => write!(f, "data written but metadata not committed"),
            Self::MissingData => write!(f, "metadata present but data missing"),
            Self::SizeMismatch { expected, actual } => {
                write!(f, "expected {} bytes, backend returned {}", expected, actual)
            }
            Self::Superseded => write!(f, "write superseded by a newer commit"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    #[error("{0}")]
    BadRequest(String),

    #[error("blob not found: {key}")]
    NotFound { key: MetadataKey },

    #[error("backend {backend} unavailable: {kind}")]
    BackendUnavailable {
        backend: BackendKind,
        kind: &'static str,
        retryable: bool,
    },

    #[error("metadata store unavailable")]
    MetadataUnavailable,

    #[error("blob already exists: {key}")]
    Conflict { key: MetadataKey },

    #[error("inconsistent state for {key}: {inconsistency}")]
    InternalInconsistency {
        key: MetadataKey,
        inconsistency: Inconsistency,
    },
}

/// Whether the bytes were removed while serving a Delete or left to the
/// reclaimer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Reclaimed,
    Deferred,
}

pub struct Coordinator {
    backends: BlobStoreRegistry,
    metadata: MetadataStoreTS,
    locks: KeyLocks,
    clock: MonotonicClock,
    reclaim_queue: ReclaimQueue,
    call_timeout: Duration,
    write_policy: WritePolicy,
}

impl Coordinator {
    pub fn new(
        backends: BlobStoreRegistry,
        metadata: MetadataStoreTS,
        reclaim_queue: ReclaimQueue,
        config: &CoordinatorConfig,
    ) -> Self {
        Self {
            backends,
            metadata,
            locks: KeyLocks::new(),
            clock: MonotonicClock::new(),
            reclaim_queue,
            call_timeout: config.call_timeout(),
            write_policy: config.write_policy,
        }
    }

    pub fn with_clock(mut self, clock: MonotonicClock) -> Self {
        self.clock = clock;
        self
    }

    /// The per-key locks, shared with the reclaimer.
    pub fn locks(&self) -> KeyLocks {
        self.locks.clone()
    }

    pub fn backends(&self) -> &BlobStoreRegistry {
        &self.backends
    }

    #[tracing::instrument(skip_all, fields(key = %key, size = data.len()))]
    pub async fn put(
        &self,
        key: MetadataKey,
        data: Bytes,
    ) -> Result<MetadataRecord, CoordinatorError> {
        validate_blob_id(&key.id).map_err(|e| CoordinatorError::BadRequest(e.to_string()))?;
        let backend = self.backend(key.backend)?;
        let guard = self.locks.lock(&key).await;

        let current = match self.metadata.fetch(&key).await {
            Ok(record) => Some(record),
            Err(err) if err.is_not_found() => None,
            Err(err) => return Err(metadata_error(&key, err)),
        };
        if current.is_some() && self.write_policy == WritePolicy::CreateOnly {
            return Err(CoordinatorError::Conflict { key });
        }
        // A record written by an earlier run or another instance may carry a
        // timestamp ahead of this clock.
        let floor = current.map(|record| record.timestamp).unwrap_or_default();

        let size = data.len() as u64;
        // A timed out put may still land after the lock is released (the
        // table backend keeps writing on the blocking pool). A late write of
        // a different length shows up as SizeMismatch; one of the same length
        // is served under the previous record.
        call_backend(self.call_timeout, "put", backend.put(&key.id, data))
            .await
            .map_err(|err| backend_error(&key, "put", err))?;

        // The backend acknowledged the bytes. The commit runs detached and
        // keeps the key locked until it is done, even if this request is
        // dropped.
        let commit = tokio::spawn(commit_metadata(
            self.metadata.clone(),
            self.clock.clone(),
            self.reclaim_queue.clone(),
            key.clone(),
            size,
            floor,
            guard,
        ));
        commit.await.unwrap_or_else(|err| {
            error!(%key, "metadata commit task failed: {:?}", err);
            Err(CoordinatorError::InternalInconsistency {
                key,
                inconsistency: Inconsistency::OrphanedData,
            })
        })
    }

    #[tracing::instrument(skip_all, fields(key = %key))]
    pub async fn get(
        &self,
        key: &MetadataKey,
    ) -> Result<(MetadataRecord, Bytes), CoordinatorError> {
        let backend = self.backend(key.backend)?;
        let _guard = self.locks.lock(key).await;

        let record = self
            .metadata
            .fetch(key)
            .await
            .map_err(|err| metadata_error(key, err))?;

        let data = match call_backend(self.call_timeout, "get", backend.get(&key.id)).await {
            Ok(data) => data,
            Err(err) if err.is_not_found() => {
                error!(%key, size = record.size, "metadata present but backend has no data");
                return Err(CoordinatorError::InternalInconsistency {
                    key: key.clone(),
                    inconsistency: Inconsistency::MissingData,
                });
            }
            Err(err) => return Err(backend_error(key, "get", err)),
        };

        let actual = data.len() as u64;
        if actual != record.size {
            error!(%key, expected = record.size, actual, "stored size does not match metadata");
            return Err(CoordinatorError::InternalInconsistency {
                key: key.clone(),
                inconsistency: Inconsistency::SizeMismatch {
                    expected: record.size,
                    actual,
                },
            });
        }

        Ok((record, data))
    }

    #[tracing::instrument(skip_all, fields(key = %key))]
    pub async fn delete(&self, key: &MetadataKey) -> Result<DeleteOutcome, CoordinatorError> {
        let backend = self.backend(key.backend)?;
        let guard = self.locks.lock(key).await;

        self.metadata
            .remove(key)
            .await
            .map_err(|err| metadata_error(key, err))?;

        // The blob is gone for callers; the bytes are removed detached so a
        // dropped request still reclaims them or queues them.
        let reclaim = tokio::spawn(delete_data(
            backend,
            self.call_timeout,
            self.reclaim_queue.clone(),
            key.clone(),
            guard,
        ));
        Ok(reclaim.await.unwrap_or_else(|err| {
            warn!(%key, "backend delete task failed, queued for reclamation: {:?}", err);
            self.reclaim_queue.push(key.clone());
            DeleteOutcome::Deferred
        }))
    }

    /// True when a record exists for `key`.
    pub async fn exists(&self, key: &MetadataKey) -> Result<bool, CoordinatorError> {
        match self.metadata.fetch(key).await {
            Ok(_) => Ok(true),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(metadata_error(key, err)),
        }
    }

    fn backend(&self, kind: BackendKind) -> Result<Arc<dyn BlobStore>, CoordinatorError> {
        self.backends
            .get(kind)
            .ok_or(CoordinatorError::BackendUnavailable {
                backend: kind,
                kind: "not_configured",
                retryable: false,
            })
    }
}

/// Bounds a backend call by `after`. A call that does not finish in time is
/// dropped and reported as a retryable timeout.
pub(crate) async fn call_backend<T>(
    after: Duration,
    operation: &'static str,
    call: impl Future<Output = BlobResult<T>>,
) -> BlobResult<T> {
    match tokio::time::timeout(after, call).await {
        Ok(result) => result,
        Err(_) => Err(BlobError::Timeout { operation, after }),
    }
}

async fn commit_metadata(
    metadata: MetadataStoreTS,
    clock: MonotonicClock,
    reclaim_queue: ReclaimQueue,
    key: MetadataKey,
    size: u64,
    floor: u64,
    _guard: KeyGuard,
) -> Result<MetadataRecord, CoordinatorError> {
    let timestamp = clock.now_at_least(floor);
    let err = match metadata.upsert(&key, size, timestamp).await {
        Ok(record) => {
            debug!(%key, size, timestamp, "metadata committed");
            return Ok(record);
        }
        Err(err) => err,
    };

    let inconsistency = match err {
        MetadataError::StaleWrite { current, .. } => {
            // Another process committed after our fetch. Its record no
            // longer describes the bytes this write just stored.
            clock.now_at_least(current);
            error!(%key, current, attempted = timestamp, "metadata commit superseded");
            Inconsistency::Superseded
        }
        err => {
            error!(%key, "metadata commit failed after backend write: {:?}", err);
            Inconsistency::OrphanedData
        }
    };

    // A previous record would now describe bytes that were replaced.
    match metadata.remove(&key).await {
        Ok(()) => warn!(%key, "removed previous metadata of overwritten blob"),
        Err(err) if err.is_not_found() => {}
        Err(err) => error!(%key, "unable to remove previous metadata: {:?}", err),
    }
    reclaim_queue.push(key.clone());
    Err(CoordinatorError::InternalInconsistency { key, inconsistency })
}

async fn delete_data(
    backend: Arc<dyn BlobStore>,
    call_timeout: Duration,
    reclaim_queue: ReclaimQueue,
    key: MetadataKey,
    _guard: KeyGuard,
) -> DeleteOutcome {
    match call_backend(call_timeout, "delete", backend.delete(&key.id)).await {
        Ok(()) => DeleteOutcome::Reclaimed,
        Err(err) if err.is_not_found() => {
            warn!(%key, "backend had no data for deleted blob");
            DeleteOutcome::Reclaimed
        }
        Err(err) => {
            warn!(%key, "backend delete failed, queued for reclamation: {:?}", err);
            reclaim_queue.push(key);
            DeleteOutcome::Deferred
        }
    }
}

fn backend_error(key: &MetadataKey, operation: &'static str, err: BlobError) -> CoordinatorError {
    if let BlobError::InvalidId { reason, .. } = &err {
        return CoordinatorError::BadRequest(format!(
            "id is not valid for backend {}: {}",
            key.backend, reason
        ));
    }
    error!(%key, operation, "backend call failed: {:?}", err);
    CoordinatorError::BackendUnavailable {
        backend: key.backend,
        kind: err.kind(),
        retryable: err.is_retryable(),
    }
}

fn metadata_error(key: &MetadataKey, err: MetadataError) -> CoordinatorError {
    if err.is_not_found() {
        return CoordinatorError::NotFound { key: key.clone() };
    }
    error!(%key, "metadata store call failed: {:?}", err);
    CoordinatorError::MetadataUnavailable
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use blob_store::TableBlobStore;
    use metadata_store::{InMemoryMetadataStore, MetadataStore};

    use super::*;
    use crate::testing::{FaultyBlobStore, FaultyMetadataStore};

    fn key(id: &str) -> MetadataKey {
        MetadataKey::new(BackendKind::Table, id)
    }

    struct Fixture {
        coordinator: Coordinator,
        metadata: Arc<FaultyMetadataStore>,
        backend: Arc<FaultyBlobStore>,
        queue: ReclaimQueue,
    }

    fn fixture(config: CoordinatorConfig) -> Fixture {
        let backend = Arc::new(FaultyBlobStore::new(Arc::new(
            TableBlobStore::in_memory().unwrap(),
        )));
        let metadata = Arc::new(FaultyMetadataStore::new(Arc::new(
            InMemoryMetadataStore::new(),
        )));
        let queue = ReclaimQueue::default();
        let coordinator = Coordinator::new(
            BlobStoreRegistry::default().with_backend(backend.clone()),
            metadata.clone(),
            queue.clone(),
            &config,
        );
        Fixture {
            coordinator,
            metadata,
            backend,
            queue,
        }
    }

    #[tokio::test]
    async fn test_put_get_delete() {
        let f = fixture(CoordinatorConfig::default());
        let record = f
            .coordinator
            .put(key("a1"), Bytes::from_static(b"hello"))
            .await
            .unwrap();
        assert_eq!(record.size, 5);
        assert!(f.coordinator.exists(&key("a1")).await.unwrap());

        let (fetched, data) = f.coordinator.get(&key("a1")).await.unwrap();
        assert_eq!(fetched, record);
        assert_eq!(data, Bytes::from_static(b"hello"));

        assert_eq!(
            f.coordinator.delete(&key("a1")).await.unwrap(),
            DeleteOutcome::Reclaimed
        );
        assert!(matches!(
            f.coordinator.get(&key("a1")).await,
            Err(CoordinatorError::NotFound { .. })
        ));
        assert!(matches!(
            f.coordinator.delete(&key("a1")).await,
            Err(CoordinatorError::NotFound { .. })
        ));
        assert!(f.coordinator.locks().is_empty());
    }

    #[tokio::test]
    async fn test_timestamps_never_decrease() {
        let f = fixture(CoordinatorConfig::default());
        let coordinator = f.coordinator.with_clock(MonotonicClock::starting_at(u64::MAX - 1));
        let first = coordinator.put(key("a1"), Bytes::new()).await.unwrap();
        let second = coordinator
            .put(key("a1"), Bytes::from_static(b"x"))
            .await
            .unwrap();
        assert!(second.timestamp >= first.timestamp);
    }

    #[tokio::test]
    async fn test_invalid_id_is_bad_request() {
        let f = fixture(CoordinatorConfig::default());
        assert!(matches!(
            f.coordinator.put(key(""), Bytes::new()).await,
            Err(CoordinatorError::BadRequest(_))
        ));
        assert!(matches!(
            f.coordinator.put(key("a\nb"), Bytes::new()).await,
            Err(CoordinatorError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_unconfigured_backend() {
        let f = fixture(CoordinatorConfig::default());
        let err = f
            .coordinator
            .put(MetadataKey::new(BackendKind::Local, "a1"), Bytes::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CoordinatorError::BackendUnavailable {
                backend: BackendKind::Local,
                retryable: false,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_backend_put_failure_leaves_metadata_untouched() {
        let f = fixture(CoordinatorConfig::default());
        f.coordinator
            .put(key("a1"), Bytes::from_static(b"old"))
            .await
            .unwrap();

        f.backend.fail_puts(true);
        let err = f
            .coordinator
            .put(key("a1"), Bytes::from_static(b"newer"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CoordinatorError::BackendUnavailable {
                retryable: true,
                ..
            }
        ));

        let (record, data) = f.coordinator.get(&key("a1")).await.unwrap();
        assert_eq!(record.size, 3);
        assert_eq!(data, Bytes::from_static(b"old"));
    }

    #[tokio::test]
    async fn test_backend_timeout_is_retryable() {
        let f = fixture(CoordinatorConfig {
            call_timeout_ms: 20,
            ..Default::default()
        });
        f.backend.delay_calls(Duration::from_millis(500));
        let err = f
            .coordinator
            .put(key("slow"), Bytes::from_static(b"x"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CoordinatorError::BackendUnavailable {
                kind: "timeout",
                retryable: true,
                ..
            }
        ));
        assert!(!f.coordinator.exists(&key("slow")).await.unwrap());
    }

    #[tokio::test]
    async fn test_failed_metadata_commit_orphans_data() {
        let f = fixture(CoordinatorConfig::default());
        f.coordinator
            .put(key("a1"), Bytes::from_static(b"old"))
            .await
            .unwrap();

        f.metadata.fail_upserts(true);
        let err = f
            .coordinator
            .put(key("a1"), Bytes::from_static(b"replacement"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CoordinatorError::InternalInconsistency {
                inconsistency: Inconsistency::OrphanedData,
                ..
            }
        ));

        f.metadata.fail_upserts(false);
        assert!(matches!(
            f.coordinator.get(&key("a1")).await,
            Err(CoordinatorError::NotFound { .. })
        ));
        assert!(f.queue.contains(&key("a1")));
    }

    #[tokio::test]
    async fn test_missing_data_is_an_inconsistency() {
        let f = fixture(CoordinatorConfig::default());
        f.coordinator
            .put(key("a1"), Bytes::from_static(b"hello"))
            .await
            .unwrap();
        f.backend.inner().delete("a1").await.unwrap();

        let err = f.coordinator.get(&key("a1")).await.unwrap_err();
        assert!(matches!(
            err,
            CoordinatorError::InternalInconsistency {
                inconsistency: Inconsistency::MissingData,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_size_mismatch_is_an_inconsistency() {
        let f = fixture(CoordinatorConfig::default());
        f.coordinator
            .put(key("a1"), Bytes::from_static(b"hello"))
            .await
            .unwrap();
        f.backend
            .inner()
            .put("a1", Bytes::from_static(b"hi"))
            .await
            .unwrap();

        let err = f.coordinator.get(&key("a1")).await.unwrap_err();
        assert!(matches!(
            err,
            CoordinatorError::InternalInconsistency {
                inconsistency: Inconsistency::SizeMismatch {
                    expected: 5,
                    actual: 2
                },
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_failed_backend_delete_is_deferred() {
        let f = fixture(CoordinatorConfig::default());
        f.coordinator
            .put(key("a1"), Bytes::from_static(b"hello"))
            .await
            .unwrap();

        f.backend.fail_deletes(true);
        assert_eq!(
            f.coordinator.delete(&key("a1")).await.unwrap(),
            DeleteOutcome::Deferred
        );
        assert!(matches!(
            f.coordinator.get(&key("a1")).await,
            Err(CoordinatorError::NotFound { .. })
        ));
        assert!(f.queue.contains(&key("a1")));
        assert_eq!(
            f.backend.inner().get("a1").await.unwrap(),
            Bytes::from_static(b"hello")
        );
    }

    #[tokio::test]
    async fn test_metadata_outage() {
        let f = fixture(CoordinatorConfig::default());
        f.metadata.fail_reads(true);
        assert!(matches!(
            f.coordinator.get(&key("a1")).await,
            Err(CoordinatorError::MetadataUnavailable)
        ));
        assert!(matches!(
            f.coordinator.exists(&key("a1")).await,
            Err(CoordinatorError::MetadataUnavailable)
        ));
    }

    #[tokio::test]
    async fn test_create_only_policy() {
        let f = fixture(CoordinatorConfig {
            write_policy: WritePolicy::CreateOnly,
            ..Default::default()
        });
        f.coordinator
            .put(key("a1"), Bytes::from_static(b"one"))
            .await
            .unwrap();
        let err = f
            .coordinator
            .put(key("a1"), Bytes::from_static(b"two"))
            .await
            .unwrap_err();
        assert!(matches!(err, CoordinatorError::Conflict { .. }));

        let (_, data) = f.coordinator.get(&key("a1")).await.unwrap();
        assert_eq!(data, Bytes::from_static(b"one"));
    }

    #[tokio::test]
    async fn test_put_over_record_from_ahead_clock() {
        let f = fixture(CoordinatorConfig::default());
        let coordinator = f.coordinator.with_clock(MonotonicClock::starting_at(100));
        // Left by an earlier run whose clock was an hour ahead.
        let ahead = blobgate_utils::get_epoch_time_in_ms() + 3_600_000;
        f.backend
            .inner()
            .put("a1", Bytes::from_static(b"hello"))
            .await
            .unwrap();
        f.metadata.upsert(&key("a1"), 5, ahead).await.unwrap();

        let record = coordinator
            .put(key("a1"), Bytes::from_static(b"WORLD"))
            .await
            .unwrap();
        assert!(record.timestamp >= ahead);
        let (fetched, data) = coordinator.get(&key("a1")).await.unwrap();
        assert_eq!(fetched, record);
        assert_eq!(data, Bytes::from_static(b"WORLD"));

        let record = coordinator
            .put(key("a1"), Bytes::from_static(b"longer payload"))
            .await
            .unwrap();
        let (fetched, data) = coordinator.get(&key("a1")).await.unwrap();
        assert_eq!(fetched, record);
        assert_eq!(fetched.size, data.len() as u64);
        assert!(f.queue.is_empty());
    }

    #[tokio::test]
    async fn test_superseded_commit_never_serves_replaced_data() {
        let f = fixture(CoordinatorConfig::default());
        f.coordinator
            .put(key("a1"), Bytes::from_static(b"old"))
            .await
            .unwrap();

        // Another instance commits a newer record between our fetch and our
        // upsert.
        f.metadata.compete_next_upsert(3, u64::MAX);
        let err = f
            .coordinator
            .put(key("a1"), Bytes::from_static(b"hello"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CoordinatorError::InternalInconsistency {
                inconsistency: Inconsistency::Superseded,
                ..
            }
        ));

        // The record could describe either write; it must not be served.
        assert!(matches!(
            f.coordinator.get(&key("a1")).await,
            Err(CoordinatorError::NotFound { .. })
        ));
        assert!(f.queue.contains(&key("a1")));
    }

    #[tokio::test]
    async fn test_backend_get_failure_is_unavailable() {
        let f = fixture(CoordinatorConfig::default());
        f.coordinator
            .put(key("a1"), Bytes::from_static(b"hello"))
            .await
            .unwrap();

        f.backend.fail_gets(true);
        let err = f.coordinator.get(&key("a1")).await.unwrap_err();
        assert!(matches!(
            err,
            CoordinatorError::BackendUnavailable {
                backend: BackendKind::Table,
                retryable: true,
                ..
            }
        ));

        f.backend.fail_gets(false);
        let (_, data) = f.coordinator.get(&key("a1")).await.unwrap();
        assert_eq!(data, Bytes::from_static(b"hello"));
    }

    #[tokio::test]
    async fn test_metadata_remove_failure_keeps_blob() {
        let f = fixture(CoordinatorConfig::default());
        f.coordinator
            .put(key("a1"), Bytes::from_static(b"hello"))
            .await
            .unwrap();

        f.metadata.fail_removes(true);
        assert!(matches!(
            f.coordinator.delete(&key("a1")).await,
            Err(CoordinatorError::MetadataUnavailable)
        ));
        assert!(f.queue.is_empty());
        assert_eq!(
            f.backend.inner().get("a1").await.unwrap(),
            Bytes::from_static(b"hello")
        );

        f.metadata.fail_removes(false);
        let (record, data) = f.coordinator.get(&key("a1")).await.unwrap();
        assert_eq!(record.size, 5);
        assert_eq!(data, Bytes::from_static(b"hello"));
    }
}
