//! Core backend adapter trait.

use async_trait::async_trait;
use bytes::Bytes;
use data_model::BackendKind;

use crate::BlobResult;

/// Uniform put/get/delete of raw bytes addressed by id.
///
/// Implementations know nothing about metadata; they only move bytes. A put
/// replaces whatever was stored under the id and must be atomic from the
/// adapter's point of view: a concurrent `get` observes either the old or the
/// new content, never a mix.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// The backend this adapter talks to.
    fn kind(&self) -> BackendKind;

    /// Store `data` under `id`, replacing existing content.
    async fn put(&self, id: &str, data: Bytes) -> BlobResult<()>;

    /// Read the bytes stored under `id`.
    ///
    /// Returns `BlobError::NotFound` if nothing is stored.
    async fn get(&self, id: &str) -> BlobResult<Bytes>;

    /// Remove the bytes stored under `id`.
    ///
    /// Returns `BlobError::NotFound` if nothing is stored.
    async fn delete(&self, id: &str) -> BlobResult<()>;
}
