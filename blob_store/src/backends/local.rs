//! Local filesystem backend.

use std::path::{Path as FsPath, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use data_model::BackendKind;
use object_store::{local::LocalFileSystem, path::Path, ObjectStore, PutPayload};
use tracing::debug;

use crate::{BlobError, BlobResult, BlobStore, LocalStoreConfig};

/// Stores each blob as a file under `<root>/local/<id>`.
///
/// Writes go through `object_store`'s [`LocalFileSystem`], which stages the
/// content in a sibling file and renames it over the destination once it is
/// fully written, so readers never see partial content.
#[derive(Debug)]
pub struct LocalBlobStore {
    root: PathBuf,
    store: LocalFileSystem,
}

impl LocalBlobStore {
    pub fn new(config: &LocalStoreConfig) -> BlobResult<Self> {
        let root = FsPath::new(&config.path).join(BackendKind::Local.as_ref());
        std::fs::create_dir_all(&root)?;
        let store = LocalFileSystem::new_with_prefix(&root).map_err(|e| BlobError::Other {
            source: anyhow::anyhow!("unable to open local store at {:?}: {}", root, e),
        })?;
        Ok(Self { root, store })
    }

    /// Directory holding the blob files.
    pub fn root(&self) -> &FsPath {
        &self.root
    }

    /// Maps an id onto a single file name directly under the root.
    ///
    /// Separators, relative components and hidden names are refused so an id
    /// can never address anything outside the root. `#` is reserved for the
    /// staging files of the underlying store.
    fn location(&self, id: &str) -> BlobResult<Path> {
        let invalid = |reason: &str| BlobError::InvalidId {
            id: id.to_string(),
            reason: reason.to_string(),
        };
        if id.is_empty() {
            return Err(invalid("id is empty"));
        }
        if id.contains(['/', '\\']) {
            return Err(invalid("id contains a path separator"));
        }
        if id.starts_with('.') {
            return Err(invalid("id starts with '.'"));
        }
        if id.contains('#') {
            return Err(invalid("id contains '#'"));
        }
        if id.chars().any(char::is_control) {
            return Err(invalid("id contains a control character"));
        }
        Ok(Path::from(id))
    }
}

fn map_err(id: &str, err: object_store::Error) -> BlobError {
    match err {
        object_store::Error::NotFound { .. } => BlobError::NotFound { id: id.to_string() },
        err => BlobError::Other {
            source: anyhow::Error::from(err),
        },
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    async fn put(&self, id: &str, data: Bytes) -> BlobResult<()> {
        let location = self.location(id)?;
        let size = data.len();
        self.store
            .put(&location, PutPayload::from(data))
            .await
            .map_err(|e| map_err(id, e))?;
        debug!(id, size, "stored blob on local filesystem");
        Ok(())
    }

    async fn get(&self, id: &str) -> BlobResult<Bytes> {
        let location = self.location(id)?;
        let result = self
            .store
            .get(&location)
            .await
            .map_err(|e| map_err(id, e))?;
        result.bytes().await.map_err(|e| map_err(id, e))
    }

    async fn delete(&self, id: &str) -> BlobResult<()> {
        let location = self.location(id)?;
        self.store
            .delete(&location)
            .await
            .map_err(|e| map_err(id, e))?;
        debug!(id, "deleted blob from local filesystem");
        Ok(())
    }
}
