//! Relational table backend on SQLite.

use std::{
    path::Path,
    sync::{Arc, Mutex},
    time::Duration,
};

use anyhow::anyhow;
use async_trait::async_trait;
use bytes::Bytes;
use data_model::BackendKind;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use crate::{BlobError, BlobResult, BlobStore, TableStoreConfig};

/// One row per blob in `blob_data(id, size, data)`.
pub struct TableBlobStore {
    conn: Arc<Mutex<Connection>>,
}

impl TableBlobStore {
    pub fn open(config: &TableStoreConfig) -> BlobResult<Self> {
        if let Some(parent) = Path::new(&config.path).parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(&config.path)?;
        Self::with_connection(conn)
    }

    pub fn in_memory() -> BlobResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> BlobResult<Self> {
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS blob_data (
                id TEXT PRIMARY KEY,
                size INTEGER NOT NULL,
                data BLOB NOT NULL
            )",
            [],
        )?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Runs `f` against the connection on the blocking pool.
    ///
    /// Dropping the returned future does not stop `f`: a write that outlives
    /// its caller still commits.
    async fn with_conn<F, T>(&self, f: F) -> BlobResult<T>
    where
        F: FnOnce(&mut Connection) -> BlobResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().map_err(|_| BlobError::Other {
                source: anyhow!("table connection lock poisoned"),
            })?;
            f(&mut conn)
        })
        .await?
    }
}

#[async_trait]
impl BlobStore for TableBlobStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Table
    }

    async fn put(&self, id: &str, data: Bytes) -> BlobResult<()> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO blob_data (id, size, data) VALUES (?1, ?2, ?3)
                 ON CONFLICT(id) DO UPDATE SET size = excluded.size, data = excluded.data",
                params![id, data.len() as i64, &data[..]],
            )?;
            tx.commit()?;
            debug!(id, size = data.len(), "stored blob row");
            Ok(())
        })
        .await
    }

    async fn get(&self, id: &str) -> BlobResult<Bytes> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let data = conn
                .query_row(
                    "SELECT data FROM blob_data WHERE id = ?1",
                    params![id],
                    |row| row.get::<_, Vec<u8>>(0),
                )
                .optional()?;
            data.map(Bytes::from).ok_or(BlobError::NotFound { id })
        })
        .await
    }

    async fn delete(&self, id: &str) -> BlobResult<()> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let deleted = conn.execute("DELETE FROM blob_data WHERE id = ?1", params![id])?;
            if deleted == 0 {
                return Err(BlobError::NotFound { id });
            }
            debug!(id, "deleted blob row");
            Ok(())
        })
        .await
    }
}
