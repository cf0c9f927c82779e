use std::{
    path::Path,
    sync::{Arc, Mutex},
    time::Duration,
};

use anyhow::anyhow;
use async_trait::async_trait;
use data_model::{MetadataKey, MetadataRecord};
use rusqlite::{params, Connection, OptionalExtension};

use crate::{MetadataError, MetadataStore};

/// Metadata rows in `blob_meta(backend, id, size, timestamp)`.
///
/// The upsert is a single conditional `ON CONFLICT DO UPDATE` that only
/// applies when the incoming timestamp is not older than the stored one; a
/// write that changes no row is reported as stale.
pub struct SqliteMetadataStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteMetadataStore {
    pub fn open(path: &str) -> Result<Self, MetadataError> {
        if let Some(parent) = Path::new(path).parent() {
            std::fs::create_dir_all(parent).map_err(|e| MetadataError::Other {
                source: anyhow!("unable to create metadata directory {:?}: {}", parent, e),
            })?;
        }
        Self::with_connection(Connection::open(path)?)
    }

    pub fn in_memory() -> Result<Self, MetadataError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, MetadataError> {
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS blob_meta (
                backend TEXT NOT NULL,
                id TEXT NOT NULL,
                size INTEGER NOT NULL,
                timestamp INTEGER NOT NULL,
                PRIMARY KEY (backend, id)
            )",
            [],
        )?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<F, T>(&self, f: F) -> Result<T, MetadataError>
    where
        F: FnOnce(&mut Connection) -> Result<T, MetadataError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().map_err(|_| MetadataError::Other {
                source: anyhow!("metadata connection lock poisoned"),
            })?;
            f(&mut conn)
        })
        .await?
    }
}

#[async_trait]
impl MetadataStore for SqliteMetadataStore {
    async fn upsert(
        &self,
        key: &MetadataKey,
        size: u64,
        timestamp: u64,
    ) -> Result<MetadataRecord, MetadataError> {
        let key = key.clone();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let changed = tx.execute(
                "INSERT INTO blob_meta (backend, id, size, timestamp) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(backend, id) DO UPDATE
                 SET size = excluded.size, timestamp = excluded.timestamp
                 WHERE excluded.timestamp >= blob_meta.timestamp",
                params![key.backend.as_ref(), key.id, size as i64, timestamp as i64],
            )?;
            if changed == 0 {
                let current: i64 = tx.query_row(
                    "SELECT timestamp FROM blob_meta WHERE backend = ?1 AND id = ?2",
                    params![key.backend.as_ref(), key.id],
                    |row| row.get(0),
                )?;
                return Err(MetadataError::StaleWrite {
                    key,
                    current: current as u64,
                    attempted: timestamp,
                });
            }
            tx.commit()?;
            Ok(MetadataRecord {
                backend: key.backend,
                id: key.id,
                size,
                timestamp,
            })
        })
        .await
    }

    async fn fetch(&self, key: &MetadataKey) -> Result<MetadataRecord, MetadataError> {
        let key = key.clone();
        self.with_conn(move |conn| {
            let row = conn
                .query_row(
                    "SELECT size, timestamp FROM blob_meta WHERE backend = ?1 AND id = ?2",
                    params![key.backend.as_ref(), key.id],
                    |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)),
                )
                .optional()?;
            match row {
                Some((size, timestamp)) => Ok(MetadataRecord {
                    backend: key.backend,
                    id: key.id,
                    size: size as u64,
                    timestamp: timestamp as u64,
                }),
                None => Err(MetadataError::NotFound { key }),
            }
        })
        .await
    }

    async fn remove(&self, key: &MetadataKey) -> Result<(), MetadataError> {
        let key = key.clone();
        self.with_conn(move |conn| {
            let removed = conn.execute(
                "DELETE FROM blob_meta WHERE backend = ?1 AND id = ?2",
                params![key.backend.as_ref(), key.id],
            )?;
            if removed == 0 {
                return Err(MetadataError::NotFound { key });
            }
            Ok(())
        })
        .await
    }
}
