//! Backend adapters for the blob gateway.
//!
//! Every physical substrate implements the [`BlobStore`] trait: put, get and
//! delete of raw bytes addressed by id, with nothing known about metadata.
//!
//! - [`LocalBlobStore`]: files under a root directory, staged and renamed.
//! - [`TableBlobStore`]: one SQLite row per blob, written in a transaction.
//! - [`ObjectStoreBlobStore`]: S3-style object store over plain HTTP with
//!   bounded retries.
//!
//! The [`BlobStoreRegistry`] builds the configured backends once and resolves
//! a [`BackendKind`](data_model::BackendKind) to its adapter.

mod backends;
mod config;
mod error;
mod metrics;
mod registry;
mod traits;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use backends::{local::LocalBlobStore, s3::ObjectStoreBlobStore, table::TableBlobStore};
pub use config::{
    default_local_path,
    default_table_path,
    BlobStorageConfig,
    LocalStoreConfig,
    ObjectStoreConfig,
    TableStoreConfig,
};
pub use error::{BlobError, BlobResult};
pub use metrics::{BlobMetrics, InstrumentedBlobStore, Timer};
pub use registry::BlobStoreRegistry;
pub use traits::BlobStore;
