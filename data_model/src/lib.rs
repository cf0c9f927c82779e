use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumIter, EnumString};

/// Longest id accepted by any backend, in bytes.
pub const MAX_BLOB_ID_LEN: usize = 512;

/// The physical substrate a blob lives in.
///
/// The wire names (`local`, `db`, `s3`) are what appears in request paths,
/// metadata rows and responses.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    AsRefStr,
    EnumString,
    EnumIter,
)]
pub enum BackendKind {
    #[serde(rename = "local")]
    #[strum(serialize = "local")]
    Local,

    #[serde(rename = "db")]
    #[strum(serialize = "db")]
    Table,

    #[serde(rename = "s3")]
    #[strum(serialize = "s3")]
    ObjectStore,
}

impl Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_ref())
    }
}

/// Composite key of a metadata record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MetadataKey {
    pub backend: BackendKind,
    pub id: String,
}

impl MetadataKey {
    pub fn new(backend: BackendKind, id: impl Into<String>) -> Self {
        Self {
            backend,
            id: id.into(),
        }
    }
}

impl Display for MetadataKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.backend, self.id)
    }
}

/// What the metadata store knows about a committed blob.
///
/// `size` is the exact byte length stored at the last successful write and
/// `timestamp` is in milliseconds since the Unix epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub backend: BackendKind,
    pub id: String,
    pub size: u64,
    pub timestamp: u64,
}

impl MetadataRecord {
    pub fn key(&self) -> MetadataKey {
        MetadataKey::new(self.backend, self.id.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidBlobId {
    #[error("blob id must not be empty")]
    Empty,

    #[error("blob id is longer than {} bytes", MAX_BLOB_ID_LEN)]
    TooLong,

    #[error("blob id must not contain control characters")]
    ControlCharacter,
}

/// Checks the rules every backend shares. Backends may be stricter.
pub fn validate_blob_id(id: &str) -> Result<(), InvalidBlobId> {
    if id.is_empty() {
        return Err(InvalidBlobId::Empty);
    }
    if id.len() > MAX_BLOB_ID_LEN {
        return Err(InvalidBlobId::TooLong);
    }
    if id.chars().any(char::is_control) {
        return Err(InvalidBlobId::ControlCharacter);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn test_backend_wire_names() {
        assert_eq!(BackendKind::from_str("local").unwrap(), BackendKind::Local);
        assert_eq!(BackendKind::from_str("db").unwrap(), BackendKind::Table);
        assert_eq!(
            BackendKind::from_str("s3").unwrap(),
            BackendKind::ObjectStore
        );
        assert!(BackendKind::from_str("table").is_err());

        for kind in BackendKind::iter() {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind));
        }
    }

    #[test]
    fn test_validate_blob_id() {
        assert!(validate_blob_id("a1").is_ok());
        assert!(validate_blob_id("some/nested/key.txt").is_ok());
        assert_eq!(validate_blob_id(""), Err(InvalidBlobId::Empty));
        assert_eq!(
            validate_blob_id(&"x".repeat(MAX_BLOB_ID_LEN + 1)),
            Err(InvalidBlobId::TooLong)
        );
        assert_eq!(
            validate_blob_id("bad\nid"),
            Err(InvalidBlobId::ControlCharacter)
        );
    }

    #[test]
    fn test_metadata_key_display() {
        let key = MetadataKey::new(BackendKind::Table, "a1");
        assert_eq!(key.to_string(), "db/a1");
    }
}
