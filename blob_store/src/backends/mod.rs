//! Backend implementations for different storage providers.

pub mod local;
pub mod s3;
pub mod table;
