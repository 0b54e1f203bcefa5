//! Error types for the record store and its backing engine.

use crate::types::RecordId;
use thiserror::Error;

/// Errors raised by [`RecordStore`](crate::store::RecordStore) operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Record already persisted with id {0}")]
    AlreadyPersisted(RecordId),

    #[error("Invalid record identifier: {0}")]
    InvalidIdentifier(RecordId),

    #[error("Record has no identifier")]
    MissingIdentifier,

    #[error("Store is closed")]
    Closed,

    #[error("Backing store error: {0}")]
    Backing(#[from] BackingError),
}

/// Failures surfaced by a backing [`Collection`](crate::engine::Collection).
#[derive(Debug, Error)]
pub enum BackingError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Log entry of {size} bytes exceeds the {max} byte limit")]
    EntryTooLarge { size: usize, max: usize },

    #[error("Corruption detected: {0}")]
    Corruption(String),

    #[error("Checksum mismatch: expected {expected}, got {got}")]
    ChecksumMismatch { expected: u32, got: u32 },

    #[error("Invalid database format: {0}")]
    InvalidFormat(String),

    #[error("Database is locked by another process")]
    Locked,

    #[error("Database not initialized")]
    NotInitialized,

    #[error("Invalid collection name: {0}")]
    InvalidName(String),

    #[error("Document not found: {0}")]
    NotFound(RecordId),

    #[error("Duplicate value for unique field {field}: {value}")]
    DuplicateKey { field: String, value: String },

    #[error("Collection is closed")]
    Closed,
}

impl From<serde_json::Error> for BackingError {
    fn from(e: serde_json::Error) -> Self {
        BackingError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::encode::Error> for BackingError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        BackingError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for BackingError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        BackingError::Deserialization(e.to_string())
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Result type for backing engine operations.
pub type BackingResult<T> = std::result::Result<T, BackingError>;
