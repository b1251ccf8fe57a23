//! Error types for bucketlog
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using BucketLogError
pub type Result<T> = std::result::Result<T, BucketLogError>;

/// Unified error type for bucketlog operations
#[derive(Debug, Error)]
pub enum BucketLogError {
    // -------------------------------------------------------------------------
    // Object Store Errors
    // -------------------------------------------------------------------------
    #[error("Object store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    #[error("Invalid object key: {0}")]
    InvalidKey(String),

    // -------------------------------------------------------------------------
    // Write Errors
    // -------------------------------------------------------------------------
    #[error("Partial write on table {table}: {written} of {total} files written ({reason})")]
    PartialWrite {
        table: String,
        written: usize,
        total: usize,
        reason: String,
    },

    #[error("Table {0} is dirty after a partial write; truncate it before inserting")]
    TableDirty(String),

    // -------------------------------------------------------------------------
    // Catalog Errors
    // -------------------------------------------------------------------------
    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Table already exists: {0}")]
    TableExists(String),

    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    // -------------------------------------------------------------------------
    // Format Errors
    // -------------------------------------------------------------------------
    #[error("Corruption detected: {0}")]
    Corruption(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<bincode::Error> for BucketLogError {
    fn from(err: bincode::Error) -> Self {
        BucketLogError::Serialization(err.to_string())
    }
}
