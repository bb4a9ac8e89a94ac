//! Error types for suiyuan-core

use thiserror::Error;

/// Result type alias using suiyuan-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in suiyuan-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Caller passed a record that does not conform to the expected shape
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A storage write was rejected because the store is full
    #[error(
        "Storage full: {store} cannot fit {requested_bytes} more bytes (quota {quota_bytes} bytes)"
    )]
    QuotaExceeded {
        store: &'static str,
        requested_bytes: u64,
        quota_bytes: u64,
    },

    /// Serialized settings are over the ceiling even after media was stripped
    #[error("Settings are too large: {size_bytes} bytes after removing media (limit {limit_bytes} bytes)")]
    SizeExceeded { size_bytes: usize, limit_bytes: usize },

    /// Malformed `data:` URL
    #[error("Invalid data URL: {0}")]
    InvalidDataUrl(String),

    /// Media/blob storage error
    #[error("Storage error: {0}")]
    Storage(String),
}

impl Error {
    /// Whether this is the user-actionable "storage full" condition.
    pub const fn is_quota_exceeded(&self) -> bool {
        matches!(self, Self::QuotaExceeded { .. })
    }
}
