//! Error types for ma-tracker
//!
//! These never reach the host page: callers log them and fall back to the
//! documented degraded behavior.

use thiserror::Error;

/// Key/value storage failures (blocked cookies, unwritable profile, ...)
#[derive(Error, Debug)]
pub enum StorageError {
    /// Storage is disabled or blocked
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// Backing file I/O failure
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Backing file (de)serialization failure
    #[error("Storage JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Delivery failures
#[derive(Error, Debug)]
pub enum TransportError {
    /// Network-level failure from the HTTP client
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Collection endpoint answered with a non-success status
    #[error("Collection endpoint returned status {0}")]
    Status(u16),

    /// Unload-safe primitive refused to queue the payload
    #[error("Beacon rejected payload")]
    Rejected,
}
