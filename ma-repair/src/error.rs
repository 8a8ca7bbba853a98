//! Repair job errors

use thiserror::Error;

/// Failure while repairing one record (or selecting the batch)
#[derive(Error, Debug)]
pub enum RepairError {
    /// Stored mapping cannot be merged into
    #[error("Malformed record {id}: {reason}")]
    MalformedRecord { id: i64, reason: String },

    /// Another writer changed the record after it was selected
    #[error("Record {id} changed since selection")]
    Conflict { id: i64 },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, RepairError>;
