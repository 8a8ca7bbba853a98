//! Database access for the repair job

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use std::path::Path;

/// Connect read-write to an existing analytics database
///
/// The job never creates the database or its tables; a missing file is an
/// error rather than an empty run.
pub async fn connect(db_path: &Path) -> Result<SqlitePool> {
    if !db_path.exists() {
        anyhow::bail!("Database not found: {}", db_path.display());
    }

    // mode=rw: fail instead of creating a new file
    let db_url = format!("sqlite://{}?mode=rw", db_path.display());

    let pool = SqlitePool::connect(&db_url)
        .await
        .with_context(|| format!("Failed to connect to database {}", db_path.display()))?;

    Ok(pool)
}
