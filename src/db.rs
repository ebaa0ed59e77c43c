//! SQLite connection management for archive files.
//!
//! Archives are opened read-only for serving: the file must already exist
//! and is never modified. The packer opens its output with a writable
//! connection that creates the file.
//!
//! # Connection Pool
//!
//! Uses `sqlx::SqlitePool`. Each search call checks out one pooled
//! connection for its whole lifetime and returns it on drop, so the pool
//! size bounds how many searches touch the file at once.

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;

/// Opens an existing archive read-only.
///
/// Fails if the file does not exist or is not a SQLite database.
pub async fn connect_read_only(path: &Path, max_connections: u32) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .read_only(true)
        .create_if_missing(false);

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// Opens (creating if needed) an archive file for writing.
///
/// Uses the rollback journal so a finished archive is a single file.
pub async fn connect_for_write(path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Delete);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    Ok(pool)
}
