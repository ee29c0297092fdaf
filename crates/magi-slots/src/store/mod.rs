//! Lease storage using SQLite
//!
//! The lease table is the only state shared between processes.

mod migrations;
mod queries;


use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::time::Duration;

use crate::error::{Result, SlotError};

/// How long a connection waits for the write lock before failing as busy.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-based lease store
#[derive(Debug, Clone)]
pub struct SlotStore {
    pub(super) pool: Pool<Sqlite>,
}

impl SlotStore {
    /// Open (or create) the database at `path`
    pub async fn from_path(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                SlotError::InvalidConfig(format!("Failed to create directory: {}", e))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        Self::from_pool(pool).await
    }

    /// Use an existing pool; the schema is created if missing
    pub async fn from_pool(pool: Pool<Sqlite>) -> Result<Self> {
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Underlying pool
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}
