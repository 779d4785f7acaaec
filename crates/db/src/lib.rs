//! The embedded relational store (§4.1): schema migrations, session/message/
//! observation persistence, the sync ledger, and full-text search.

mod error;
mod migrations;
pub mod messages;
pub mod observations;
pub mod search;
pub mod sessions;
pub mod sync;

pub use error::{StoreError, StoreResult};
pub use messages::{get_messages, upsert_messages};
pub use observations::{
    get_observations, next_sequence_number, update_observation_parents, upsert_observations,
};
pub use search::{search_messages, search_observations};
pub use sessions::{get_session_by_id, get_session_by_source_external_id, upsert_session};
pub use sync::{get_pending_sync, mark_synced};

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{ConnectOptions, SqlitePool};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;

/// Handle to the local SQLite store. Cheap to clone — wraps a connection
/// pool, shared across every ingestion and sync component.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
    db_path: PathBuf,
}

impl Database {
    /// Open (or create) the database at `path` and run migrations.
    pub async fn new(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(std::time::Duration::from_secs(30))
            .log_slow_statements(
                tracing::log::LevelFilter::Warn,
                std::time::Duration::from_secs(5),
            );

        let pool = SqlitePoolOptions::new().max_connections(4).connect_with(options).await?;

        let db = Self { pool, db_path: path.to_owned() };
        db.run_migrations().await?;

        info!("database opened at {}", path.display());
        Ok(db)
    }

    /// In-memory database for tests. `shared_cache(true)` so every
    /// connection in the pool sees the same database.
    pub async fn new_in_memory() -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?
            .shared_cache(true)
            .foreign_keys(true)
            .busy_timeout(std::time::Duration::from_secs(5));
        let pool = SqlitePoolOptions::new().max_connections(4).connect_with(options).await?;
        let db = Self { pool, db_path: PathBuf::new() };
        db.run_migrations().await?;
        Ok(db)
    }

    /// Open the database at its default location (`ses_core::paths::db_path`).
    pub async fn open_default() -> StoreResult<Self> {
        let path = ses_core::paths::db_path().ok_or(StoreError::NoStateDir)?;
        Self::new(&path).await
    }

    /// Run any migrations not yet recorded in `_migrations`.
    async fn run_migrations(&self) -> StoreResult<()> {
        sqlx::query("CREATE TABLE IF NOT EXISTS _migrations (version INTEGER PRIMARY KEY)")
            .execute(&self.pool)
            .await?;

        let row: (i64,) = sqlx::query_as("SELECT COALESCE(MAX(version), 0) FROM _migrations")
            .fetch_one(&self.pool)
            .await?;
        let current_version = row.0 as usize;

        for (i, migration) in migrations::MIGRATIONS.iter().enumerate() {
            let version = i + 1;
            if version > current_version {
                let is_multi_statement = migration.contains("BEGIN");
                let result = if is_multi_statement {
                    sqlx::raw_sql(migration).execute(&self.pool).await.map(|_| ())
                } else {
                    sqlx::query(migration).execute(&self.pool).await.map(|_| ())
                };
                match result {
                    Ok(_) => {}
                    Err(e) if e.to_string().contains("duplicate column name") => {}
                    Err(e) => return Err(e.into()),
                }
                sqlx::query("INSERT INTO _migrations (version) VALUES (?)")
                    .bind(version as i64)
                    .execute(&self.pool)
                    .await?;
            }
        }

        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}
