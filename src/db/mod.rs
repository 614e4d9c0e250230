//! Database connection and operations

pub mod sqlite_helpers;
pub mod sync_files;

use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use tracing::{info, warn};

pub use sync_files::{CreateSyncFile, SyncFileRecord, SyncFileRepository};

const CREATE_SYNC_FILES_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS sync_files (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    remote_root TEXT NOT NULL DEFAULT '',
    remote_path TEXT NOT NULL UNIQUE,
    length INTEGER NOT NULL,
    remote_modified_at TEXT NOT NULL,
    discovered_at TEXT NOT NULL,
    downloaded_at TEXT
)
"#;

const CREATE_PENDING_INDEX_SQL: &str = r#"
CREATE INDEX IF NOT EXISTS idx_sync_files_pending
    ON sync_files (downloaded_at, discovered_at)
"#;

/// Database wrapper providing connection pool access
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if missing) the catalog database and make sure the schema exists.
    ///
    /// Accepts a plain file path, a `sqlite:` URL, or `sqlite::memory:`.
    pub async fn connect(url: &str) -> Result<Self> {
        let in_memory = url.contains(":memory:");
        let url = if url.starts_with("sqlite:") {
            url.to_string()
        } else {
            if let Some(parent) = std::path::Path::new(url).parent()
                && !parent.as_os_str().is_empty()
            {
                tokio::fs::create_dir_all(parent).await.with_context(|| {
                    format!("Failed to create database directory {}", parent.display())
                })?;
            }
            format!("sqlite://{}", url)
        };

        let options = SqliteConnectOptions::from_str(&url)
            .with_context(|| format!("Invalid database URL {}", url))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            // FULL so a committed mark-downloaded survives power loss
            .synchronous(SqliteSynchronous::Full)
            .busy_timeout(Duration::from_secs(30));

        // Every connection to :memory: is a separate database
        let max_connections = if in_memory { 1 } else { 4 };

        let mut pool_options = SqlitePoolOptions::new().max_connections(max_connections);
        if in_memory {
            // Dropping the only connection would drop the database with it
            pool_options = pool_options.idle_timeout(None).max_lifetime(None);
        }

        let pool = pool_options
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open catalog at {}", url))?;

        let db = Self { pool };
        db.migrate().await?;
        info!(url = %url, "Catalog database ready");
        Ok(db)
    }

    /// Get a sync file repository
    pub fn sync_files(&self) -> SyncFileRepository {
        SyncFileRepository::new(self.pool.clone())
    }

    /// Create tables and indexes that do not exist yet
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(CREATE_SYNC_FILES_SQL)
            .execute(&self.pool)
            .await
            .context("Failed to create sync_files table")?;
        sqlx::query(CREATE_PENDING_INDEX_SQL)
            .execute(&self.pool)
            .await
            .context("Failed to create sync_files index")?;
        Ok(())
    }

    /// Execute raw SQL text against the catalog (diagnostics only).
    /// Returns the number of rows affected.
    pub async fn execute_raw(&self, sql: &str) -> Result<u64> {
        warn!(sql = %sql, "Executing raw SQL against catalog");
        let result = sqlx::raw_sql(sql)
            .execute(&self.pool)
            .await
            .context("Raw SQL failed")?;
        Ok(result.rows_affected())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
