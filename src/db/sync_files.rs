//! Sync file database operations
//!
//! One row per distinct remote file. Rows are never deleted: a non-null
//! `downloaded_at` means the file is satisfied, null means it is pending
//! (first download or re-download after a remote change).

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::db::sqlite_helpers::{datetime_to_str, now_iso8601};

/// A sync file record in the database
#[derive(Debug, Clone, PartialEq)]
pub struct SyncFileRecord {
    pub id: i64,
    /// Remote root the file was last seen under
    pub remote_root: String,
    /// Path relative to `remote_root`, always starting with `/`
    pub remote_path: String,
    pub length: i64,
    pub remote_modified_at: DateTime<Utc>,
    pub discovered_at: DateTime<Utc>,
    pub downloaded_at: Option<DateTime<Utc>>,
}

impl SyncFileRecord {
    /// Full remote path (`remote_root` + `remote_path`)
    pub fn full_remote_path(&self) -> String {
        format!(
            "{}{}",
            self.remote_root.trim_end_matches('/'),
            self.remote_path
        )
    }

    pub fn is_downloaded(&self) -> bool {
        self.downloaded_at.is_some()
    }
}

impl sqlx::FromRow<'_, sqlx::sqlite::SqliteRow> for SyncFileRecord {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> sqlx::Result<Self> {
        use crate::db::sqlite_helpers::{str_to_datetime, str_to_datetime_opt};
        use sqlx::Row;

        let remote_modified_str: String = row.try_get("remote_modified_at")?;
        let discovered_str: String = row.try_get("discovered_at")?;
        let downloaded_str: Option<String> = row.try_get("downloaded_at")?;

        Ok(Self {
            id: row.try_get("id")?,
            remote_root: row.try_get("remote_root")?,
            remote_path: row.try_get("remote_path")?,
            length: row.try_get("length")?,
            remote_modified_at: str_to_datetime(&remote_modified_str)
                .map_err(|e| sqlx::Error::Decode(e.into()))?,
            discovered_at: str_to_datetime(&discovered_str)
                .map_err(|e| sqlx::Error::Decode(e.into()))?,
            downloaded_at: str_to_datetime_opt(downloaded_str.as_deref())
                .map_err(|e| sqlx::Error::Decode(e.into()))?,
        })
    }
}

/// Input for creating a new sync file record
#[derive(Debug, Clone)]
pub struct CreateSyncFile {
    pub remote_root: String,
    pub remote_path: String,
    pub length: i64,
    pub remote_modified_at: DateTime<Utc>,
}

/// Sync file repository for database operations
pub struct SyncFileRepository {
    pool: SqlitePool,
}

impl SyncFileRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new, pending record
    pub async fn create(&self, input: CreateSyncFile) -> Result<SyncFileRecord> {
        let record = sqlx::query_as::<_, SyncFileRecord>(
            r#"
            INSERT INTO sync_files (remote_root, remote_path, length, remote_modified_at, discovered_at, downloaded_at)
            VALUES (?, ?, ?, ?, ?, NULL)
            RETURNING *
            "#,
        )
        .bind(&input.remote_root)
        .bind(&input.remote_path)
        .bind(input.length)
        .bind(datetime_to_str(input.remote_modified_at))
        .bind(now_iso8601())
        .fetch_one(&self.pool)
        .await?;

        Ok(record)
    }

    /// Get a record by its remote path (the unique key)
    pub async fn get_by_remote_path(&self, remote_path: &str) -> Result<Option<SyncFileRecord>> {
        let record =
            sqlx::query_as::<_, SyncFileRecord>("SELECT * FROM sync_files WHERE remote_path = ?")
                .bind(remote_path)
                .fetch_optional(&self.pool)
                .await?;

        Ok(record)
    }

    /// Record a changed remote observation and reset the record to pending
    pub async fn update_observed(
        &self,
        id: i64,
        remote_root: &str,
        length: i64,
        remote_modified_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE sync_files
            SET remote_root = ?, length = ?, remote_modified_at = ?, downloaded_at = NULL
            WHERE id = ?
            "#,
        )
        .bind(remote_root)
        .bind(length)
        .bind(datetime_to_str(remote_modified_at))
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Mark a record as satisfied
    pub async fn mark_downloaded(&self, id: i64, at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE sync_files SET downloaded_at = ? WHERE id = ?")
            .bind(datetime_to_str(at))
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// All pending records, oldest discovery first
    pub async fn list_pending(&self) -> Result<Vec<SyncFileRecord>> {
        let records = sqlx::query_as::<_, SyncFileRecord>(
            r#"
            SELECT * FROM sync_files
            WHERE downloaded_at IS NULL
            ORDER BY discovered_at ASC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    pub async fn count(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM sync_files")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
