//! Catalog service: the persisted ledger of remote files.
//!
//! All mutations go through one async mutex so the scanner and the download
//! orchestrator can share a catalog without interleaving writes. Each write is
//! committed before the call returns.

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::db::{CreateSyncFile, Database, SyncFileRecord};

/// What a scan observation did to the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    New,
    Changed,
    Unchanged,
    /// Path already belongs to a different remote root; ignored
    Shadowed,
}

#[derive(Clone)]
pub struct Catalog {
    db: Database,
    write_lock: Arc<Mutex<()>>,
}

impl Catalog {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Record that `remote_path` was seen under `remote_root` with the given size and mtime.
    ///
    /// Inserts unseen paths, resets changed ones to pending and leaves
    /// identical ones untouched (no write is issued). A path is owned by the
    /// root that first recorded it; the same relative path under another root
    /// is reported as [Observation::Shadowed] and not written.
    pub async fn observe(
        &self,
        remote_root: &str,
        remote_path: &str,
        length: i64,
        remote_modified_at: DateTime<Utc>,
    ) -> Result<Observation> {
        let _guard = self.write_lock.lock().await;
        let repo = self.db.sync_files();

        match repo.get_by_remote_path(remote_path).await? {
            None => {
                repo.create(CreateSyncFile {
                    remote_root: remote_root.to_string(),
                    remote_path: remote_path.to_string(),
                    length,
                    remote_modified_at,
                })
                .await?;
                Ok(Observation::New)
            }
            Some(existing) if existing.remote_root != remote_root => {
                warn!(
                    remote_path = %remote_path,
                    owner = %existing.remote_root,
                    ignored = %remote_root,
                    "Same relative path exists under two remote roots, keeping the first"
                );
                Ok(Observation::Shadowed)
            }
            Some(existing)
                if existing.length == length && existing.remote_modified_at == remote_modified_at =>
            {
                Ok(Observation::Unchanged)
            }
            Some(existing) => {
                debug!(
                    remote_path = %remote_path,
                    old_length = existing.length,
                    new_length = length,
                    "Remote file changed"
                );
                repo.update_observed(existing.id, remote_root, length, remote_modified_at)
                    .await?;
                Ok(Observation::Changed)
            }
        }
    }

    /// Pending records, oldest discovery first
    pub async fn pending(&self) -> Result<Vec<SyncFileRecord>> {
        self.db.sync_files().list_pending().await
    }

    /// Mark a record satisfied. Durable once this returns.
    pub async fn mark_downloaded(&self, record: &SyncFileRecord) -> Result<DateTime<Utc>> {
        let _guard = self.write_lock.lock().await;
        let now = Utc::now();
        self.db.sync_files().mark_downloaded(record.id, now).await?;
        Ok(now)
    }

    pub async fn get(&self, remote_path: &str) -> Result<Option<SyncFileRecord>> {
        self.db.sync_files().get_by_remote_path(remote_path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    async fn catalog() -> Catalog {
        Catalog::new(Database::connect("sqlite::memory:").await.unwrap())
    }

    #[tokio::test]
    async fn test_same_path_under_second_root_is_shadowed() {
        let catalog = catalog().await;
        let mtime = Utc.with_ymd_and_hms(2023, 5, 1, 12, 0, 0).unwrap();
        let other = mtime + chrono::Duration::hours(1);

        catalog.observe("/one", "/a.mkv", 100, mtime).await.unwrap();
        let record = catalog.get("/a.mkv").await.unwrap().unwrap();
        catalog.mark_downloaded(&record).await.unwrap();

        // Alternating roots every scan must not flip the record back to pending
        for _ in 0..2 {
            assert_eq!(
                catalog.observe("/one", "/a.mkv", 100, mtime).await.unwrap(),
                Observation::Unchanged
            );
            assert_eq!(
                catalog.observe("/two", "/a.mkv", 250, other).await.unwrap(),
                Observation::Shadowed
            );
        }

        let record = catalog.get("/a.mkv").await.unwrap().unwrap();
        assert_eq!(record.remote_root, "/one");
        assert_eq!(record.length, 100);
        assert!(catalog.pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_observe_new_unchanged_changed() {
        let catalog = catalog().await;
        let mtime = Utc.with_ymd_and_hms(2023, 5, 1, 12, 0, 0).unwrap();

        assert_eq!(
            catalog.observe("/srv", "/a.mkv", 100, mtime).await.unwrap(),
            Observation::New
        );
        assert_eq!(
            catalog.observe("/srv", "/a.mkv", 100, mtime).await.unwrap(),
            Observation::Unchanged
        );

        let record = catalog.get("/a.mkv").await.unwrap().unwrap();
        catalog.mark_downloaded(&record).await.unwrap();
        assert!(catalog.pending().await.unwrap().is_empty());

        // Same size, newer mtime: back to pending
        let later = mtime + chrono::Duration::seconds(5);
        assert_eq!(
            catalog.observe("/srv", "/a.mkv", 100, later).await.unwrap(),
            Observation::Changed
        );
        let record = catalog.get("/a.mkv").await.unwrap().unwrap();
        assert!(record.downloaded_at.is_none());
        assert_eq!(record.remote_modified_at, later);
    }

    #[tokio::test]
    async fn test_unchanged_observation_keeps_downloaded_at() {
        let catalog = catalog().await;
        let mtime = Utc.with_ymd_and_hms(2023, 5, 1, 12, 0, 0).unwrap();
        catalog.observe("/srv", "/b.mkv", 7, mtime).await.unwrap();
        let record = catalog.get("/b.mkv").await.unwrap().unwrap();
        let at = catalog.mark_downloaded(&record).await.unwrap();

        catalog.observe("/srv", "/b.mkv", 7, mtime).await.unwrap();
        let record = catalog.get("/b.mkv").await.unwrap().unwrap();
        assert_eq!(record.downloaded_at, Some(at));
    }

    #[tokio::test]
    async fn test_size_change_resets_pending() {
        let catalog = catalog().await;
        let mtime = Utc.with_ymd_and_hms(2023, 5, 1, 12, 0, 0).unwrap();
        catalog.observe("/srv", "/c.mkv", 7, mtime).await.unwrap();
        let record = catalog.get("/c.mkv").await.unwrap().unwrap();
        catalog.mark_downloaded(&record).await.unwrap();

        assert_eq!(
            catalog.observe("/srv", "/c.mkv", 8, mtime).await.unwrap(),
            Observation::Changed
        );
        assert_eq!(catalog.pending().await.unwrap().len(), 1);
    }
}
