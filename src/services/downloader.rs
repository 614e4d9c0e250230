//! Download orchestrator
//!
//! Drains pending catalog records, oldest discovery first. Each record is
//! handled on its own: a failure is logged, the record stays pending for the
//! next run, and the batch moves on.
//!
//! A record is only marked downloaded after its bytes are on disk, and the
//! mark is committed before the file is queued for extraction or renaming.
//! A pending record whose local copy already has the catalog length was
//! interrupted before its mark landed; it is marked and queued like a fresh
//! download.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::{debug, error, info};

use super::catalog::Catalog;
use super::extractor::is_first_volume;
use super::filename_parser::MEDIA_EXTENSIONS;
use super::remote::RemoteClient;
use super::transfer::{TransferStrategy, TransferTask};
use crate::db::SyncFileRecord;

/// What a finished download feeds into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadKind {
    /// First (or only) volume of a RAR set
    Archive,
    Media,
    Other,
}

/// Classify a downloaded file by name
pub fn classify_download(path: &Path) -> DownloadKind {
    if is_first_volume(path) {
        return DownloadKind::Archive;
    }
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());
    match ext.as_deref() {
        Some(e) if MEDIA_EXTENSIONS.contains(&e) => DownloadKind::Media,
        _ => DownloadKind::Other,
    }
}

/// Per-record result
#[derive(Debug, Clone, PartialEq)]
enum RecordOutcome {
    /// Local copy already had the catalog length
    AlreadyPresent(PathBuf, DownloadKind),
    /// Remote file was deleted after the scan
    Vanished,
    Downloaded(PathBuf, DownloadKind),
}

/// Queues and counters produced by one orchestrator run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DownloadOutcome {
    pub archives: Vec<PathBuf>,
    pub media: Vec<PathBuf>,
    pub downloaded: usize,
    pub already_present: usize,
    pub vanished: usize,
    pub failed: usize,
}

impl DownloadOutcome {
    fn enqueue(&mut self, path: PathBuf, kind: DownloadKind) {
        match kind {
            DownloadKind::Archive => {
                info!(path = %path.display(), "Added to unrar queue");
                self.archives.push(path);
            }
            DownloadKind::Media => self.media.push(path),
            DownloadKind::Other => {}
        }
    }
}

pub struct DownloadOrchestrator {
    catalog: Catalog,
    remote: Arc<dyn RemoteClient>,
    strategy: Arc<dyn TransferStrategy>,
    download_dir: PathBuf,
}

impl DownloadOrchestrator {
    pub fn new(
        catalog: Catalog,
        remote: Arc<dyn RemoteClient>,
        strategy: Arc<dyn TransferStrategy>,
        download_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            catalog,
            remote,
            strategy,
            download_dir: download_dir.into(),
        }
    }

    /// Local path for a remote relative path: separators mapped to the local
    /// ones, empty segments (doubled slashes) dropped.
    pub fn local_path_for(&self, remote_path: &str) -> PathBuf {
        let mut local = self.download_dir.clone();
        for segment in remote_path.split(['/', '\\']).filter(|s| !s.is_empty()) {
            local.push(segment);
        }
        local
    }

    fn task_for(&self, record: &SyncFileRecord) -> TransferTask {
        let local_path = self.local_path_for(&record.remote_path);
        let local_directory = local_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.download_dir.clone());
        TransferTask {
            remote_path: record.full_remote_path(),
            local_path,
            local_directory,
        }
    }

    /// Download every pending record
    pub async fn run(&self) -> Result<DownloadOutcome> {
        let pending = self
            .catalog
            .pending()
            .await
            .context("Failed to load pending catalog records")?;
        info!(
            pending = pending.len(),
            strategy = self.strategy.name(),
            "Starting downloads"
        );

        let mut outcome = DownloadOutcome::default();
        for record in pending {
            match self.process(&record).await {
                Ok(RecordOutcome::AlreadyPresent(path, kind)) => {
                    outcome.already_present += 1;
                    outcome.enqueue(path, kind);
                }
                Ok(RecordOutcome::Vanished) => outcome.vanished += 1,
                Ok(RecordOutcome::Downloaded(path, kind)) => {
                    outcome.downloaded += 1;
                    outcome.enqueue(path, kind);
                }
                Err(e) => {
                    outcome.failed += 1;
                    error!(
                        remote_path = %record.full_remote_path(),
                        error = %format!("{:#}", e),
                        "Failed to download file"
                    );
                }
            }
        }

        info!(
            downloaded = outcome.downloaded,
            already_present = outcome.already_present,
            vanished = outcome.vanished,
            failed = outcome.failed,
            archives = outcome.archives.len(),
            media = outcome.media.len(),
            "Downloads complete"
        );
        Ok(outcome)
    }

    async fn process(&self, record: &SyncFileRecord) -> Result<RecordOutcome> {
        let task = self.task_for(record);

        if let Ok(metadata) = tokio::fs::metadata(&task.local_path).await
            && metadata.is_file()
        {
            if metadata.len() as i64 == record.length {
                info!(
                    remote_path = %record.remote_path,
                    local = %task.local_path.display(),
                    "Local file has the same size, skipping"
                );
                self.catalog.mark_downloaded(record).await?;
                let kind = classify_download(&task.local_path);
                return Ok(RecordOutcome::AlreadyPresent(task.local_path, kind));
            }
            info!(
                remote_path = %record.remote_path,
                local = %task.local_path.display(),
                local_length = metadata.len(),
                remote_length = record.length,
                "Local file has a different size, replacing"
            );
            tokio::fs::remove_file(&task.local_path)
                .await
                .with_context(|| format!("Failed to remove stale {}", task.local_path.display()))?;
        }

        if !self
            .remote
            .exists(&task.remote_path)
            .await
            .with_context(|| format!("Failed to stat {}", task.remote_path))?
        {
            info!(remote_path = %task.remote_path, "Remote file no longer exists");
            self.catalog.mark_downloaded(record).await?;
            return Ok(RecordOutcome::Vanished);
        }

        tokio::fs::create_dir_all(&task.local_directory)
            .await
            .with_context(|| format!("Failed to create {}", task.local_directory.display()))?;

        info!(
            remote = %task.remote_path,
            local = %task.local_path.display(),
            "Downloading"
        );
        let started = Instant::now();
        self.strategy
            .transfer(&task)
            .await
            .with_context(|| format!("{} transfer failed", self.strategy.name()))?;
        let elapsed = started.elapsed().as_secs_f64().max(0.001);
        info!(
            local = %task.local_path.display(),
            elapsed_secs = elapsed,
            kb_per_sec = (record.length as f64 / 1024.0 / elapsed).round(),
            "Downloaded successfully"
        );

        self.catalog.mark_downloaded(record).await?;
        let kind = classify_download(&task.local_path);
        debug!(local = %task.local_path.display(), kind = ?kind, "Classified download");
        Ok(RecordOutcome::Downloaded(task.local_path, kind))
    }
}

impl std::fmt::Debug for DownloadOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadOrchestrator")
            .field("download_dir", &self.download_dir)
            .field("strategy", &self.strategy.name())
            .field("remote", &self.remote.describe())
            .finish()
    }
}
