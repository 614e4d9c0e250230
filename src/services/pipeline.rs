//! End-to-end sync run
//!
//! connect → scan every root → download pending files → disconnect → expand
//! archives → organize media into the library.
//!
//! Only the remote connection and the catalog itself can fail a run. Every
//! per-file problem is logged and counted in the [RunSummary].

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use super::downloader::{DownloadOrchestrator, DownloadOutcome};
use super::extractor::{ArchiveExtractor, find_archives};
use super::organizer::{MediaOrganizer, OrganizeSummary, collect_media};
use super::placement::PlacementMode;
use super::remote::RemoteClient;
use super::scanner::{ScanSummary, TreeScanner};

/// Totals for one run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub scan: ScanSummary,
    pub downloads: DownloadOutcome,
    pub extracted: usize,
    pub organized: OrganizeSummary,
}

pub struct SyncPipeline {
    remote: Arc<dyn RemoteClient>,
    scanner: TreeScanner,
    downloader: DownloadOrchestrator,
    extractor: ArchiveExtractor,
    organizer: MediaOrganizer,
    remote_roots: Vec<String>,
}

impl SyncPipeline {
    pub fn new(
        remote: Arc<dyn RemoteClient>,
        scanner: TreeScanner,
        downloader: DownloadOrchestrator,
        extractor: ArchiveExtractor,
        organizer: MediaOrganizer,
        remote_roots: Vec<String>,
    ) -> Self {
        Self {
            remote,
            scanner,
            downloader,
            extractor,
            organizer,
            remote_roots,
        }
    }

    /// Full sync: mirror new remote files, then file them into the library
    pub async fn run(&self) -> Result<RunSummary> {
        let mut summary = RunSummary::default();

        self.remote
            .connect()
            .await
            .with_context(|| format!("Failed to connect to {}", self.remote.describe()))?;

        summary.scan = self.scanner.scan_roots(&self.remote_roots).await;
        info!(found = summary.scan.found(), "Found new/changed files");

        let downloads = self.downloader.run().await;
        if let Err(e) = self.remote.disconnect().await {
            warn!(error = %e, "Failed to disconnect from remote");
        }
        summary.downloads = downloads?;

        let mut media = summary.downloads.media.clone();
        let extracted = self.extractor.expand_all(&summary.downloads.archives).await;
        summary.extracted = extracted.len();
        media.extend(extracted);

        summary.organized = self.organizer.organize(&media, PlacementMode::Move).await;

        info!(
            found = summary.scan.found(),
            downloaded = summary.downloads.downloaded,
            download_failures = summary.downloads.failed,
            extracted = summary.extracted,
            placed = summary.organized.placed,
            "Sync run finished"
        );
        Ok(summary)
    }
}

/// Organize the media at `path` with the given mode
pub async fn process_local(
    extractor: &ArchiveExtractor,
    organizer: &MediaOrganizer,
    path: &Path,
    mode: PlacementMode,
) -> OrganizeSummary {
    if mode == PlacementMode::Copy {
        let archives = find_archives(path);
        if !archives.is_empty() {
            info!(count = archives.len(), "Expanding archives before copy");
            extractor.expand_all(&archives).await;
        }
    }

    let files = collect_media(path);
    info!(path = %path.display(), files = files.len(), mode = mode.as_str(), "Processing local media");
    organizer.organize(&files, mode).await
}
