//! Remote tree scanner
//!
//! Walks each configured remote root depth first, in name order, and records
//! every regular file in the catalog. Hidden entries (leading `.`) are skipped.
//! A listing failure only loses the affected subtree.

use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use tracing::{debug, info, warn};

use super::catalog::{Catalog, Observation};
use super::remote::RemoteClient;

/// Totals for one scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub new_files: usize,
    pub changed_files: usize,
    pub unchanged_files: usize,
    /// Paths already owned by an earlier root
    pub shadowed_files: usize,
    pub failed_directories: usize,
}

impl ScanSummary {
    /// New plus changed files
    pub fn found(&self) -> usize {
        self.new_files + self.changed_files
    }

    fn merge(&mut self, other: ScanSummary) {
        self.new_files += other.new_files;
        self.changed_files += other.changed_files;
        self.unchanged_files += other.unchanged_files;
        self.shadowed_files += other.shadowed_files;
        self.failed_directories += other.failed_directories;
    }
}

pub struct TreeScanner {
    remote: Arc<dyn RemoteClient>,
    catalog: Catalog,
}

impl TreeScanner {
    pub fn new(remote: Arc<dyn RemoteClient>, catalog: Catalog) -> Self {
        Self { remote, catalog }
    }

    /// Scan every root into the same catalog
    pub async fn scan_roots(&self, roots: &[String]) -> ScanSummary {
        let mut total = ScanSummary::default();
        for root in roots {
            info!(root = %root, remote = %self.remote.describe(), "Scanning remote root");
            let summary = self.scan(root, "").await;
            info!(
                root = %root,
                new = summary.new_files,
                changed = summary.changed_files,
                shadowed = summary.shadowed_files,
                "Remote root scanned"
            );
            total.merge(summary);
        }
        total
    }

    /// Scan `root + subdirectory` recursively. `subdirectory` is `""` for the
    /// root itself, otherwise `/a/b`.
    pub async fn scan(&self, root: &str, subdirectory: &str) -> ScanSummary {
        self.scan_directory(root.trim_end_matches('/'), subdirectory.to_string())
            .await
    }

    fn scan_directory<'a>(&'a self, root: &'a str, subdirectory: String) -> BoxFuture<'a, ScanSummary> {
        async move {
            let mut summary = ScanSummary::default();
            let listing_path = format!("{}{}", root, subdirectory);
            debug!(path = %listing_path, "Checking remote directory");

            let mut entries = match self.remote.list_directory(&listing_path).await {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(path = %listing_path, error = %e, "Failed to scan remote directory");
                    summary.failed_directories += 1;
                    return summary;
                }
            };
            entries.sort_by(|a, b| a.name.cmp(&b.name));

            for entry in entries {
                if entry.name.starts_with('.') {
                    continue;
                }
                let relative = format!("{}/{}", subdirectory, entry.name);

                if entry.is_directory {
                    let child = self.scan_directory(root, relative).await;
                    summary.merge(child);
                    continue;
                }

                match self
                    .catalog
                    .observe(root, &relative, entry.length, entry.last_write_time)
                    .await
                {
                    Ok(Observation::New) => {
                        info!(remote_path = %relative, "Found new file");
                        summary.new_files += 1;
                    }
                    Ok(Observation::Changed) => {
                        info!(remote_path = %relative, "Found modified file");
                        summary.changed_files += 1;
                    }
                    Ok(Observation::Unchanged) => summary.unchanged_files += 1,
                    Ok(Observation::Shadowed) => summary.shadowed_files += 1,
                    Err(e) => {
                        warn!(remote_path = %relative, error = %e, "Failed to record remote file");
                    }
                }
            }

            summary
        }
        .boxed()
    }
}
