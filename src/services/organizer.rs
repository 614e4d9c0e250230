//! Library organizer
//!
//! Takes a queue of local media files, classifies each one, renders its
//! destination and places it under the TV or movie root. A failure on one
//! file is logged and the queue carries on.

use std::path::{Path, PathBuf};

use tracing::{error, info};
use walkdir::WalkDir;

use super::filename_parser::MEDIA_EXTENSIONS;
use super::placement::{self, PlacementAction, PlacementMode, PlacementOutcome, is_sample};
use super::renamer::{ClassifiedFile, MediaKind, MediaRenamer, classify};

/// Library roots for the two media kinds
#[derive(Debug, Clone)]
pub struct LibraryRoots {
    pub tv: PathBuf,
    pub movies: PathBuf,
}

impl LibraryRoots {
    pub fn root_for(&self, kind: &MediaKind) -> &Path {
        if kind.is_tv() { &self.tv } else { &self.movies }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrganizeSummary {
    pub placed: usize,
    pub duplicates: usize,
    pub samples: usize,
    pub failed: usize,
}

impl OrganizeSummary {
    fn record(&mut self, action: PlacementAction) {
        match action {
            PlacementAction::DeleteSourceSkip | PlacementAction::IgnoreDuplicate => {
                self.duplicates += 1
            }
            PlacementAction::Move
            | PlacementAction::Copy
            | PlacementAction::OverwriteDestinationThenTransfer => self.placed += 1,
        }
    }
}

/// Where one file would go, without touching the filesystem
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedPlacement {
    pub file: ClassifiedFile,
    pub relative: PathBuf,
    pub destination: PathBuf,
}

pub struct MediaOrganizer {
    renamer: MediaRenamer,
    roots: LibraryRoots,
}

impl MediaOrganizer {
    pub fn new(renamer: MediaRenamer, roots: LibraryRoots) -> Self {
        Self { renamer, roots }
    }

    /// Classify and render one file
    pub async fn plan(&self, path: &Path) -> PlannedPlacement {
        let file = classify(path);
        let relative = self.renamer.destination(&file).await;
        let destination = self.roots.root_for(&file.kind).join(&relative);
        PlannedPlacement {
            file,
            relative,
            destination,
        }
    }

    /// Place every file in the queue
    pub async fn organize(&self, files: &[PathBuf], mode: PlacementMode) -> OrganizeSummary {
        let mut summary = OrganizeSummary::default();

        for path in files {
            if is_sample(path) {
                info!(source = %path.display(), "Skipping sample");
                summary.samples += 1;
                continue;
            }

            let planned = self.plan(path).await;
            let root = self.roots.root_for(&planned.file.kind);
            info!(
                source = %path.display(),
                kind = if planned.file.kind.is_tv() { "tv" } else { "movie" },
                destination = %planned.destination.display(),
                "Organizing file"
            );

            match placement::place(path, &planned.relative, root, mode).await {
                Ok(PlacementOutcome::Placed(decision)) => summary.record(decision.action),
                Ok(PlacementOutcome::SkippedSample) => summary.samples += 1,
                Err(e) => {
                    error!(source = %path.display(), error = %format!("{:#}", e), "Failed to place file");
                    summary.failed += 1;
                }
            }
        }

        info!(
            placed = summary.placed,
            duplicates = summary.duplicates,
            samples = summary.samples,
            failed = summary.failed,
            "Organize pass finished"
        );
        summary
    }
}

fn has_media_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| MEDIA_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Media files at `path`: the file itself, or every media file below a
/// directory in sorted order
pub fn collect_media(path: &Path) -> Vec<PathBuf> {
    if path.is_file() {
        return if has_media_extension(path) {
            vec![path.to_path_buf()]
        } else {
            Vec::new()
        };
    }

    let mut files: Vec<PathBuf> = WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && has_media_extension(e.path()))
        .map(|e| e.into_path())
        .collect();
    files.sort();
    files
}
