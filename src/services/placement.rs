//! File placement
//!
//! Puts a source file at its library destination by move or copy, resolving
//! collisions by size:
//! - same size at the destination: the file is already there (a move deletes
//!   the source, a copy does nothing)
//! - different size: the destination is replaced
//! - source already is the destination: left alone
//!
//! Files whose path contains `Sample` are never placed.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info};

/// Paths containing this marker are release samples
pub const SAMPLE_MARKER: &str = "Sample";

pub fn is_sample(path: &Path) -> bool {
    path.to_string_lossy().contains(SAMPLE_MARKER)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementMode {
    Move,
    Copy,
}

impl PlacementMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlacementMode::Move => "move",
            PlacementMode::Copy => "copy",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementAction {
    Move,
    Copy,
    /// Destination already holds the same file; the source is removed
    DeleteSourceSkip,
    /// Destination already holds the same file; nothing to do
    IgnoreDuplicate,
    /// Destination differs; it is removed and the source transferred
    OverwriteDestinationThenTransfer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacementDecision {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub action: PlacementAction,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlacementOutcome {
    SkippedSample,
    Placed(PlacementDecision),
}

/// Decide what to do with `source` given what exists at `destination`
pub async fn decide(
    source: &Path,
    destination: &Path,
    mode: PlacementMode,
) -> Result<PlacementDecision> {
    let action = match tokio::fs::metadata(destination).await {
        Ok(_) if same_file(source, destination).await? => PlacementAction::IgnoreDuplicate,
        Ok(existing) => {
            let incoming = tokio::fs::metadata(source)
                .await
                .with_context(|| format!("Failed to stat {}", source.display()))?;
            match (existing.len() == incoming.len(), mode) {
                (true, PlacementMode::Move) => PlacementAction::DeleteSourceSkip,
                (true, PlacementMode::Copy) => PlacementAction::IgnoreDuplicate,
                (false, _) => PlacementAction::OverwriteDestinationThenTransfer,
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => match mode {
            PlacementMode::Move => PlacementAction::Move,
            PlacementMode::Copy => PlacementAction::Copy,
        },
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to stat {}", destination.display()));
        }
    };

    Ok(PlacementDecision {
        source: source.to_path_buf(),
        destination: destination.to_path_buf(),
        action,
    })
}

/// Whether both paths resolve to the same file on disk
async fn same_file(source: &Path, destination: &Path) -> Result<bool> {
    let source = tokio::fs::canonicalize(source)
        .await
        .with_context(|| format!("Failed to resolve {}", source.display()))?;
    let destination = tokio::fs::canonicalize(destination)
        .await
        .with_context(|| format!("Failed to resolve {}", destination.display()))?;
    Ok(source == destination)
}

/// Place `source` at `library_root/relative`
pub async fn place(
    source: &Path,
    relative: &Path,
    library_root: &Path,
    mode: PlacementMode,
) -> Result<PlacementOutcome> {
    if is_sample(source) {
        debug!(source = %source.display(), "Skipping sample");
        return Ok(PlacementOutcome::SkippedSample);
    }

    let destination = library_root.join(relative);
    if let Some(parent) = destination.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let decision = decide(source, &destination, mode).await?;
    execute(&decision, mode).await?;
    Ok(PlacementOutcome::Placed(decision))
}

async fn execute(decision: &PlacementDecision, mode: PlacementMode) -> Result<()> {
    let source = decision.source.as_path();
    let destination = decision.destination.as_path();

    match decision.action {
        PlacementAction::DeleteSourceSkip => {
            info!(
                source = %source.display(),
                destination = %destination.display(),
                "Existing file with same name and size found, deleting source"
            );
            tokio::fs::remove_file(source)
                .await
                .with_context(|| format!("Failed to delete {}", source.display()))?;
        }
        PlacementAction::IgnoreDuplicate => {
            info!(
                source = %source.display(),
                destination = %destination.display(),
                "Existing file with same name and size found, ignoring"
            );
        }
        PlacementAction::OverwriteDestinationThenTransfer => {
            info!(
                destination = %destination.display(),
                "Existing file with same name but different size found, replacing"
            );
            tokio::fs::remove_file(destination)
                .await
                .with_context(|| format!("Failed to delete {}", destination.display()))?;
            transfer(source, destination, mode).await?;
        }
        PlacementAction::Move | PlacementAction::Copy => {
            transfer(source, destination, mode).await?;
        }
    }
    Ok(())
}

async fn transfer(source: &Path, destination: &Path, mode: PlacementMode) -> Result<()> {
    info!(
        action = mode.as_str(),
        source = %source.display(),
        destination = %destination.display(),
        "Placing file"
    );
    match mode {
        PlacementMode::Move => {
            // Rename fails across filesystems; fall back to copy then delete
            if let Err(e) = tokio::fs::rename(source, destination).await {
                debug!(error = %e, "Rename failed, copying instead");
                tokio::fs::copy(source, destination)
                    .await
                    .with_context(|| format!("Failed to copy {}", source.display()))?;
                tokio::fs::remove_file(source)
                    .await
                    .with_context(|| format!("Failed to delete {}", source.display()))?;
            }
        }
        PlacementMode::Copy => {
            tokio::fs::copy(source, destination)
                .await
                .with_context(|| format!("Failed to copy {}", source.display()))?;
        }
    }
    Ok(())
}
