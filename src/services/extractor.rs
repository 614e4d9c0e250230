//! Archive extraction service
//!
//! Expands downloaded RAR sets with the external `unrar` tool into a sibling
//! `_unrar` directory and harvests the media files it produced. Extraction
//! never fails the run: any problem is logged and the archive yields nothing.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::ExtractError;

/// Directory created next to each archive for its contents
pub const EXTRACT_DIR_NAME: &str = "_unrar";

/// Extensions harvested from the extraction directory
const EXTRACTED_MEDIA_EXTENSIONS: &[&str] = &["mkv"];

/// True for the volume that starts a RAR set: `name.part1.rar` (any zero
/// padding) or a plain `name.rar` with no `.part` token.
pub fn is_first_volume(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    let lower = name.to_lowercase();
    let Some(stem) = lower.strip_suffix(".rar") else {
        return false;
    };
    match stem.rfind(".part") {
        Some(idx) => {
            let number = &stem[idx + ".part".len()..];
            !number.is_empty()
                && number.chars().all(|c| c.is_ascii_digit())
                && number.parse::<u32>() == Ok(1)
        }
        None => !lower.contains(".part"),
    }
}

#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    /// unrar executable
    pub program: String,
    /// Ceiling on a single extraction
    pub timeout: Duration,
    /// Pause after unrar exits before reading its output
    pub settle_delay: Duration,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            program: "unrar".to_string(),
            timeout: Duration::from_secs(6 * 3600),
            settle_delay: Duration::from_secs(2),
        }
    }
}

/// Archive extraction service
pub struct ArchiveExtractor {
    config: ExtractorConfig,
}

impl ArchiveExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    /// Extraction directory for an archive
    pub fn output_dir(archive: &Path) -> PathBuf {
        archive
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(EXTRACT_DIR_NAME)
    }

    /// Expand one archive, returning the media files found afterwards.
    /// Failures are logged and yield an empty list.
    pub async fn expand(&self, archive: &Path) -> Vec<PathBuf> {
        match self.try_expand(archive).await {
            Ok(files) => files,
            Err(e) => {
                warn!(archive = %archive.display(), error = %e, "Unrar failed");
                Vec::new()
            }
        }
    }

    /// Expand a queue of archives in order
    pub async fn expand_all(&self, archives: &[PathBuf]) -> Vec<PathBuf> {
        let mut harvested = Vec::new();
        for archive in archives {
            harvested.extend(self.expand(archive).await);
        }
        harvested
    }

    async fn try_expand(&self, archive: &Path) -> Result<Vec<PathBuf>, ExtractError> {
        let output_dir = Self::output_dir(archive);
        tokio::fs::create_dir_all(&output_dir).await?;

        info!(
            archive = %archive.display(),
            destination = %output_dir.display(),
            "Unraring"
        );

        // unrar reads a destination without a trailing separator as a file mask
        let mut destination = output_dir.clone().into_os_string();
        destination.push(std::path::MAIN_SEPARATOR_STR);

        let child = Command::new(&self.config.program)
            .arg("x") // Extract with full paths
            .arg("-o-") // Never overwrite, never ask
            .arg(archive)
            .arg(&destination)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ExtractError::Spawn {
                program: self.config.program.clone(),
                source,
            })?;

        let output = tokio::time::timeout(self.config.timeout, child.wait_with_output())
            .await
            .map_err(|_| ExtractError::TimedOut(self.config.timeout))??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!(archive = %archive.display(), stderr = %stderr.trim(), "unrar stderr");
            return Err(ExtractError::ExitStatus {
                archive: archive.to_path_buf(),
                status: output.status,
            });
        }

        info!(archive = %archive.display(), "Unrared");
        tokio::time::sleep(self.config.settle_delay).await;

        Ok(find_media(&output_dir))
    }
}

/// Media files under an extraction directory, sorted for stable processing order
pub fn find_media(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| EXTRACTED_MEDIA_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
                .unwrap_or(false)
        })
        .map(|e| e.into_path())
        .collect();
    files.sort();
    files
}

/// First-volume archives below `path`, skipping our own extraction directories
pub fn find_archives(path: &Path) -> Vec<PathBuf> {
    if path.is_file() {
        return if is_first_volume(path) {
            vec![path.to_path_buf()]
        } else {
            Vec::new()
        };
    }

    let mut archives: Vec<PathBuf> = WalkDir::new(path)
        .into_iter()
        .filter_entry(|e| e.file_name() != EXTRACT_DIR_NAME)
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_first_volume(e.path()))
        .map(|e| e.into_path())
        .collect();
    archives.sort();
    archives
}
