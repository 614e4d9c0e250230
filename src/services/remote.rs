//! Remote file-tree capability
//!
//! The sync pipeline only needs four things from a remote host: list a
//! directory, check that a path still exists, open a file for reading, and a
//! connect/disconnect lifecycle around a run. [RemoteClient] is that seam.
//!
//! [LocalMirrorClient] serves a remote tree that is reachable through the local
//! filesystem (sshfs, NFS or SMB mounts) and is what the binary uses.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::io::AsyncRead;
use tracing::{debug, info, warn};

/// One entry of a remote directory listing
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteEntry {
    pub name: String,
    pub is_directory: bool,
    pub length: i64,
    pub last_write_time: DateTime<Utc>,
}

pub type RemoteReader = Box<dyn AsyncRead + Send + Unpin>;

/// Abstract remote client. Paths are remote-style, `/` separated.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    async fn connect(&self) -> Result<()>;

    async fn disconnect(&self) -> Result<()>;

    /// List the direct children of `path`. Order is unspecified.
    async fn list_directory(&self, path: &str) -> Result<Vec<RemoteEntry>>;

    async fn exists(&self, path: &str) -> Result<bool>;

    async fn open_read(&self, path: &str) -> Result<RemoteReader>;

    /// Human readable description for logs
    fn describe(&self) -> String;
}

/// Remote tree exposed through a local mount point.
///
/// Remote path `/a/b.mkv` maps to `<mount>/a/b.mkv`.
pub struct LocalMirrorClient {
    mount: PathBuf,
    connected: AtomicBool,
}

impl LocalMirrorClient {
    pub fn new(mount: impl Into<PathBuf>) -> Self {
        Self {
            mount: mount.into(),
            connected: AtomicBool::new(false),
        }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let mut resolved = self.mount.clone();
        for segment in path.split('/').filter(|s| !s.is_empty() && *s != ".") {
            resolved.push(segment);
        }
        resolved
    }

    fn ensure_connected(&self) -> Result<()> {
        if !self.connected.load(Ordering::Acquire) {
            anyhow::bail!("Remote {} is not connected", self.mount.display());
        }
        Ok(())
    }
}

/// Build a listing entry. An entry that cannot be stat'ed (removed
/// mid-listing, permissions) is logged and left out.
fn listing_entry(path: &Path, metadata: io::Result<std::fs::Metadata>) -> Option<RemoteEntry> {
    let metadata = match metadata {
        Ok(metadata) => metadata,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to stat entry, skipping");
            return None;
        }
    };
    Some(RemoteEntry {
        name: path.file_name()?.to_string_lossy().to_string(),
        is_directory: metadata.is_dir(),
        length: metadata.len() as i64,
        last_write_time: metadata.modified().map(DateTime::<Utc>::from).unwrap_or_default(),
    })
}

#[async_trait]
impl RemoteClient for LocalMirrorClient {
    async fn connect(&self) -> Result<()> {
        let metadata = tokio::fs::metadata(&self.mount)
            .await
            .with_context(|| format!("Remote mount {} is not reachable", self.mount.display()))?;
        if !metadata.is_dir() {
            anyhow::bail!("Remote mount {} is not a directory", self.mount.display());
        }
        self.connected.store(true, Ordering::Release);
        info!(mount = %self.mount.display(), "Connected to remote mount");
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.connected.store(false, Ordering::Release);
        debug!(mount = %self.mount.display(), "Disconnected from remote mount");
        Ok(())
    }

    async fn list_directory(&self, path: &str) -> Result<Vec<RemoteEntry>> {
        self.ensure_connected()?;
        let dir = self.resolve(path);
        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .with_context(|| format!("Failed to list {}", dir.display()))?;

        let mut listing = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await;
            listing.extend(listing_entry(&entry.path(), metadata));
        }
        Ok(listing)
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        self.ensure_connected()?;
        Ok(tokio::fs::try_exists(self.resolve(path)).await?)
    }

    async fn open_read(&self, path: &str) -> Result<RemoteReader> {
        self.ensure_connected()?;
        let resolved = self.resolve(path);
        let file = tokio::fs::File::open(&resolved)
            .await
            .with_context(|| format!("Failed to open {}", resolved.display()))?;
        Ok(Box::new(file))
    }

    fn describe(&self) -> String {
        format!("mount {}", self.mount.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_requires_connect() {
        let dir = tempfile::tempdir().unwrap();
        let client = LocalMirrorClient::new(dir.path());
        assert!(client.list_directory("/").await.is_err());
        client.connect().await.unwrap();
        assert!(client.list_directory("/").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_connect_fails_for_missing_mount() {
        let client = LocalMirrorClient::new("/definitely/not/here/librarian-sync");
        assert!(client.connect().await.is_err());
    }

    #[test]
    fn test_unreadable_entry_is_left_out() {
        let dir = tempfile::tempdir().unwrap();
        let kept = dir.path().join("kept.mkv");
        std::fs::write(&kept, b"ok").unwrap();

        let gone = listing_entry(
            &dir.path().join("gone.mkv"),
            Err(io::Error::new(io::ErrorKind::NotFound, "removed")),
        );
        assert!(gone.is_none());

        let entry = listing_entry(&kept, std::fs::metadata(&kept)).unwrap();
        assert_eq!(entry.name, "kept.mkv");
        assert_eq!(entry.length, 2);
    }

    #[tokio::test]
    async fn test_list_exists_and_read() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("shows")).unwrap();
        std::fs::write(dir.path().join("shows/ep.mkv"), b"episode").unwrap();

        let client = LocalMirrorClient::new(dir.path());
        client.connect().await.unwrap();

        let listing = client.list_directory("/shows").await.unwrap();
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].name, "ep.mkv");
        assert_eq!(listing[0].length, 7);
        assert!(!listing[0].is_directory);

        assert!(client.exists("/shows/ep.mkv").await.unwrap());
        assert!(!client.exists("/shows/gone.mkv").await.unwrap());

        let mut reader = client.open_read("//shows//ep.mkv").await.unwrap();
        let mut buf = String::new();
        reader.read_to_string(&mut buf).await.unwrap();
        assert_eq!(buf, "episode");
    }
}
