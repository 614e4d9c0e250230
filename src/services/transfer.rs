//! Transfer strategies
//!
//! Exactly one strategy moves a remote file to its local path:
//! - [StreamTransfer] copies bytes through [RemoteClient::open_read]
//! - [CommandTransfer] hands the file to an external accelerated downloader
//!   (segmented `lftp pget` by default) and waits with a hard ceiling

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use super::remote::RemoteClient;
use crate::error::TransferError;

/// One file to move, derived from a catalog record
#[derive(Debug, Clone, PartialEq)]
pub struct TransferTask {
    /// Full remote path (root + relative path)
    pub remote_path: String,
    pub local_path: PathBuf,
    pub local_directory: PathBuf,
}

#[async_trait]
pub trait TransferStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn transfer(&self, task: &TransferTask) -> Result<(), TransferError>;
}

/// Direct byte stream through the remote client
pub struct StreamTransfer {
    remote: Arc<dyn RemoteClient>,
}

impl StreamTransfer {
    pub fn new(remote: Arc<dyn RemoteClient>) -> Self {
        Self { remote }
    }
}

#[async_trait]
impl TransferStrategy for StreamTransfer {
    fn name(&self) -> &'static str {
        "stream"
    }

    async fn transfer(&self, task: &TransferTask) -> Result<(), TransferError> {
        let mut reader = self.remote.open_read(&task.remote_path).await?;
        let mut file = tokio::fs::File::create(&task.local_path).await?;

        let result = tokio::io::copy(&mut reader, &mut file).await;
        match result {
            Ok(bytes) => {
                file.flush().await?;
                file.sync_all().await?;
                debug!(local = %task.local_path.display(), bytes, "Stream transfer finished");
                Ok(())
            }
            Err(e) => {
                drop(file);
                if let Err(remove_err) = tokio::fs::remove_file(&task.local_path).await {
                    warn!(local = %task.local_path.display(), error = %remove_err, "Failed to remove partial download");
                }
                Err(e.into())
            }
        }
    }
}

/// Settings for the external downloader
#[derive(Debug, Clone)]
pub struct CommandTransferConfig {
    pub program: String,
    /// Argument template. Placeholders: `{host} {port} {user} {password}
    /// {fingerprint} {remote} {local} {local_dir} {segments}`
    pub args: Vec<String>,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Expected host key fingerprint, empty when unchecked
    pub fingerprint: String,
    pub segments: u32,
    pub timeout: Duration,
}

impl CommandTransferConfig {
    /// lftp segmented download over sftp
    pub fn default_args() -> Vec<String> {
        vec![
            "-u".to_string(),
            "{user},{password}".to_string(),
            "-p".to_string(),
            "{port}".to_string(),
            "-e".to_string(),
            "pget -n {segments} \"{remote}\" -o \"{local}\"; quit".to_string(),
            "sftp://{host}".to_string(),
        ]
    }
}

/// External accelerated-transfer subprocess
pub struct CommandTransfer {
    config: CommandTransferConfig,
}

impl CommandTransfer {
    pub fn new(config: CommandTransferConfig) -> Self {
        Self { config }
    }

    /// Expand the argument template for one task
    pub fn render_args(&self, task: &TransferTask) -> Vec<String> {
        let c = &self.config;
        c.args
            .iter()
            .map(|arg| {
                arg.replace("{host}", &c.host)
                    .replace("{port}", &c.port.to_string())
                    .replace("{user}", &c.username)
                    .replace("{password}", &c.password)
                    .replace("{fingerprint}", &c.fingerprint)
                    .replace("{segments}", &c.segments.to_string())
                    .replace("{remote}", &task.remote_path)
                    .replace("{local_dir}", &task.local_directory.to_string_lossy())
                    .replace("{local}", &task.local_path.to_string_lossy())
            })
            .collect()
    }
}

#[async_trait]
impl TransferStrategy for CommandTransfer {
    fn name(&self) -> &'static str {
        "command"
    }

    async fn transfer(&self, task: &TransferTask) -> Result<(), TransferError> {
        let mut child = Command::new(&self.config.program)
            .args(self.render_args(task))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| TransferError::Spawn {
                program: self.config.program.clone(),
                source,
            })?;

        match tokio::time::timeout(self.config.timeout, child.wait()).await {
            Ok(Ok(status)) if status.success() => Ok(()),
            Ok(Ok(status)) => Err(TransferError::ExitStatus(status)),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => {
                warn!(
                    remote = %task.remote_path,
                    timeout_secs = self.config.timeout.as_secs(),
                    "Transfer timed out, killing downloader"
                );
                if let Err(e) = child.kill().await {
                    warn!(error = %e, "Failed to kill downloader");
                }
                Err(TransferError::TimedOut(self.config.timeout))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::remote::LocalMirrorClient;
    use assert_matches::assert_matches;

    fn task(dir: &std::path::Path) -> TransferTask {
        TransferTask {
            remote_path: "/complete/Show/ep.mkv".to_string(),
            local_path: dir.join("Show/ep.mkv"),
            local_directory: dir.join("Show"),
        }
    }

    fn command_config(program: &str, args: &[&str], timeout: Duration) -> CommandTransferConfig {
        CommandTransferConfig {
            program: program.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
            host: "seedbox".to_string(),
            port: 2222,
            username: "me".to_string(),
            password: "pw".to_string(),
            fingerprint: String::new(),
            segments: 6,
            timeout,
        }
    }

    #[test]
    fn test_render_default_args() {
        let mut config = command_config("lftp", &[], Duration::from_secs(1));
        config.args = CommandTransferConfig::default_args();
        let transfer = CommandTransfer::new(config);
        let args = transfer.render_args(&task(std::path::Path::new("/dl")));
        assert_eq!(args[1], "me,pw");
        assert_eq!(args[3], "2222");
        assert_eq!(
            args[5],
            "pget -n 6 \"/complete/Show/ep.mkv\" -o \"/dl/Show/ep.mkv\"; quit"
        );
        assert_eq!(args[6], "sftp://seedbox");
    }

    #[tokio::test]
    async fn test_stream_transfer_copies_bytes() {
        let remote_dir = tempfile::tempdir().unwrap();
        let local_dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(remote_dir.path().join("complete/Show")).unwrap();
        std::fs::write(remote_dir.path().join("complete/Show/ep.mkv"), b"video-bytes").unwrap();

        let remote = Arc::new(LocalMirrorClient::new(remote_dir.path()));
        remote.connect().await.unwrap();
        let t = task(local_dir.path());
        std::fs::create_dir_all(&t.local_directory).unwrap();

        StreamTransfer::new(remote).transfer(&t).await.unwrap();
        assert_eq!(std::fs::read(&t.local_path).unwrap(), b"video-bytes");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_exit_status_is_failure() {
        let dir = tempfile::tempdir().unwrap();
        let transfer = CommandTransfer::new(command_config("false", &[], Duration::from_secs(5)));
        let result = transfer.transfer(&task(dir.path())).await;
        assert_matches!(result, Err(TransferError::ExitStatus(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_timeout_kills_child() {
        let dir = tempfile::tempdir().unwrap();
        let transfer = CommandTransfer::new(command_config(
            "sleep",
            &["5"],
            Duration::from_millis(100),
        ));
        let result = transfer.transfer(&task(dir.path())).await;
        assert_matches!(result, Err(TransferError::TimedOut(_)));
    }

    #[tokio::test]
    async fn test_command_spawn_failure() {
        let dir = tempfile::tempdir().unwrap();
        let transfer = CommandTransfer::new(command_config(
            "librarian-sync-no-such-program",
            &[],
            Duration::from_secs(1),
        ));
        let result = transfer.transfer(&task(dir.path())).await;
        assert_matches!(result, Err(TransferError::Spawn { .. }));
    }
}
