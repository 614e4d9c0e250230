//! Application configuration management
//!
//! Settings come from `config.json` (path overridable with `CONFIG_PATH`) and
//! every value can be overridden from the environment, `.env` included.

use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::services::transfer::CommandTransferConfig;

/// How pending files are fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferKind {
    /// Byte stream through the remote client
    #[default]
    Stream,
    /// External accelerated downloader
    Command,
}

impl FromStr for TransferKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "stream" => Ok(TransferKind::Stream),
            "command" => Ok(TransferKind::Command),
            other => anyhow::bail!("Unknown transfer strategy '{}' (expected stream or command)", other),
        }
    }
}

/// `remoteDir` accepts a single path or a list
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn into_vec(self) -> Vec<String> {
        match self {
            OneOrMany::One(s) => vec![s],
            OneOrMany::Many(v) => v,
        }
    }
}

/// On-disk shape of `config.json`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    hostname: Option<String>,
    port: Option<u16>,
    username: Option<String>,
    password: Option<String>,
    fingerprint: Option<String>,
    remote_dir: Option<OneOrMany>,
    remote_mount: Option<String>,
    download_dir: Option<String>,
    movie_dir: Option<String>,
    tv_dir: Option<String>,
    unrar: Option<String>,
    tmdb_key: Option<String>,
    database: Option<String>,
    log_dir: Option<String>,
    log_format: Option<String>,
    transfer: Option<String>,
    transfer_program: Option<String>,
    transfer_args: Option<Vec<String>>,
    transfer_segments: Option<u32>,
    transfer_timeout_secs: Option<u64>,
    extract_timeout_secs: Option<u64>,
    extract_settle_millis: Option<u64>,
}

/// Remote host credentials
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub hostname: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub fingerprint: Option<String>,
    /// Local mount point of the remote filesystem
    pub mount: PathBuf,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub remote: RemoteConfig,

    /// Remote roots scanned each run
    pub remote_dirs: Vec<String>,

    pub download_dir: PathBuf,
    pub movie_dir: PathBuf,
    pub tv_dir: PathBuf,

    /// unrar executable
    pub unrar: String,

    /// TMDB API key; lookups are disabled without one
    pub tmdb_api_key: Option<String>,

    /// SQLite path or URL for the catalog
    pub database_path: String,

    pub log_dir: PathBuf,

    /// JSON console output (`LOG_FORMAT=json`)
    pub log_json: bool,

    pub transfer: TransferKind,
    pub transfer_program: String,
    pub transfer_args: Vec<String>,
    pub transfer_segments: u32,
    pub transfer_timeout: Duration,

    pub extract_timeout: Duration,
    pub extract_settle: Duration,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match non_empty(lookup(key)) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("Invalid {}: {}", key, e)),
        None => Ok(None),
    }
}

impl Config {
    /// Load `.env`, then `config.json`, then apply environment overrides
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        let path = env::var("CONFIG_PATH").unwrap_or_else(|_| "./config.json".to_string());
        let file = read_config_file(Path::new(&path))?;
        Self::from_parts(file, |key| env::var(key).ok())
    }

    /// Parse a `config.json` document with no environment overrides
    pub fn from_json(json: &str) -> Result<Self> {
        let file: ConfigFile = serde_json::from_str(json).context("Invalid config.json")?;
        Self::from_parts(Some(file), |_| None)
    }

    fn from_parts(file: Option<ConfigFile>, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let file = file.unwrap_or_default();
        let var = |key: &str| non_empty(lookup(key));

        let remote_dirs = match var("SYNC_REMOTE_DIRS") {
            Some(list) => list
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            None => file.remote_dir.map(OneOrMany::into_vec).unwrap_or_default(),
        };

        let transfer = match var("SYNC_TRANSFER").or(file.transfer) {
            Some(kind) => kind.parse()?,
            None => TransferKind::default(),
        };

        let remote = RemoteConfig {
            hostname: var("SYNC_HOSTNAME")
                .or(file.hostname)
                .unwrap_or_else(|| "localhost".to_string()),
            port: parse_var(&lookup, "SYNC_PORT")?.or(file.port).unwrap_or(22),
            username: var("SYNC_USERNAME").or(file.username).unwrap_or_default(),
            password: var("SYNC_PASSWORD").or(file.password).unwrap_or_default(),
            fingerprint: non_empty(var("SYNC_FINGERPRINT").or(file.fingerprint)),
            mount: PathBuf::from(
                var("SYNC_REMOTE_MOUNT")
                    .or(file.remote_mount)
                    .unwrap_or_else(|| "/".to_string()),
            ),
        };

        Ok(Self {
            remote,
            remote_dirs,
            download_dir: PathBuf::from(
                var("DOWNLOADS_PATH")
                    .or(file.download_dir)
                    .unwrap_or_else(|| "./data/downloads".to_string()),
            ),
            movie_dir: PathBuf::from(
                var("MOVIES_PATH")
                    .or(file.movie_dir)
                    .unwrap_or_else(|| "./data/media/Movies".to_string()),
            ),
            tv_dir: PathBuf::from(
                var("TV_PATH")
                    .or(file.tv_dir)
                    .unwrap_or_else(|| "./data/media/TV".to_string()),
            ),
            unrar: var("UNRAR_PATH")
                .or(file.unrar)
                .unwrap_or_else(|| "unrar".to_string()),
            tmdb_api_key: non_empty(var("TMDB_API_KEY").or(file.tmdb_key)),
            database_path: var("DATABASE_PATH")
                .or(file.database)
                .unwrap_or_else(|| "./data/librarian-sync.db".to_string()),
            log_dir: PathBuf::from(var("LOG_DIR").or(file.log_dir).unwrap_or_else(|| ".".to_string())),
            log_json: var("LOG_FORMAT")
                .or(file.log_format)
                .is_some_and(|f| f.eq_ignore_ascii_case("json")),
            transfer,
            transfer_program: var("SYNC_TRANSFER_PROGRAM")
                .or(file.transfer_program)
                .unwrap_or_else(|| "lftp".to_string()),
            transfer_args: file
                .transfer_args
                .unwrap_or_else(CommandTransferConfig::default_args),
            transfer_segments: parse_var(&lookup, "SYNC_TRANSFER_SEGMENTS")?
                .or(file.transfer_segments)
                .unwrap_or(8),
            transfer_timeout: Duration::from_secs(
                parse_var(&lookup, "SYNC_TRANSFER_TIMEOUT")?
                    .or(file.transfer_timeout_secs)
                    .unwrap_or(12 * 3600),
            ),
            extract_timeout: Duration::from_secs(
                parse_var(&lookup, "SYNC_EXTRACT_TIMEOUT")?
                    .or(file.extract_timeout_secs)
                    .unwrap_or(6 * 3600),
            ),
            extract_settle: Duration::from_millis(file.extract_settle_millis.unwrap_or(2000)),
        })
    }

    /// Settings the full sync run cannot do without
    pub fn validate_for_sync(&self) -> Result<()> {
        if self.remote_dirs.is_empty() {
            anyhow::bail!("No remote directories configured (remoteDir or SYNC_REMOTE_DIRS)");
        }
        Ok(())
    }

    pub fn command_transfer(&self) -> CommandTransferConfig {
        CommandTransferConfig {
            program: self.transfer_program.clone(),
            args: self.transfer_args.clone(),
            host: self.remote.hostname.clone(),
            port: self.remote.port,
            username: self.remote.username.clone(),
            password: self.remote.password.clone(),
            fingerprint: self.remote.fingerprint.clone().unwrap_or_default(),
            segments: self.transfer_segments,
            timeout: self.transfer_timeout,
        }
    }
}

fn read_config_file(path: &Path) -> Result<Option<ConfigFile>> {
    match std::fs::read_to_string(path) {
        Ok(text) => {
            let file = serde_json::from_str(&text)
                .with_context(|| format!("Invalid config file {}", path.display()))?;
            Ok(Some(file))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_parts(None, |_| None).unwrap();
        assert_eq!(config.remote.port, 22);
        assert_eq!(config.download_dir, PathBuf::from("./data/downloads"));
        assert_eq!(config.transfer, TransferKind::Stream);
        assert_eq!(config.transfer_segments, 8);
        assert_eq!(config.transfer_timeout, Duration::from_secs(43200));
        assert_eq!(config.extract_settle, Duration::from_secs(2));
        assert!(config.tmdb_api_key.is_none());
        assert!(!config.log_json);
        assert!(config.validate_for_sync().is_err());
    }

    #[test]
    fn test_json_keys() {
        let config = Config::from_json(
            r#"{
                "hostname": "seedbox.example",
                "port": 2222,
                "username": "me",
                "password": "secret",
                "fingerprint": "ssh-ed25519 255 aa:bb",
                "remoteDir": ["/complete/tv", "/complete/movies"],
                "downloadDir": "/srv/downloads",
                "movieDir": "/srv/Movies",
                "tvDir": "/srv/TV",
                "unrar": "/usr/bin/unrar",
                "tmdbKey": "abc123",
                "transfer": "command"
            }"#,
        )
        .unwrap();
        assert_eq!(config.remote.hostname, "seedbox.example");
        assert_eq!(config.remote.port, 2222);
        assert_eq!(config.remote_dirs, vec!["/complete/tv", "/complete/movies"]);
        assert_eq!(config.tv_dir, PathBuf::from("/srv/TV"));
        assert_eq!(config.tmdb_api_key.as_deref(), Some("abc123"));
        assert_eq!(config.transfer, TransferKind::Command);
        assert!(config.validate_for_sync().is_ok());

        let command = config.command_transfer();
        assert_eq!(command.program, "lftp");
        assert_eq!(command.fingerprint, "ssh-ed25519 255 aa:bb");
    }

    #[test]
    fn test_single_remote_dir() {
        let config = Config::from_json(r#"{"remoteDir": "/complete"}"#).unwrap();
        assert_eq!(config.remote_dirs, vec!["/complete"]);
    }

    #[test]
    fn test_env_overrides_file() {
        let file: ConfigFile =
            serde_json::from_str(r#"{"remoteDir": ["/a"], "port": 2222, "tmdbKey": "file"}"#).unwrap();
        let config = Config::from_parts(
            Some(file),
            env_of(&[
                ("SYNC_REMOTE_DIRS", "/x, /y"),
                ("SYNC_PORT", "2200"),
                ("TMDB_API_KEY", ""),
                ("SYNC_TRANSFER_TIMEOUT", "60"),
            ]),
        )
        .unwrap();
        assert_eq!(config.remote_dirs, vec!["/x", "/y"]);
        assert_eq!(config.remote.port, 2200);
        // Blank env values fall through to the file
        assert_eq!(config.tmdb_api_key.as_deref(), Some("file"));
        assert_eq!(config.transfer_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_invalid_values() {
        assert!(Config::from_parts(None, env_of(&[("SYNC_PORT", "ssh")])).is_err());
        assert!(Config::from_json(r#"{"transfer": "carrier-pigeon"}"#).is_err());
    }

    #[test]
    fn test_missing_file_is_allowed() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_config_file(&dir.path().join("config.json")).unwrap().is_none());

        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(read_config_file(&path).is_err());
    }
}
