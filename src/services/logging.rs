//! Tracing setup: console output plus a daily log file.
//!
//! The file layer writes through [DailyLogFile], which opens
//! `<log_dir>/MM-DD-YYYY.log` in append mode for every event and closes it
//! again, so there is no long-lived file handle to flush on exit.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub const DEFAULT_FILTER: &str = "librarian_sync=info";

/// `MakeWriter` for the per-day log file
#[derive(Debug, Clone)]
pub struct DailyLogFile {
    dir: PathBuf,
}

impl DailyLogFile {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(format!("{}.log", date.format("%m-%d-%Y")))
    }

    pub fn current_path(&self) -> PathBuf {
        self.path_for(Local::now().date_naive())
    }
}

/// Writer for a single event
pub struct DailyLogWriter {
    path: PathBuf,
}

impl Write for DailyLogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for DailyLogFile {
    type Writer = DailyLogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        DailyLogWriter {
            path: self.current_path(),
        }
    }
}

/// Install the global subscriber. `RUST_LOG` overrides [DEFAULT_FILTER];
/// `json_console` switches the console layer to JSON lines.
pub fn init_tracing(log_dir: &Path, json_console: bool) -> Result<()> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into()))
        .with(json_console.then(|| fmt::layer().json()))
        .with((!json_console).then(|| fmt::layer().with_target(false)))
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(DailyLogFile::new(log_dir)),
        )
        .try_init()
        .context("Failed to initialize tracing")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_format() {
        let log = DailyLogFile::new("/var/log/sync");
        let date = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        assert_eq!(log.path_for(date), PathBuf::from("/var/log/sync/03-07-2024.log"));
    }

    #[test]
    fn test_each_write_appends() {
        let dir = tempfile::tempdir().unwrap();
        let log = DailyLogFile::new(dir.path());

        log.make_writer().write_all(b"first\n").unwrap();
        log.make_writer().write_all(b"second\n").unwrap();

        let contents = std::fs::read_to_string(log.current_path()).unwrap();
        assert_eq!(contents, "first\nsecond\n");
    }

    #[test]
    fn test_events_reach_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let log = DailyLogFile::new(dir.path());
        let subscriber = tracing_subscriber::registry().with(
            fmt::layer()
                .with_ansi(false)
                .with_writer(log.clone()),
        );

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(path = "/complete/a.mkv", "Found new file");
        });

        let contents = std::fs::read_to_string(log.current_path()).unwrap();
        assert!(contents.contains("Found new file"));
        assert!(contents.contains("/complete/a.mkv"));
    }
}
