//! Typed failures for the external-process and transfer seams.
//!
//! Orchestration code uses `anyhow`; these enums exist where a caller has to
//! tell the failure kinds apart (timeouts kill the child, exit codes are logged).

use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransferError {
    #[error("failed to start transfer program {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("transfer program exited with {0}")]
    ExitStatus(ExitStatus),

    #[error("transfer did not finish within {0:?}")]
    TimedOut(Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("remote error: {0}")]
    Remote(#[from] anyhow::Error),
}

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("failed to start extractor {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("extractor exited with {status} for {archive}")]
    ExitStatus { archive: PathBuf, status: ExitStatus },

    #[error("extractor did not finish within {0:?}")]
    TimedOut(Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
