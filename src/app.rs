//! Service construction and command dispatch.
//!
//! Used by [main] to turn a [Config] into wired services and run one [Command].

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cli::{Command, USAGE};
use crate::config::{Config, TransferKind};
use crate::db::Database;
use crate::services::{
    ArchiveExtractor, Catalog, CommandTransfer, DownloadOrchestrator, ExtractorConfig,
    LibraryRoots, LocalMirrorClient, MediaOrganizer, MediaRenamer, MetadataLookup, NoLookup,
    PlacementMode, RemoteClient, StreamTransfer, SyncPipeline, TmdbClient, TransferStrategy,
    TreeScanner, pipeline,
};

/// Metadata lookup for the configured key; lookups are disabled without one
pub fn build_lookup(config: &Config) -> Result<Arc<dyn MetadataLookup>> {
    match &config.tmdb_api_key {
        Some(key) => Ok(Arc::new(TmdbClient::new(key.clone())?)),
        None => {
            warn!("No TMDB API key configured, names will come from filenames only");
            Ok(Arc::new(NoLookup))
        }
    }
}

pub fn build_extractor(config: &Config) -> ArchiveExtractor {
    ArchiveExtractor::new(ExtractorConfig {
        program: config.unrar.clone(),
        timeout: config.extract_timeout,
        settle_delay: config.extract_settle,
    })
}

pub fn build_organizer(config: &Config) -> Result<MediaOrganizer> {
    Ok(MediaOrganizer::new(
        MediaRenamer::new(build_lookup(config)?),
        LibraryRoots {
            tv: config.tv_dir.clone(),
            movies: config.movie_dir.clone(),
        },
    ))
}

/// Wire the full sync pipeline against `db`
pub fn build_pipeline(config: &Config, db: Database) -> Result<SyncPipeline> {
    config.validate_for_sync()?;

    let remote: Arc<dyn RemoteClient> = Arc::new(LocalMirrorClient::new(&config.remote.mount));
    let catalog = Catalog::new(db);
    let strategy: Arc<dyn TransferStrategy> = match config.transfer {
        TransferKind::Stream => Arc::new(StreamTransfer::new(remote.clone())),
        TransferKind::Command => Arc::new(CommandTransfer::new(config.command_transfer())),
    };

    Ok(SyncPipeline::new(
        remote.clone(),
        TreeScanner::new(remote.clone(), catalog.clone()),
        DownloadOrchestrator::new(catalog, remote, strategy, &config.download_dir),
        build_extractor(config),
        build_organizer(config)?,
        config.remote_dirs.clone(),
    ))
}

async fn process_path(config: &Config, path: &Path, mode: PlacementMode) -> Result<()> {
    info!(path = %path.display(), mode = mode.as_str(), "Processing local path");
    let summary = pipeline::process_local(
        &build_extractor(config),
        &build_organizer(config)?,
        path,
        mode,
    )
    .await;
    if summary.failed > 0 {
        warn!(failed = summary.failed, "Some files could not be placed");
    }
    Ok(())
}

/// Run one command to completion
pub async fn execute(command: Command, config: &Config) -> Result<()> {
    match command {
        Command::Help => {
            for line in USAGE {
                info!("{}", line);
            }
        }
        Command::Run => {
            info!("Starting sync run");
            let db = Database::connect(&config.database_path).await?;
            let result = build_pipeline(config, db.clone())?.run().await;
            db.close().await;
            result?;
        }
        Command::Move(path) => process_path(config, &path, PlacementMode::Move).await?,
        Command::Copy(path) => process_path(config, &path, PlacementMode::Copy).await?,
        Command::Tv(path) => {
            let renamer = MediaRenamer::new(build_lookup(config)?);
            let destination = renamer.render_tv(&path).await;
            info!(source = %path.display(), destination = %destination.display(), "TV rename");
            println!("{}", destination.display());
        }
        Command::Movie(path) => {
            let renamer = MediaRenamer::new(build_lookup(config)?);
            let destination = renamer.render_movie(&path).await;
            info!(source = %path.display(), destination = %destination.display(), "Movie rename");
            println!("{}", destination.display());
        }
        Command::Sql(text) => {
            let db = Database::connect(&config.database_path).await?;
            let rows = db
                .execute_raw(&text)
                .await
                .context("Diagnostic query failed")?;
            info!("{} rows affected", rows);
            db.close().await;
        }
    }
    Ok(())
}
