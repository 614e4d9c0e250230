//! Sync pipeline services

pub mod catalog;
pub mod downloader;
pub mod extractor;
pub mod filename_parser;
pub mod logging;
pub mod metadata;
pub mod organizer;
pub mod pipeline;
pub mod placement;
pub mod rate_limiter;
pub mod remote;
pub mod renamer;
pub mod scanner;
pub mod tmdb;
pub mod transfer;

pub use catalog::{Catalog, Observation};
pub use downloader::{DownloadKind, DownloadOrchestrator, DownloadOutcome, classify_download};
pub use extractor::{ArchiveExtractor, ExtractorConfig, find_archives, is_first_volume};
pub use logging::{DailyLogFile, init_tracing};
pub use metadata::{LookupResult, MetadataLookup, MovieMatch, NoLookup, TvMatch};
pub use organizer::{LibraryRoots, MediaOrganizer, OrganizeSummary, collect_media};
pub use pipeline::{RunSummary, SyncPipeline};
pub use placement::{PlacementAction, PlacementDecision, PlacementMode, PlacementOutcome};
pub use remote::{LocalMirrorClient, RemoteClient, RemoteEntry};
pub use renamer::{ClassifiedFile, MediaKind, MediaRenamer, classify, genre_bucket};
pub use scanner::{ScanSummary, TreeScanner};
pub use tmdb::TmdbClient;
pub use transfer::{
    CommandTransfer, CommandTransferConfig, StreamTransfer, TransferStrategy, TransferTask,
};
