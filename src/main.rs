//! Librarian Sync - remote-to-local media sync
//!
//! With no arguments: scan the remote roots, download anything new or changed,
//! expand archives and file the media into the library.

use librarian_sync::app;
use librarian_sync::cli::{Command, USAGE};
use librarian_sync::config::Config;
use librarian_sync::services::init_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()?;
    init_tracing(&config.log_dir, config.log_json)?;

    let command = match Command::from_args() {
        Ok(command) => command,
        Err(e) => {
            tracing::error!(error = %e, "Invalid arguments");
            for line in USAGE {
                tracing::info!("{}", line);
            }
            std::process::exit(2);
        }
    };

    tracing::debug!(?command, "Dispatching command");
    if let Err(e) = app::execute(command, &config).await {
        tracing::error!(error = %format!("{:#}", e), "Run failed");
        return Err(e);
    }
    Ok(())
}
