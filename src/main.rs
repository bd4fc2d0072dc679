//! gphotos-upload: push a local tree of JPEGs to a Google Photos account.
//!
//! Every `.jpg`/`.jpeg` under the given directory whose file name is not
//! already in the account is uploaded, optionally downscaled to the size
//! the service stores for free.

#![warn(clippy::all)]

mod auth;
mod cli;
mod config;
mod photos;
mod scan;
mod types;
mod upload;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use photos::PhotosService;
use scan::ImageScanner;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();
    let config = config::Config::from_cli(cli)?;

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_filter())),
        )
        .init();

    tracing::debug!(?config, "Starting gphotos-upload");

    // Validate the directory before any authorization prompt.
    let scanner = ImageScanner::open(&config.directory)?;

    let session = auth::acquire_session(&config.auth_config()).await?;

    let span = tracing::info_span!("gphotos_upload", root = %config.directory.display());
    let mut service = PhotosService::new(Box::new(session), config.service_url.as_str(), span);

    upload::upload_directory(
        &scanner,
        &mut service,
        config.full_quality,
        config.no_progress_bar,
    )
    .await?;

    Ok(())
}
