//!
//! src/main.rs  Oct 19th, 2026 
//!
//! Entry point of the top 50 etl: builds the configuration, logger,
//! api client and sinks, then runs the pipeline once
//!
//!

mod config;
mod errors;
mod logging;

mod types;
mod fetch;
mod transform;
mod validate;
mod repository;
mod sink;
mod persistent;
mod pipeline;

use crate::errors::EtlError;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), EtlError> {
    let cfgs    = config::load_config()?;
    let _logger = logging::init_logging(&cfgs.logging)?;

    tracing::info!(
        service = "top50-etl",
        version = %env!("CARGO_PKG_VERSION"),
        playlist = %cfgs.playlist.playlist_id,
        target = ?cfgs.target,
        "starting"
    );

    let spotify      = fetch::SpotifyClient::new(&cfgs.http, &cfgs.spotify)?;
    let repositories = pipeline::open_repositories(&cfgs)?;
    let pipeline     = pipeline::Pipeline::new(spotify, cfgs.playlist.clone(), repositories);

    let result = pipeline.run().await;
    pipeline.close().await;

    let outcome = result?;
    tracing::info!(outcome = %outcome, "finished");
    Ok(())
}
