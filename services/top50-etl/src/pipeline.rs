//!
//! src/pipeline.rs  Oct 19th, 2026 
//!
//! Runs extraction, shaping, validation and loading in that order,
//! once. Only extraction errors leave this module, everything after it
//! is logged and reported through `RunOutcome`
//!

use std::fmt;

use chrono::{NaiveDate, Utc};
use tracing::{error, info, warn};

use crate::config::{AppConfig, PlaylistConfig};
use crate::errors::EtlError;
use crate::fetch::{Snapshot, SpotifyClient};
use crate::persistent;
use crate::repository::{LoadBatch, SongRepository};
use crate::sink::FileSink;
use crate::transform::shape;
use crate::validate::{validate, ValidationError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Loaded { rows: usize },
    NoData,
    Rejected(ValidationError),
    LoadFailed { failed: Vec<&'static str> }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::Loaded { rows } => write!(f, "loaded {rows} rows"),
            RunOutcome::NoData => write!(f, "no data"),
            RunOutcome::Rejected(e) => write!(f, "rejected: {e}"),
            RunOutcome::LoadFailed { failed } => write!(f, "load failed for {}", failed.join(", ")),
        }
    }
}

/// Builds the sinks the config asks for, files first
pub fn open_repositories(cfg: &AppConfig) -> Result<Vec<Box<dyn SongRepository>>, EtlError> {
    let mut repositories: Vec<Box<dyn SongRepository>> = Vec::new();
    if cfg.target.files() {
        repositories.push(Box::new(FileSink::new(&cfg.output.dir, cfg.output.write_raw_json)));
    }
    if cfg.target.database() {
        repositories.push(persistent::open_repository(&cfg.database)?);
    }
    Ok(repositories)
}

pub struct Pipeline {
    spotify: SpotifyClient,
    playlist: PlaylistConfig,
    repositories: Vec<Box<dyn SongRepository>>
}

impl Pipeline {
    pub fn new(
        spotify: SpotifyClient,
        playlist: PlaylistConfig,
        repositories: Vec<Box<dyn SongRepository>>
    ) -> Self {
        Self { spotify, playlist, repositories }
    }

    /// Full run against today's date (UTC)
    pub async fn run(&self) -> Result<RunOutcome, EtlError> {
        let snapshot = self.spotify.extract(&self.playlist).await?;
        let today = Utc::now().date_naive();
        Ok( self.process(snapshot, today).await )
    }

    /// Everything after extraction
    pub async fn process(&self, snapshot: Snapshot, today: NaiveDate) -> RunOutcome {
        let Snapshot { items, raw, fetched_at } = snapshot;

        let mut shaped = shape(&items);
        info!(
            songs = shaped.songs.len(),
            artists = shaped.artists.len(),
            albums = shaped.albums.len(),
            "transform.done"
        );

        let songs = match validate(std::mem::take(&mut shaped.songs), today) {
            Ok(songs) => songs,
            Err(ValidationError::EmptyResult) => {
                warn!("validate.empty");
                return RunOutcome::NoData;
            },
            Err(e) => {
                error!(error = %e, "validate.failed");
                return RunOutcome::Rejected(e);
            }
        };
        info!(rows = songs.len(), %today, "validate.passed");

        let batch = LoadBatch::new(fetched_at, songs, shaped, raw);
        let mut failed = Vec::new();
        for repository in &self.repositories {
            match load_into(repository.as_ref(), &batch).await {
                Ok(rows) => info!(sink = repository.label(), rows, "load.sink.done"),
                Err(e) => {
                    error!(sink = repository.label(), error = %e, "load.sink.failed");
                    failed.push(repository.label());
                }
            }
        }

        if failed.is_empty() {
            RunOutcome::Loaded { rows: batch.songs.len() }
        } else {
            RunOutcome::LoadFailed { failed }
        }
    }

    /// Releases every sink, call on every exit path
    pub async fn close(&self) {
        for repository in &self.repositories {
            repository.close().await;
        }
    }
}

async fn load_into(repository: &dyn SongRepository, batch: &LoadBatch) -> Result<u64, EtlError> {
    repository.create_table().await?;
    repository.bulk_insert(batch).await
}
