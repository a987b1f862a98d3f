//!
//! src/repository.rs  Oct 19th, 2026 
//!
//! The interface every sink implements so the pipeline can load into
//! files, a database, or both without knowing which
//!

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::EtlError;
use crate::transform::{AlbumRow, ArtistRow, ArtistSongRow, Shaped};
use crate::validate::ValidatedSongs;

/// Suffix shared by every file a run writes
pub const RUN_STAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Everything one run hands to its sinks
#[derive(Debug, Clone)]
pub struct LoadBatch {
    pub run_stamp: String,
    pub songs: ValidatedSongs,
    pub artists: Vec<ArtistRow>,
    pub artist_songs: Vec<ArtistSongRow>,
    pub albums: Vec<AlbumRow>,
    pub raw: Vec<serde_json::Value>
}

impl LoadBatch {
    pub fn new(
        run_at: DateTime<Utc>,
        songs: ValidatedSongs,
        shaped: Shaped,
        raw: Vec<serde_json::Value>
    ) -> Self {
        Self {
            run_stamp: run_at.format(RUN_STAMP_FORMAT).to_string(),
            songs,
            artists: shaped.artists,
            artist_songs: shaped.artist_songs,
            albums: shaped.albums,
            raw
        }
    }
}

#[async_trait]
pub trait SongRepository: Send + Sync {
    /// Short name used in logs and run reports
    fn label(&self) -> &'static str;

    /// Make sure the destination exists, idempotent
    async fn create_table(&self) -> Result<(), EtlError>;

    /// Writes the whole batch or nothing, returns the number of song rows
    async fn bulk_insert(&self, batch: &LoadBatch) -> Result<u64, EtlError>;

    /// Releases connections, called once whatever happened during the run
    async fn close(&self) {}
}
