//!
//! src/transform.rs  Oct 19th, 2026 
//!
//! Flattens nested playlist items into the tabular rows that get
//! validated and loaded. One song row per item, plus artist, artist-song
//! and album rows
//!

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::PlaylistItem;

/// Flat song row. Everything pulled from the payload is optional here,
/// validation decides whether a missing value stops the load
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SongRow {
    pub id: Uuid,
    pub song_id: Option<String>,
    pub position: u32,
    pub name: Option<String>,
    pub artist_name: Option<String>,
    pub day: Option<DateTime<Utc>>,
    pub timestamp: Option<NaiveDate>
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtistRow {
    pub id: String,
    pub name: String
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtistSongRow {
    pub artist_id: String,
    pub artist_name: String,
    pub song_id: String,
    pub song_name: String
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlbumRow {
    pub id: String,
    pub name: String,
    pub release_date: Option<String>,
    pub total_tracks: Option<u32>,
    // space separated image urls, largest first as the api orders them
    pub images: String
}

#[derive(Debug, Clone, Default)]
pub struct Shaped {
    pub songs: Vec<SongRow>,
    pub artists: Vec<ArtistRow>,
    pub artist_songs: Vec<ArtistSongRow>,
    pub albums: Vec<AlbumRow>
}

/// Blank strings count as missing, a csv cell cannot tell them apart
fn present(value: &Option<String>) -> Option<String> {
    value.as_ref()
        .filter(|s| !s.trim().is_empty())
        .cloned()
}

impl SongRow {
    /// Position is the 1-based rank of the item in the page
    pub fn from_item(position: u32, item: &PlaylistItem) -> Self {
        let track = item.track.as_ref();
        Self {
            id: Uuid::new_v4(),
            song_id: track.and_then(|t| present(&t.id)),
            position,
            name: track.and_then(|t| present(&t.name)),
            artist_name: track
                .and_then(|t| t.first_artist())
                .and_then(|a| present(&a.name)),
            day: item.added_at,
            timestamp: item.added_at.map(|d| d.date_naive()),
        }
    }
}

/// Maps the page to rows in input order
pub fn shape(items: &[PlaylistItem]) -> Shaped {
    let mut shaped = Shaped::default();
    let mut seen_artists: HashSet<String> = HashSet::new();
    let mut seen_albums: HashSet<String> = HashSet::new();

    for (index, item) in items.iter().enumerate() {
        let position = u32::try_from(index + 1).unwrap_or(u32::MAX);
        shaped.songs.push(SongRow::from_item(position, item));

        let Some(track) = item.track.as_ref() else { continue };

        for artist in &track.artists {
            let (Some(artist_id), Some(artist_name)) = (&artist.id, &artist.name) else {
                continue
            };

            if seen_artists.insert(artist_id.clone()) {
                shaped.artists.push(ArtistRow {
                    id: artist_id.clone(),
                    name: artist_name.clone()
                });
            }

            if let (Some(song_id), Some(song_name)) = (&track.id, &track.name) {
                shaped.artist_songs.push(ArtistSongRow {
                    artist_id: artist_id.clone(),
                    artist_name: artist_name.clone(),
                    song_id: song_id.clone(),
                    song_name: song_name.clone()
                });
            }
        }

        if let Some(album) = track.album.as_ref() {
            if let (Some(album_id), Some(album_name)) = (&album.id, &album.name) {
                if seen_albums.insert(album_id.clone()) {
                    shaped.albums.push(AlbumRow {
                        id: album_id.clone(),
                        name: album_name.clone(),
                        release_date: album.release_date.clone(),
                        total_tracks: album.total_tracks,
                        images: album.images.iter()
                            .map(|image| image.url.as_str())
                            .collect::<Vec<_>>()
                            .join(" ")
                    });
                }
            }
        }
    }

    shaped
}
