//!
//! src/sink.rs  Oct 19th, 2026 
//!
//! Flat file sink. One csv per entity plus the raw page as pretty json,
//! every file named after the run stamp
//!

use std::{fs, io::Write, path::{Path, PathBuf}};

use async_trait::async_trait;
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{info, warn};

use crate::errors::EtlError;
use crate::repository::{LoadBatch, SongRepository};
use crate::transform::{AlbumRow, ArtistRow, ArtistSongRow, SongRow};

/// Rows that get their own csv file
pub trait CsvEntity: Serialize {
    const STEM: &'static str;
    /// Same order as the struct fields
    const HEADERS: &'static [&'static str];
}

impl CsvEntity for SongRow {
    const STEM: &'static str = "songs";
    const HEADERS: &'static [&'static str] =
        &["id", "song_id", "position", "name", "artist_name", "day", "timestamp"];
}

impl CsvEntity for ArtistRow {
    const STEM: &'static str = "artists";
    const HEADERS: &'static [&'static str] = &["id", "name"];
}

impl CsvEntity for ArtistSongRow {
    const STEM: &'static str = "artist-songs";
    const HEADERS: &'static [&'static str] =
        &["artist_id", "artist_name", "song_id", "song_name"];
}

impl CsvEntity for AlbumRow {
    const STEM: &'static str = "albums";
    const HEADERS: &'static [&'static str] =
        &["id", "name", "release_date", "total_tracks", "images"];
}

pub struct FileSink {
    root: PathBuf,
    write_raw_json: bool
}

impl FileSink {
    pub fn new(root: impl AsRef<Path>, write_raw_json: bool) -> Self {
        Self { root: root.as_ref().to_path_buf(), write_raw_json }
    }

    pub fn csv_path<T: CsvEntity>(&self, run_stamp: &str) -> PathBuf {
        self.root.join(format!("{}-{run_stamp}.csv", T::STEM))
    }

    pub fn json_path(&self, run_stamp: &str) -> PathBuf {
        self.root.join(format!("top-50-{run_stamp}.json"))
    }

    /// Header row is always written, even with no rows
    pub fn write_csv<T: CsvEntity>(&self, run_stamp: &str, rows: &[T]) ->
        Result<PathBuf, EtlError> {
        let staged = self.stage_csv(run_stamp, rows)?;
        let path = staged.path.clone();
        commit(vec![staged])?;

        info!(path = %path.display(), rows = rows.len(), "load.csv.written");
        Ok(path)
    }

    pub fn write_json(&self, run_stamp: &str, raw: &[serde_json::Value]) ->
        Result<PathBuf, EtlError> {
        let staged = self.stage_json(run_stamp, raw)?;
        let path = staged.path.clone();
        commit(vec![staged])?;

        info!(path = %path.display(), items = raw.len(), "load.json.written");
        Ok(path)
    }

    fn stage_csv<T: CsvEntity>(&self, run_stamp: &str, rows: &[T]) ->
        Result<Staged, EtlError> {
        self.stage(self.csv_path::<T>(run_stamp), |file| {
            let mut writer = csv::WriterBuilder::new()
                .has_headers(false)
                .from_writer(file);
            writer.write_record(T::HEADERS)?;
            for row in rows {
                writer.serialize(row)?;
            }
            writer.flush()?;
            Ok(())
        })
    }

    fn stage_json(&self, run_stamp: &str, raw: &[serde_json::Value]) ->
        Result<Staged, EtlError> {
        self.stage(self.json_path(run_stamp), |file| {
            serde_json::to_writer_pretty(&mut *file, raw)?;
            file.write_all(b"\n")?;
            Ok(())
        })
    }

    /// Fills a temp file next to the target, nothing visible yet
    fn stage<F>(&self, path: PathBuf, fill: F) -> Result<Staged, EtlError>
    where
        F: FnOnce(&mut fs::File) -> Result<(), EtlError>
    {
        let parent = path.parent().unwrap_or(self.root.as_path());
        let mut temp = NamedTempFile::new_in(parent)?;
        fill(temp.as_file_mut())?;
        temp.as_file().sync_all()?;
        Ok( Staged { temp, path } )
    }
}

/// A filled temp file waiting to be renamed onto its target
struct Staged {
    temp: NamedTempFile,
    path: PathBuf
}

/// Renames every staged file into place. If one rename fails the files
/// already moved are removed again, unmoved temp files go on drop
fn commit(staged: Vec<Staged>) -> Result<Vec<PathBuf>, EtlError> {
    let mut persisted: Vec<PathBuf> = Vec::with_capacity(staged.len());
    for Staged { temp, path } in staged {
        if let Err(e) = temp.persist(&path) {
            for done in &persisted {
                if let Err(remove) = fs::remove_file(done) {
                    warn!(path = %done.display(), error = %remove, "load.files.rollback_failed");
                }
            }
            return Err(EtlError::Io(e.error));
        }
        persisted.push(path);
    }
    Ok(persisted)
}

#[async_trait]
impl SongRepository for FileSink {
    fn label(&self) -> &'static str {
        "files"
    }

    async fn create_table(&self) -> Result<(), EtlError> {
        fs::create_dir_all(&self.root)?;
        Ok(())
    }

    async fn bulk_insert(&self, batch: &LoadBatch) -> Result<u64, EtlError> {
        let stamp = &batch.run_stamp;
        let mut staged = vec![
            self.stage_csv(stamp, batch.songs.rows())?,
            self.stage_csv(stamp, &batch.artists)?,
            self.stage_csv(stamp, &batch.artist_songs)?,
            self.stage_csv(stamp, &batch.albums)?,
        ];
        if self.write_raw_json {
            staged.push(self.stage_json(stamp, &batch.raw)?);
        }

        for path in commit(staged)? {
            info!(path = %path.display(), "load.file.written");
        }
        info!(rows = batch.songs.len(), "load.files.done");
        Ok(batch.songs.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::{shape, tests::{artist, item}};
    use crate::validate::{validate, ValidationError};
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn batch() -> LoadBatch {
        let added = Utc.with_ymd_and_hms(2025, 9, 13, 5, 0, 0).unwrap();
        let items = vec![
            item("t1", "Soltera", vec![artist("a1", "Shakira")], added),
            item("t2", "Si Antes Te Hubiera Conocido, Remix", vec![artist("a2", "Karol G"), artist("a1", "Shakira")], added),
        ];
        let mut shaped = shape(&items);
        let songs = validate(std::mem::take(&mut shaped.songs), added.date_naive()).unwrap();
        let raw = vec![json!({ "track": { "id": "t1" } }), json!({ "track": { "id": "t2" } })];
        LoadBatch::new(added, songs, shaped, raw)
    }

    #[tokio::test]
    async fn writes_one_file_per_entity() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("csv");
        let sink = FileSink::new(&root, true);
        let batch = batch();

        sink.create_table().await.unwrap();
        let written = sink.bulk_insert(&batch).await.unwrap();

        assert_eq!(written, 2);
        assert_eq!(batch.run_stamp, "2025-09-13_05-00-00");
        for stem in ["songs", "artists", "artist-songs", "albums"] {
            assert!(root.join(format!("{stem}-2025-09-13_05-00-00.csv")).exists(), "{stem}");
        }

        let raw = fs::read_to_string(root.join("top-50-2025-09-13_05-00-00.json")).unwrap();
        let back: Vec<serde_json::Value> = serde_json::from_str(&raw).unwrap();
        assert_eq!(back, batch.raw);
        // pretty printed
        assert!(raw.contains("\n  {"));
    }

    #[tokio::test]
    async fn raw_json_can_be_switched_off() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(dir.path(), false);
        let batch = batch();

        sink.create_table().await.unwrap();
        sink.bulk_insert(&batch).await.unwrap();

        assert!(!sink.json_path(&batch.run_stamp).exists());
    }

    #[test]
    fn song_csv_round_trips_with_header_order() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(dir.path(), false);
        let batch = batch();

        let path = sink.write_csv(&batch.run_stamp, batch.songs.rows()).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers: Vec<String> = reader.headers().unwrap()
            .iter()
            .map(str::to_string)
            .collect();
        assert_eq!(headers, SongRow::HEADERS);

        let back: Vec<SongRow> = reader.deserialize().collect::<Result<_, _>>().unwrap();
        assert_eq!(back, batch.songs.rows());
    }

    #[test]
    fn blank_payload_strings_read_back_the_same() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(dir.path(), false);
        let added = Utc.with_ymd_and_hms(2025, 9, 13, 5, 0, 0).unwrap();

        let shaped = shape(&[item("t1", "", vec![artist("a1", "Feid")], added)]);
        assert!(matches!(
            validate(shaped.songs.clone(), added.date_naive()),
            Err(ValidationError::NullValueFound { position: 1, column: "name" })
        ));

        let path = sink.write_csv("stamp", &shaped.songs).unwrap();
        let back: Vec<SongRow> = csv::Reader::from_path(&path).unwrap()
            .deserialize()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(back, shaped.songs);
    }

    #[tokio::test]
    async fn failed_file_leaves_no_partial_run_behind() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(dir.path(), true);
        let batch = batch();

        // a directory squatting on the artists file makes its rename fail
        let blocker = sink.csv_path::<ArtistRow>(&batch.run_stamp);
        fs::create_dir(&blocker).unwrap();

        let err = sink.bulk_insert(&batch).await.unwrap_err();
        assert!(matches!(err, EtlError::Io(_)));

        let left: Vec<PathBuf> = fs::read_dir(dir.path()).unwrap()
            .map(|entry| entry.unwrap().path())
            .collect();
        assert_eq!(left, vec![blocker]);
    }

    #[test]
    fn empty_entities_still_get_a_header() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(dir.path(), false);

        let path = sink.write_csv::<AlbumRow>("stamp", &[]).unwrap();

        let text = fs::read_to_string(path).unwrap();
        assert_eq!(text, "id,name,release_date,total_tracks,images\n");
    }

    #[test]
    fn rewriting_a_stamp_overwrites_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(dir.path(), false);
        let rows = vec![ArtistRow { id: "a1".into(), name: "Feid".into() }];

        sink.write_csv("stamp", &rows).unwrap();
        let path = sink.write_csv("stamp", &rows[..0]).unwrap();

        assert_eq!(fs::read_to_string(path).unwrap(), "id,name\n");
    }

    #[tokio::test]
    async fn missing_root_is_a_persistence_error() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(dir.path().join("never-created"), false);

        let err = sink.bulk_insert(&batch()).await.unwrap_err();
        assert!(matches!(err, EtlError::Io(_)));
    }
}
