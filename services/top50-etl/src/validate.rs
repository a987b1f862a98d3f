//!
//! src/validate.rs  Oct 19th, 2026 
//!
//! Checks the shaped song rows before anything is loaded. Checks run in
//! a fixed order and the first failure is returned
//!

use std::collections::HashSet;

use chrono::NaiveDate;
use thiserror::Error;

use crate::transform::SongRow;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("no rows to validate")]
    EmptyResult,
    #[error("primary key violation: duplicate {column} `{value}`")]
    PrimaryKeyViolation { column: &'static str, value: String },
    #[error("null value found in column {column} at position {position}")]
    NullValueFound { position: u32, column: &'static str },
    #[error("stale timestamp at position {position}: {found} (expected {expected})")]
    StaleTimestamp { position: u32, found: NaiveDate, expected: NaiveDate }
}

/// Song rows that passed every check, only `validate` builds one
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedSongs(Vec<SongRow>);

impl ValidatedSongs {
    pub fn rows(&self) -> &[SongRow] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

/// Empty, then unique `id` and `song_id`, then nulls, then same-day
pub fn validate(rows: Vec<SongRow>, today: NaiveDate) ->
    Result<ValidatedSongs, ValidationError> {

    if rows.is_empty() {
        return Err(ValidationError::EmptyResult);
    }

    check_unique(&rows)?;
    check_nulls(&rows)?;
    check_same_day(&rows, today)?;

    Ok(ValidatedSongs(rows))
}

fn check_unique(rows: &[SongRow]) -> Result<(), ValidationError> {
    let mut ids = HashSet::with_capacity(rows.len());
    for row in rows {
        if !ids.insert(row.id) {
            return Err(ValidationError::PrimaryKeyViolation {
                column: "id",
                value: row.id.to_string()
            });
        }
    }

    // null song ids are left for the null check
    let mut song_ids = HashSet::with_capacity(rows.len());
    for song_id in rows.iter().filter_map(|r| r.song_id.as_deref()) {
        if !song_ids.insert(song_id) {
            return Err(ValidationError::PrimaryKeyViolation {
                column: "song_id",
                value: song_id.to_string()
            });
        }
    }
    Ok(())
}

fn check_nulls(rows: &[SongRow]) -> Result<(), ValidationError> {
    for row in rows {
        let columns = [
            ("song_id", row.song_id.is_none()),
            ("name", row.name.is_none()),
            ("artist_name", row.artist_name.is_none()),
            ("day", row.day.is_none()),
            ("timestamp", row.timestamp.is_none()),
        ];
        if let Some((column, _)) = columns.iter().find(|(_, missing)| *missing) {
            return Err(ValidationError::NullValueFound {
                position: row.position,
                column: *column
            });
        }
    }
    Ok(())
}

fn check_same_day(rows: &[SongRow], today: NaiveDate) -> Result<(), ValidationError> {
    for row in rows {
        if let Some(found) = row.timestamp {
            if found != today {
                return Err(ValidationError::StaleTimestamp {
                    position: row.position,
                    found,
                    expected: today
                });
            }
        }
    }
    Ok(())
}
