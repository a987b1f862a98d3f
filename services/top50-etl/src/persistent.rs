//!
//! src/persistent.rs  Oct 19th, 2026 
//!
//! Relational sinks for the validated song rows. Pools are lazy so a
//! database that cannot be reached fails the load, not the start up
//!

use std::str::FromStr;

use async_trait::async_trait;
use sqlx::{
    Pool, Postgres, QueryBuilder, Sqlite,
    postgres::PgPoolOptions,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
};
use tracing::{debug, info};

use crate::config::{DatabaseConfig, DbBackend};
use crate::errors::EtlError;
use crate::repository::{LoadBatch, SongRepository};
use crate::transform::SongRow;

const SONG_COLUMNS: &str = "id, song_id, position, name, artist_name, day, timestamp";

/// Opens whichever backend the config points at
pub fn open_repository(cfg: &DatabaseConfig) -> Result<Box<dyn SongRepository>, EtlError> {
    match cfg.backend {
        DbBackend::Sqlite => Ok(Box::new(SqliteSongRepository::init(&cfg.url, &cfg.table)?)),
        DbBackend::Postgres => Ok(Box::new(PostgresSongRepository::init(&cfg.url, &cfg.table)?)),
    }
}

/// INSERT INTO <table> (...) VALUES (...), (...), ... for sqlite
fn sqlite_insert<'a>(table: &str, rows: &'a [SongRow]) -> QueryBuilder<'a, Sqlite> {
    let mut builder = QueryBuilder::new(format!("INSERT INTO {table} ({SONG_COLUMNS}) "));
    builder.push_values(rows, |mut b, row| {
        b.push_bind(row.id.to_string())
            .push_bind(row.song_id.clone())
            .push_bind(i64::from(row.position))
            .push_bind(row.name.clone())
            .push_bind(row.artist_name.clone())
            .push_bind(row.day)
            .push_bind(row.timestamp);
    });
    builder
}

/// Same statement with postgres placeholders
fn postgres_insert<'a>(table: &str, rows: &'a [SongRow]) -> QueryBuilder<'a, Postgres> {
    let mut builder = QueryBuilder::new(format!("INSERT INTO {table} ({SONG_COLUMNS}) "));
    builder.push_values(rows, |mut b, row| {
        b.push_bind(row.id.to_string())
            .push_bind(row.song_id.clone())
            .push_bind(i64::from(row.position))
            .push_bind(row.name.clone())
            .push_bind(row.artist_name.clone())
            .push_bind(row.day)
            .push_bind(row.timestamp);
    });
    builder
}

pub struct SqliteSongRepository {
    pool: Pool<Sqlite>,
    table: String
}

impl SqliteSongRepository {
    pub fn init(database_url: &str, table: &str) -> Result<Self, EtlError> {
        let is_memory = database_url.starts_with("sqlite::memory:");

        let mut opts = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true);

        // WAL is file-only; don't set it for in-memory
        if !is_memory {
            opts = opts.journal_mode(SqliteJournalMode::Wal)
                       .synchronous(SqliteSynchronous::Normal);
        }

        // an in-memory database lives and dies with its one connection
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_lazy_with(opts);

        Ok(Self { pool, table: table.to_string() })
    }
}

#[async_trait]
impl SongRepository for SqliteSongRepository {
    fn label(&self) -> &'static str {
        "sqlite"
    }

    async fn create_table(&self) -> Result<(), EtlError> {
        sqlx::query(&format!(
            r"
            CREATE TABLE IF NOT EXISTS {} (
              id           TEXT PRIMARY KEY,
              song_id      TEXT NOT NULL,
              position     INTEGER NOT NULL,
              name         TEXT NOT NULL,
              artist_name  TEXT NOT NULL,
              day          TEXT NOT NULL,
              timestamp    TEXT NOT NULL
            );
            ",
            self.table
        )).execute(&self.pool).await?;

        debug!(table = %self.table, "load.sqlite.table_ready");
        Ok(())
    }

    async fn bulk_insert(&self, batch: &LoadBatch) -> Result<u64, EtlError> {
        let rows = batch.songs.rows();
        let mut tx = self.pool.begin().await?;
        let inserted = sqlite_insert(&self.table, rows)
            .build()
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;

        info!(table = %self.table, rows = inserted, "load.sqlite.inserted");
        Ok(inserted)
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

pub struct PostgresSongRepository {
    pool: Pool<Postgres>,
    table: String
}

impl PostgresSongRepository {
    pub fn init(database_url: &str, table: &str) -> Result<Self, EtlError> {
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect_lazy(database_url)?;
        Ok(Self { pool, table: table.to_string() })
    }
}

#[async_trait]
impl SongRepository for PostgresSongRepository {
    fn label(&self) -> &'static str {
        "postgres"
    }

    async fn create_table(&self) -> Result<(), EtlError> {
        sqlx::query(&format!(
            r"
            CREATE TABLE IF NOT EXISTS {} (
              id           TEXT PRIMARY KEY,
              song_id      TEXT NOT NULL,
              position     BIGINT NOT NULL,
              name         TEXT NOT NULL,
              artist_name  TEXT NOT NULL,
              day          TIMESTAMPTZ NOT NULL,
              timestamp    DATE NOT NULL
            );
            ",
            self.table
        )).execute(&self.pool).await?;

        debug!(table = %self.table, "load.postgres.table_ready");
        Ok(())
    }

    async fn bulk_insert(&self, batch: &LoadBatch) -> Result<u64, EtlError> {
        let rows = batch.songs.rows();
        let mut tx = self.pool.begin().await?;
        let inserted = postgres_insert(&self.table, rows)
            .build()
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;

        info!(table = %self.table, rows = inserted, "load.postgres.inserted");
        Ok(inserted)
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
