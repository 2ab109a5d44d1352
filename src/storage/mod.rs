//! PlateStore - recognized plate persistence
//!
//! ## Responsibilities
//!
//! - Own the SQLite pool (WAL, busy timeout) used across workers
//! - Initialise the `plates` schema
//! - Answer "has this event already been recorded"
//! - Insert at most one plate per event id
//!
//! The UNIQUE constraint on the event id is the only mechanism preventing a
//! double-persist when two workers race on the same event; the losing
//! insert is a normal outcome, not an error.

use crate::error::Result;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use std::path::Path;
use std::time::Duration;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_CONNECTIONS: u32 = 5;

/// Result of an insert attempt. `AlreadyExists` is the expected outcome for
/// the loser of a same-event race or a re-delivered message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    AlreadyExists,
}

/// Plate history store backed by a single local SQLite file.
#[derive(Clone)]
pub struct PlateStore {
    pool: SqlitePool,
}

impl PlateStore {
    /// Open (creating if missing) the database file and initialise the
    /// schema.
    pub async fn open(path: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(BUSY_TIMEOUT)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.init_schema().await?;
        tracing::debug!(path = %path.display(), "Database initialised");
        Ok(store)
    }

    /// In-memory store for tests. A single connection keeps every operation
    /// on the same database.
    pub async fn open_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .in_memory(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS plates (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                detection_time TIMESTAMP NOT NULL,
                score TEXT NOT NULL,
                plate_number TEXT NOT NULL,
                frigate_event TEXT NOT NULL UNIQUE,
                camera_name TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Whether a plate has already been persisted for this event id.
    pub async fn has_processed(&self, event_id: &str) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM plates WHERE frigate_event = ?")
            .bind(event_id)
            .fetch_optional(&self.pool)
            .await?;

        if row.is_some() {
            tracing::debug!(event_id = %event_id, "Skipping event: already processed");
            return Ok(true);
        }
        Ok(false)
    }

    /// Insert one recognized plate. A unique-constraint rejection maps to
    /// `AlreadyExists`; every other storage failure propagates.
    pub async fn insert_plate(
        &self,
        detection_time: &str,
        score: Option<f64>,
        plate_number: &str,
        event_id: &str,
        camera_name: &str,
    ) -> Result<InsertOutcome> {
        let result = sqlx::query(
            r#"
            INSERT INTO plates (detection_time, score, plate_number, frigate_event, camera_name)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(detection_time)
        .bind(score)
        .bind(plate_number)
        .bind(event_id)
        .bind(camera_name)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(InsertOutcome::Inserted),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                tracing::debug!(event_id = %event_id, "Plate for event already stored");
                Ok(InsertOutcome::AlreadyExists)
            }
            Err(e) => {
                tracing::error!(event_id = %event_id, error = %e, "SQLite error storing plate");
                Err(e.into())
            }
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
