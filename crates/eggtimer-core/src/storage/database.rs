//! SQLite-based cook history and key-value storage.
//!
//! Provides persistent storage for:
//! - Finished cooks (completed or stopped), for the history listing
//! - Key-value store for small preferences such as the last alarm choice
//!
//! Running timer state is never stored here.

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::error::{DatabaseError, Result};
use crate::timer::{Hardness, Selection, Size, Temperature};

const LAST_ALARM_CHOICE_KEY: &str = "last_alarm_choice";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CookOutcome {
    Completed,
    Stopped,
}

impl CookOutcome {
    fn as_str(self) -> &'static str {
        match self {
            CookOutcome::Completed => "completed",
            CookOutcome::Stopped => "stopped",
        }
    }
}

/// A finished cook, ready to be recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCook {
    pub selection: Selection,
    pub total_secs: u64,
    pub alarm_enabled: bool,
    pub outcome: CookOutcome,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CookRecord {
    pub id: i64,
    pub selection: Selection,
    pub total_secs: u64,
    pub alarm_enabled: bool,
    pub outcome: CookOutcome,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

/// SQLite database for cook history.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the database at `~/.config/eggtimer/eggtimer.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        let path = data_dir()?.join("eggtimer.db");
        Self::open_at(&path)
    }

    /// Open the database at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database (for tests).
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), rusqlite::Error> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS cooks (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                temperature   TEXT NOT NULL,
                size          TEXT NOT NULL,
                hardness      TEXT NOT NULL,
                total_secs    INTEGER NOT NULL,
                alarm_enabled INTEGER NOT NULL,
                outcome       TEXT NOT NULL,
                started_at    TEXT NOT NULL,
                ended_at      TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_cooks_ended_at ON cooks(ended_at);",
        )?;
        Ok(())
    }

    /// Record a finished cook.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub fn record_cook(&self, cook: &NewCook) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO cooks (temperature, size, hardness, total_secs, alarm_enabled, outcome, started_at, ended_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                cook.selection.temperature.to_string(),
                cook.selection.size.to_string(),
                cook.selection.hardness.to_string(),
                cook.total_secs as i64,
                cook.alarm_enabled,
                cook.outcome.as_str(),
                cook.started_at.to_rfc3339(),
                cook.ended_at.to_rfc3339(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Most recent cooks first.
    pub fn recent_cooks(&self, limit: usize) -> Result<Vec<CookRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, temperature, size, hardness, total_secs, alarm_enabled, outcome, started_at, ended_at
             FROM cooks ORDER BY ended_at DESC, id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, i64>(4)?,
                row.get::<_, bool>(5)?,
                row.get::<_, String>(6)?,
                row.get::<_, String>(7)?,
                row.get::<_, String>(8)?,
            ))
        })?;

        let mut cooks = Vec::new();
        for row in rows {
            let (
                id,
                temperature,
                size,
                hardness,
                total_secs,
                alarm_enabled,
                outcome,
                started_at,
                ended_at,
            ) = row?;
            cooks.push(CookRecord {
                id,
                selection: Selection {
                    temperature: parse_column::<Temperature>(&temperature)?,
                    size: parse_column::<Size>(&size)?,
                    hardness: parse_column::<Hardness>(&hardness)?,
                },
                total_secs: total_secs.max(0) as u64,
                alarm_enabled,
                outcome: match outcome.as_str() {
                    "completed" => CookOutcome::Completed,
                    "stopped" => CookOutcome::Stopped,
                    other => return Err(corrupt(format!("unknown outcome '{other}'")).into()),
                },
                started_at: parse_timestamp(&started_at)?,
                ended_at: parse_timestamp(&ended_at)?,
            });
        }
        Ok(cooks)
    }

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, rusqlite::Error> {
        let mut stmt = self.conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
        let result = stmt.query_row(params![key], |row| row.get::<_, String>(0));
        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    /// The alarm choice made for the previous cook, if any.
    ///
    /// An unreadable stored value counts as no choice.
    pub fn last_alarm_choice(&self) -> Result<Option<bool>> {
        Ok(self
            .kv_get(LAST_ALARM_CHOICE_KEY)?
            .and_then(|v| v.parse::<bool>().ok()))
    }

    pub fn set_last_alarm_choice(&self, enabled: bool) -> Result<()> {
        self.kv_set(LAST_ALARM_CHOICE_KEY, &enabled.to_string())?;
        Ok(())
    }
}

fn corrupt(message: String) -> DatabaseError {
    DatabaseError::CorruptRow {
        table: "cooks".into(),
        message,
    }
}

fn parse_column<T: std::str::FromStr>(value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .parse::<T>()
        .map_err(|e| corrupt(e.to_string()).into())
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| corrupt(format!("bad timestamp '{value}': {e}")).into())
}
