use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, types::Type, Connection, Row};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use tracing::debug;

use crate::language::PracticeLanguage;
use crate::session::PracticeResult;

pub const DEFAULT_HISTORY_LIMIT: usize = 50;
pub const MAX_HISTORY_LIMIT: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("history database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("history export failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("history io error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid history entry: {0}")]
    Invalid(&'static str),
}

/// A persisted practice result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: i64,
    #[serde(flatten)]
    pub result: PracticeResult,
    pub created_at: DateTime<Utc>,
}

/// Where finished attempts go
pub trait HistoryStore {
    fn append(&self, result: &PracticeResult) -> Result<HistoryEntry, HistoryError>;
    /// Most recent first. A `limit` of 0 means the default page size.
    fn list(&self, limit: usize, offset: usize) -> Result<Vec<HistoryEntry>, HistoryError>;
    fn clear(&self) -> Result<(), HistoryError>;
}

/// Clamp a requested page size into `1..=MAX_HISTORY_LIMIT`
pub fn effective_limit(limit: usize) -> usize {
    match limit {
        0 => DEFAULT_HISTORY_LIMIT,
        n => n.min(MAX_HISTORY_LIMIT),
    }
}

fn validate(result: &PracticeResult) -> Result<(), HistoryError> {
    if result.accuracy > 100 {
        return Err(HistoryError::Invalid("accuracy must be between 0 and 100"));
    }
    if i64::try_from(result.time).is_err() {
        return Err(HistoryError::Invalid("time is out of range"));
    }
    Ok(())
}

fn to_text(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_ts(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let text: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&text)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn entry_from_row(row: &Row) -> rusqlite::Result<HistoryEntry> {
    let language: String = row.get(1)?;
    let language = language
        .parse::<PracticeLanguage>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))?;

    let time: i64 = row.get(5)?;

    Ok(HistoryEntry {
        id: row.get(0)?,
        result: PracticeResult {
            language,
            wpm: row.get(2)?,
            accuracy: row.get(3)?,
            errors: row.get(4)?,
            time: time.max(0) as u64,
            date: parse_ts(row, 6)?,
        },
        created_at: parse_ts(row, 7)?,
    })
}

/// History kept in a local SQLite file
#[derive(Debug)]
pub struct SqliteHistory {
    conn: Connection,
}

impl SqliteHistory {
    pub fn open(path: &Path) -> Result<Self, HistoryError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        debug!(path = %path.display(), "history database opened");
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, HistoryError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, HistoryError> {
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS practice_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                language TEXT NOT NULL,
                wpm INTEGER NOT NULL,
                accuracy INTEGER NOT NULL CHECK (accuracy BETWEEN 0 AND 100),
                errors INTEGER NOT NULL,
                duration_seconds INTEGER NOT NULL,
                completed_at TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_practice_history_completed_at ON practice_history(completed_at)",
            [],
        )?;

        Ok(Self { conn })
    }
}

impl HistoryStore for SqliteHistory {
    fn append(&self, result: &PracticeResult) -> Result<HistoryEntry, HistoryError> {
        validate(result)?;
        let created_at = Utc::now();

        self.conn.execute(
            r#"
            INSERT INTO practice_history
            (language, wpm, accuracy, errors, duration_seconds, completed_at, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                result.language.as_str(),
                result.wpm,
                result.accuracy,
                result.errors,
                result.time as i64,
                to_text(&result.date),
                to_text(&created_at),
            ],
        )?;

        let entry = HistoryEntry {
            id: self.conn.last_insert_rowid(),
            result: result.clone(),
            created_at,
        };
        debug!(id = entry.id, "history entry stored");
        Ok(entry)
    }

    fn list(&self, limit: usize, offset: usize) -> Result<Vec<HistoryEntry>, HistoryError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, language, wpm, accuracy, errors, duration_seconds, completed_at, created_at
            FROM practice_history
            ORDER BY completed_at DESC, id DESC
            LIMIT ?1 OFFSET ?2
            "#,
        )?;

        let rows = stmt.query_map(
            params![effective_limit(limit) as i64, offset as i64],
            entry_from_row,
        )?;

        let mut entries = Vec::new();
        for entry in rows {
            entries.push(entry?);
        }
        Ok(entries)
    }

    fn clear(&self) -> Result<(), HistoryError> {
        let removed = self.conn.execute("DELETE FROM practice_history", [])?;
        debug!(removed, "history cleared");
        Ok(())
    }
}

#[derive(Serialize)]
struct CsvRow<'a> {
    id: i64,
    language: PracticeLanguage,
    wpm: u32,
    accuracy: u32,
    errors: u32,
    time: u64,
    date: &'a str,
}

/// Write entries as CSV with a header row
pub fn export_csv<W: io::Write>(entries: &[HistoryEntry], writer: W) -> Result<(), HistoryError> {
    let mut wtr = csv::Writer::from_writer(writer);
    for entry in entries {
        let date = entry.result.date.to_rfc3339_opts(SecondsFormat::Secs, true);
        wtr.serialize(CsvRow {
            id: entry.id,
            language: entry.result.language,
            wpm: entry.result.wpm,
            accuracy: entry.result.accuracy,
            errors: entry.result.errors,
            time: entry.result.time,
            date: &date,
        })?;
    }
    wtr.flush()?;
    Ok(())
}
