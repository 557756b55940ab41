//! SQLite transcript log of completed exchanges

use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use crate::error::{Error, Result};

/// One audited exchange
#[derive(Debug, Clone)]
pub struct TranscriptRow {
    /// Row ID, monotonically increasing per insert
    pub id: i64,

    /// Conversation the exchange belongs to
    pub subject: String,

    /// What the user sent
    pub message: String,

    /// What the agent replied
    pub reply: String,

    /// When the exchange completed
    pub created_at: DateTime<Utc>,
}

/// Insert-only audit log. Rows are never updated or deleted; losing a row
/// to a write failure is tolerated and left to the caller to log.
pub struct TranscriptStore {
    conn: Arc<Mutex<Connection>>,
}

impl TranscriptStore {
    /// Open (or create) the transcript database at `path`
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // Initialize schema
        conn.execute_batch(include_str!("schema.sql"))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Record one completed exchange, returning its row ID
    pub fn append(&self, subject: &str, message: &str, reply: &str) -> Result<i64> {
        let conn = self.conn.lock().map_err(|e| Error::store(e.to_string()))?;

        conn.execute(
            "INSERT INTO transcripts (subject, message, reply, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![subject, message, reply, Utc::now().to_rfc3339()],
        )?;

        Ok(conn.last_insert_rowid())
    }

    /// The most recent `limit` exchanges for a subject, newest first
    pub fn recent(&self, subject: &str, limit: usize) -> Result<Vec<TranscriptRow>> {
        let conn = self.conn.lock().map_err(|e| Error::store(e.to_string()))?;

        let mut stmt = conn.prepare(
            r#"
            SELECT id, subject, message, reply, created_at
            FROM transcripts WHERE subject = ?1
            ORDER BY id DESC LIMIT ?2
            "#,
        )?;

        let rows = stmt.query_map(params![subject, limit as i64], |row| {
            Ok(RawRow {
                id: row.get(0)?,
                subject: row.get(1)?,
                message: row.get(2)?,
                reply: row.get(3)?,
                created_at: row.get(4)?,
            })
        })?;

        let mut transcripts = Vec::new();
        for row in rows {
            transcripts.push(row?.into_transcript()?);
        }

        Ok(transcripts)
    }

    /// Total number of recorded exchanges for a subject
    pub fn count(&self, subject: &str) -> Result<u64> {
        let conn = self.conn.lock().map_err(|e| Error::store(e.to_string()))?;

        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM transcripts WHERE subject = ?1",
            params![subject],
            |row| row.get(0),
        )?;

        Ok(count as u64)
    }
}

/// Intermediate struct for reading from SQLite
struct RawRow {
    id: i64,
    subject: String,
    message: String,
    reply: String,
    created_at: String,
}

impl RawRow {
    fn into_transcript(self) -> Result<TranscriptRow> {
        Ok(TranscriptRow {
            id: self.id,
            subject: self.subject,
            message: self.message,
            reply: self.reply,
            created_at: chrono::DateTime::parse_from_rfc3339(&self.created_at)
                .map(|dt| dt.with_timezone(&chrono::Utc))
                .map_err(|e| Error::store(e.to_string()))?,
        })
    }
}
