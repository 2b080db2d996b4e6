//! Conversation transcripts and uploaded context files.
//!
//! Both tables are append-only from the service's point of view: entries
//! are inserted and listed per user, never edited. Listing order is part of
//! the contract. Transcript history is returned oldest first with insertion
//! order breaking timestamp ties, so a client that logs lines in sequence
//! reads them back in the same sequence.

pub mod upload;

pub use upload::{sanitize_filename, to_markdown};

use parley_types::{TranscriptEntry, TranscriptRole, UploadSummary, UploadedFile};
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row};
use thiserror::Error;

/// Errors from transcript and upload queries.
#[derive(Debug, Error)]
pub enum TranscriptError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("message must not be empty")]
    EmptyMessage,
}

/// Appends one line to a user's conversation history.
pub fn append_entry(
    conn: &Connection,
    user_id: &str,
    role: TranscriptRole,
    message: &str,
) -> Result<TranscriptEntry, TranscriptError> {
    if message.trim().is_empty() {
        return Err(TranscriptError::EmptyMessage);
    }

    let entry = conn.query_row(
        "INSERT INTO conversations (user_id, message, role) VALUES (?1, ?2, ?3)
         RETURNING id, user_id, role, message, timestamp",
        params![user_id, message, role.as_str()],
        map_row_to_entry,
    )?;

    tracing::debug!(user_id, role = role.as_str(), id = entry.id, "transcript entry stored");
    Ok(entry)
}

/// Lists a user's conversation history, oldest first.
pub fn list_entries(
    conn: &Connection,
    user_id: &str,
) -> Result<Vec<TranscriptEntry>, TranscriptError> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, role, message, timestamp
         FROM conversations
         WHERE user_id = ?1
         ORDER BY timestamp ASC, id ASC",
    )?;

    let rows = stmt.query_map([user_id], map_row_to_entry)?;
    let mut entries = Vec::new();
    for row in rows {
        entries.push(row?);
    }
    Ok(entries)
}

/// Stores an uploaded file's derived markdown.
pub fn save_upload(
    conn: &Connection,
    user_id: &str,
    filename: &str,
    content_markdown: &str,
) -> Result<UploadedFile, TranscriptError> {
    let file = conn.query_row(
        "INSERT INTO uploaded_files (user_id, filename, content_markdown) VALUES (?1, ?2, ?3)
         RETURNING id, user_id, filename, content_markdown, timestamp",
        params![user_id, filename, content_markdown],
        |row| {
            Ok(UploadedFile {
                id: row.get(0)?,
                user_id: row.get(1)?,
                filename: row.get(2)?,
                content_markdown: row.get(3)?,
                timestamp: row.get(4)?,
            })
        },
    )?;
    Ok(file)
}

/// Lists a user's uploads, newest first.
pub fn list_uploads(
    conn: &Connection,
    user_id: &str,
) -> Result<Vec<UploadSummary>, TranscriptError> {
    let mut stmt = conn.prepare(
        "SELECT id, filename, timestamp
         FROM uploaded_files
         WHERE user_id = ?1
         ORDER BY timestamp DESC, id DESC",
    )?;

    let rows = stmt.query_map([user_id], |row| {
        Ok(UploadSummary {
            id: row.get(0)?,
            filename: row.get(1)?,
            timestamp: row.get(2)?,
        })
    })?;

    let mut uploads = Vec::new();
    for row in rows {
        uploads.push(row?);
    }
    Ok(uploads)
}

fn map_row_to_entry(row: &Row) -> rusqlite::Result<TranscriptEntry> {
    let role: String = row.get(2)?;
    let role = role
        .parse::<TranscriptRole>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;

    Ok(TranscriptEntry {
        id: row.get(0)?,
        user_id: row.get(1)?,
        role,
        message: row.get(3)?,
        timestamp: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().expect("in-memory db");
        parley_db::run_migrations(&conn).expect("migrations");
        conn
    }

    #[test]
    fn empty_messages_are_rejected() {
        let conn = conn();
        let err = append_entry(&conn, "u-1", TranscriptRole::User, "   ").unwrap_err();
        assert!(matches!(err, TranscriptError::EmptyMessage));
    }

    #[test]
    fn appended_entry_echoes_stored_fields() {
        let conn = conn();
        let entry = append_entry(&conn, "u-1", TranscriptRole::System, "Call started").unwrap();
        assert_eq!(entry.user_id, "u-1");
        assert_eq!(entry.role, TranscriptRole::System);
        assert_eq!(entry.message, "Call started");
        assert!(entry.timestamp.ends_with('Z'), "timestamp: {}", entry.timestamp);
    }
}
