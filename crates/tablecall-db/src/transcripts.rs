//! Call transcript persistence.

use rusqlite::{params, Connection, OptionalExtension, Row};
use tablecall_types::{new_document_id, Transcript};

use crate::error::StoreError;

/// Parameters for inserting a transcript.
#[derive(Debug, Clone)]
pub struct NewTranscript {
    pub restaurant_id: String,
    pub caller_id: String,
    pub call_text: String,
    /// RFC 3339 creation timestamp.
    pub timestamp: String,
}

fn map_row_to_transcript(row: &Row) -> rusqlite::Result<Transcript> {
    Ok(Transcript {
        id: row.get(0)?,
        restaurant_id: row.get(1)?,
        order_id: row.get(2)?,
        caller_id: row.get(3)?,
        call_text: row.get(4)?,
        timestamp: row.get(5)?,
    })
}

/// Inserts a transcript without an order link.
pub fn insert_transcript(
    conn: &Connection,
    transcript: &NewTranscript,
) -> Result<Transcript, StoreError> {
    let id = new_document_id();
    conn.execute(
        "INSERT INTO transcripts (id, restaurant_id, caller_id, call_text, timestamp)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            id,
            transcript.restaurant_id,
            transcript.caller_id,
            transcript.call_text,
            transcript.timestamp,
        ],
    )?;

    Ok(Transcript {
        id,
        restaurant_id: transcript.restaurant_id.clone(),
        order_id: None,
        caller_id: transcript.caller_id.clone(),
        call_text: transcript.call_text.clone(),
        timestamp: transcript.timestamp.clone(),
    })
}

/// Writes `order_id` onto a transcript.
///
/// The link is write-once: the update only matches a transcript whose
/// `order_id` is still empty.
///
/// # Errors
///
/// Returns `StoreError::TranscriptNotFound` if no such transcript exists and
/// `StoreError::TranscriptAlreadyLinked` if it already references an order.
pub fn link_order(conn: &Connection, transcript_id: &str, order_id: &str) -> Result<(), StoreError> {
    let updated = conn.execute(
        "UPDATE transcripts SET order_id = ?1 WHERE id = ?2 AND order_id IS NULL",
        params![order_id, transcript_id],
    )?;
    if updated == 1 {
        return Ok(());
    }

    match get_transcript(conn, transcript_id)? {
        Some(_) => Err(StoreError::TranscriptAlreadyLinked(
            transcript_id.to_string(),
        )),
        None => Err(StoreError::TranscriptNotFound(transcript_id.to_string())),
    }
}

/// Loads a transcript by id.
pub fn get_transcript(conn: &Connection, id: &str) -> Result<Option<Transcript>, StoreError> {
    Ok(conn
        .query_row(
            "SELECT id, restaurant_id, order_id, caller_id, call_text, timestamp
             FROM transcripts WHERE id = ?1",
            [id],
            map_row_to_transcript,
        )
        .optional()?)
}

/// Lists a restaurant's transcripts, oldest first.
pub fn list_transcripts(
    conn: &Connection,
    restaurant_id: &str,
) -> Result<Vec<Transcript>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, restaurant_id, order_id, caller_id, call_text, timestamp
         FROM transcripts WHERE restaurant_id = ?1 ORDER BY timestamp ASC, rowid ASC",
    )?;
    let rows = stmt.query_map([restaurant_id], map_row_to_transcript)?;

    let mut transcripts = Vec::new();
    for row in rows {
        transcripts.push(row?);
    }
    Ok(transcripts)
}
