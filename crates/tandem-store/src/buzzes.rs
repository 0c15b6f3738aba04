//! CRUD operations for [`Buzz`] records (the poll-based walkie-talkie).

use chrono::{DateTime, Utc};
use rusqlite::params;
use uuid::Uuid;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::Buzz;
use crate::sql;

impl Database {
    /// Insert a new buzz.
    pub fn insert_buzz(&self, buzz: &Buzz) -> Result<()> {
        self.conn().execute(
            "INSERT INTO buzzes (id, couple_id, sender_id, voice_ref, sent_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                buzz.id.to_string(),
                buzz.couple_id.to_string(),
                buzz.sender_id.to_string(),
                buzz.voice_ref,
                buzz.sent_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Unseen buzzes addressed to `recipient_id` (sent by the partner),
    /// newest first.  This is the polling endpoint's query.
    pub fn unseen_buzzes_for_user(
        &self,
        couple_id: Uuid,
        recipient_id: Uuid,
    ) -> Result<Vec<Buzz>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, couple_id, sender_id, voice_ref, sent_at, seen_at
             FROM buzzes
             WHERE couple_id = ?1 AND sender_id != ?2 AND seen_at IS NULL
             ORDER BY sent_at DESC",
        )?;
        let rows = stmt.query_map(
            params![couple_id.to_string(), recipient_id.to_string()],
            row_to_buzz,
        )?;

        let mut buzzes = Vec::new();
        for row in rows {
            buzzes.push(row?);
        }
        Ok(buzzes)
    }

    /// Mark a buzz seen.  Guarded so only the recipient within the owning
    /// couple can acknowledge it, and only once.
    pub fn mark_buzz_seen(
        &self,
        buzz_id: Uuid,
        couple_id: Uuid,
        recipient_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let affected = self.conn().execute(
            "UPDATE buzzes SET seen_at = ?1
             WHERE id = ?2 AND couple_id = ?3 AND sender_id != ?4 AND seen_at IS NULL",
            params![
                now.to_rfc3339(),
                buzz_id.to_string(),
                couple_id.to_string(),
                recipient_id.to_string()
            ],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

fn row_to_buzz(row: &rusqlite::Row<'_>) -> rusqlite::Result<Buzz> {
    let id_str: String = row.get(0)?;
    let couple_id_str: String = row.get(1)?;
    let sender_id_str: String = row.get(2)?;
    let voice_ref: Option<String> = row.get(3)?;
    let sent_str: String = row.get(4)?;
    let seen_str: Option<String> = row.get(5)?;

    Ok(Buzz {
        id: sql::parse_uuid(0, &id_str)?,
        couple_id: sql::parse_uuid(1, &couple_id_str)?,
        sender_id: sql::parse_uuid(2, &sender_id_str)?,
        voice_ref,
        sent_at: sql::parse_ts(4, &sent_str)?,
        seen_at: sql::parse_ts_opt(5, seen_str)?,
    })
}
