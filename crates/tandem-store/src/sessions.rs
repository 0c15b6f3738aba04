//! CRUD operations for [`Session`] records (bearer tokens).

use chrono::{DateTime, Utc};
use rusqlite::params;
use uuid::Uuid;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::Session;
use crate::sql;

impl Database {
    /// Insert a new session.
    pub fn create_session(&self, session: &Session) -> Result<()> {
        self.conn().execute(
            "INSERT INTO sessions (token, user_id, created_at, last_seen_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                session.token,
                session.user_id.to_string(),
                session.created_at.to_rfc3339(),
                session.last_seen_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Look up a session by token.
    pub fn get_session(&self, token: &str) -> Result<Session> {
        self.conn()
            .query_row(
                "SELECT token, user_id, created_at, last_seen_at
                 FROM sessions WHERE token = ?1",
                params![token],
                row_to_session,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// Stamp a session's `last_seen_at`.
    pub fn touch_session(&self, token: &str, now: DateTime<Utc>) -> Result<()> {
        self.conn().execute(
            "UPDATE sessions SET last_seen_at = ?1 WHERE token = ?2",
            params![now.to_rfc3339(), token],
        )?;
        Ok(())
    }

    /// Delete a session (logout).  Returns `true` if a row was deleted.
    pub fn delete_session(&self, token: &str) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
        Ok(affected > 0)
    }
}

fn row_to_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<Session> {
    let token: String = row.get(0)?;
    let user_id_str: String = row.get(1)?;
    let created_str: String = row.get(2)?;
    let seen_str: String = row.get(3)?;

    Ok(Session {
        token,
        user_id: sql::parse_uuid(1, &user_id_str)?,
        created_at: sql::parse_ts(2, &created_str)?,
        last_seen_at: sql::parse_ts(3, &seen_str)?,
    })
}
