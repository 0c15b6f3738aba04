//! CRUD operations for [`User`] and [`RelationshipHistoryEntry`] records.

use chrono::{DateTime, Utc};
use rusqlite::params;
use uuid::Uuid;

use tandem_shared::types::RelationshipStatus;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{RelationshipHistoryEntry, User};
use crate::sql;

const USER_COLUMNS: &str = "id, pairing_code, display_name, relationship_status, couple_id, \
     mood, mood_updated_at, created_at";

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a new user.  Fails on a pairing-code collision (UNIQUE
    /// constraint); callers regenerate and retry.
    pub fn create_user(&self, user: &User) -> Result<()> {
        self.conn().execute(
            "INSERT INTO users (id, pairing_code, display_name, relationship_status,
                                couple_id, mood, mood_updated_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                user.id.to_string(),
                user.pairing_code,
                user.display_name,
                user.relationship_status.as_str(),
                user.couple_id.map(|c| c.to_string()),
                user.mood,
                user.mood_updated_at.map(|t| t.to_rfc3339()),
                user.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a single user by id.
    pub fn get_user(&self, id: Uuid) -> Result<User> {
        self.conn()
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id.to_string()],
                row_to_user,
            )
            .map_err(not_found)
    }

    /// Resolve a user by their (already normalized) pairing code.
    pub fn get_user_by_code(&self, code: &str) -> Result<Option<User>> {
        let result = self.conn().query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE pairing_code = ?1"),
            params![code],
            row_to_user,
        );
        match result {
            Ok(user) => Ok(Some(user)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(other) => Err(StoreError::Sqlite(other)),
        }
    }

    /// Total number of registered users (admin reporting).
    pub fn count_users(&self) -> Result<i64> {
        let count = self
            .conn()
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(count)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Set or clear a user's mood status.
    pub fn set_user_mood(
        &self,
        user_id: Uuid,
        mood: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.conn().execute(
            "UPDATE users SET mood = ?1, mood_updated_at = ?2 WHERE id = ?3",
            params![mood, now.to_rfc3339(), user_id.to_string()],
        )?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Relationship history (append-only; no update or delete path)
    // ------------------------------------------------------------------

    /// List a user's permanent relationship history, newest first.
    pub fn relationship_history_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<RelationshipHistoryEntry>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, user_id, couple_id, partner_id, partner_name, started_at,
                    ended_at, duration_days, initiated_breakup, created_at
             FROM relationship_history
             WHERE user_id = ?1
             ORDER BY ended_at DESC",
        )?;

        let rows = stmt.query_map(params![user_id.to_string()], row_to_history_entry)?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }
}

fn not_found(e: rusqlite::Error) -> StoreError {
    match e {
        rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
        other => StoreError::Sqlite(other),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Map a `rusqlite::Row` to a [`User`].
pub(crate) fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    let id_str: String = row.get(0)?;
    let pairing_code: String = row.get(1)?;
    let display_name: String = row.get(2)?;
    let status_str: String = row.get(3)?;
    let couple_id_str: Option<String> = row.get(4)?;
    let mood: Option<String> = row.get(5)?;
    let mood_updated_str: Option<String> = row.get(6)?;
    let created_str: String = row.get(7)?;

    Ok(User {
        id: sql::parse_uuid(0, &id_str)?,
        pairing_code,
        display_name,
        relationship_status: sql::parse_enum(
            3,
            &status_str,
            RelationshipStatus::parse,
            "relationship status",
        )?,
        couple_id: sql::parse_uuid_opt(4, couple_id_str)?,
        mood,
        mood_updated_at: sql::parse_ts_opt(6, mood_updated_str)?,
        created_at: sql::parse_ts(7, &created_str)?,
    })
}

/// Map a `rusqlite::Row` to a [`RelationshipHistoryEntry`].
fn row_to_history_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<RelationshipHistoryEntry> {
    let id_str: String = row.get(0)?;
    let user_id_str: String = row.get(1)?;
    let couple_id_str: String = row.get(2)?;
    let partner_id_str: String = row.get(3)?;
    let partner_name: String = row.get(4)?;
    let started_str: String = row.get(5)?;
    let ended_str: String = row.get(6)?;
    let duration_days: i64 = row.get(7)?;
    let initiated: bool = row.get(8)?;
    let created_str: String = row.get(9)?;

    Ok(RelationshipHistoryEntry {
        id: sql::parse_uuid(0, &id_str)?,
        user_id: sql::parse_uuid(1, &user_id_str)?,
        couple_id: sql::parse_uuid(2, &couple_id_str)?,
        partner_id: sql::parse_uuid(3, &partner_id_str)?,
        partner_name,
        started_at: sql::parse_ts(5, &started_str)?,
        ended_at: sql::parse_ts(6, &ended_str)?,
        duration_days,
        initiated_breakup: initiated,
        created_at: sql::parse_ts(9, &created_str)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{new_user, test_db};

    #[test]
    fn test_create_and_fetch_user() {
        let db = test_db();
        let user = new_user(&db, "Ana", "ANAC0DE2");

        let fetched = db.get_user(user.id).unwrap();
        assert_eq!(fetched, user);

        let by_code = db.get_user_by_code("ANAC0DE2").unwrap().unwrap();
        assert_eq!(by_code.id, user.id);

        assert!(db.get_user_by_code("MISSING2").unwrap().is_none());
    }

    #[test]
    fn test_pairing_code_unique() {
        let db = test_db();
        new_user(&db, "Ana", "SAMECODE");

        let dup = User {
            id: Uuid::new_v4(),
            pairing_code: "SAMECODE".into(),
            display_name: "Ben".into(),
            relationship_status: RelationshipStatus::Single,
            couple_id: None,
            mood: None,
            mood_updated_at: None,
            created_at: Utc::now(),
        };
        let err = db.create_user(&dup).unwrap_err();
        assert!(err.is_constraint_violation());
    }

    #[test]
    fn test_set_mood() {
        let db = test_db();
        let user = new_user(&db, "Ana", "ANAC0DE2");

        db.set_user_mood(user.id, Some("sleepy"), Utc::now()).unwrap();
        let fetched = db.get_user(user.id).unwrap();
        assert_eq!(fetched.mood.as_deref(), Some("sleepy"));

        db.set_user_mood(user.id, None, Utc::now()).unwrap();
        assert!(db.get_user(user.id).unwrap().mood.is_none());
    }
}
