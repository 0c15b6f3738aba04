//! CRUD operations for [`Memory`] records.
//!
//! Memories carry a soft-delete lifecycle (`active` / `archived` /
//! `deleted`): queries default to active rows, delete is a status
//! transition, and dissolution archives the whole couple's set.

use chrono::{DateTime, Utc};
use rusqlite::params;
use uuid::Uuid;

use tandem_shared::types::MemoryStatus;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::Memory;
use crate::sql;

const MEMORY_COLUMNS: &str = "id, couple_id, author_id, title, body, photo_ref, \
     happened_on, status, created_at, updated_at";

impl Database {
    /// Insert a new memory.
    pub fn create_memory(&self, memory: &Memory) -> Result<()> {
        self.conn().execute(
            "INSERT INTO memories (id, couple_id, author_id, title, body, photo_ref,
                                   happened_on, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                memory.id.to_string(),
                memory.couple_id.to_string(),
                memory.author_id.to_string(),
                memory.title,
                memory.body,
                memory.photo_ref,
                memory.happened_on.map(sql::date_str),
                memory.status.as_str(),
                memory.created_at.to_rfc3339(),
                memory.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Fetch a single memory by id, regardless of status.
    pub fn get_memory(&self, id: Uuid) -> Result<Memory> {
        self.conn()
            .query_row(
                &format!("SELECT {MEMORY_COLUMNS} FROM memories WHERE id = ?1"),
                params![id.to_string()],
                row_to_memory,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// List a couple's active memories, newest first.  Archived and deleted
    /// rows are retained but invisible here.
    pub fn list_active_memories(&self, couple_id: Uuid) -> Result<Vec<Memory>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {MEMORY_COLUMNS} FROM memories
             WHERE couple_id = ?1 AND status = 'active'
             ORDER BY created_at DESC"
        ))?;
        let rows = stmt.query_map(params![couple_id.to_string()], row_to_memory)?;

        let mut memories = Vec::new();
        for row in rows {
            memories.push(row?);
        }
        Ok(memories)
    }

    /// Update a memory's editable fields.
    pub fn update_memory(
        &self,
        id: Uuid,
        title: &str,
        body: &str,
        photo_ref: Option<&str>,
        happened_on: Option<chrono::NaiveDate>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let affected = self.conn().execute(
            "UPDATE memories
             SET title = ?1, body = ?2, photo_ref = ?3, happened_on = ?4, updated_at = ?5
             WHERE id = ?6 AND status = 'active'",
            params![
                title,
                body,
                photo_ref,
                happened_on.map(sql::date_str),
                now.to_rfc3339(),
                id.to_string(),
            ],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    /// Soft-delete: a status transition, never a row removal.
    pub fn set_memory_status(
        &self,
        id: Uuid,
        status: MemoryStatus,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let affected = self.conn().execute(
            "UPDATE memories SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![status.as_str(), now.to_rfc3339(), id.to_string()],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

/// Map a `rusqlite::Row` to a [`Memory`].
fn row_to_memory(row: &rusqlite::Row<'_>) -> rusqlite::Result<Memory> {
    let id_str: String = row.get(0)?;
    let couple_id_str: String = row.get(1)?;
    let author_id_str: String = row.get(2)?;
    let title: String = row.get(3)?;
    let body: String = row.get(4)?;
    let photo_ref: Option<String> = row.get(5)?;
    let happened_str: Option<String> = row.get(6)?;
    let status_str: String = row.get(7)?;
    let created_str: String = row.get(8)?;
    let updated_str: String = row.get(9)?;

    Ok(Memory {
        id: sql::parse_uuid(0, &id_str)?,
        couple_id: sql::parse_uuid(1, &couple_id_str)?,
        author_id: sql::parse_uuid(2, &author_id_str)?,
        title,
        body,
        photo_ref,
        happened_on: sql::parse_date_opt(6, happened_str)?,
        status: sql::parse_enum(7, &status_str, MemoryStatus::parse, "memory status")?,
        created_at: sql::parse_ts(8, &created_str)?,
        updated_at: sql::parse_ts(9, &updated_str)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{active_couple, test_db};

    fn memory(couple_id: Uuid, author_id: Uuid) -> Memory {
        let now = Utc::now();
        Memory {
            id: Uuid::new_v4(),
            couple_id,
            author_id,
            title: "First trip".into(),
            body: "We went to the coast".into(),
            photo_ref: None,
            happened_on: None,
            status: MemoryStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_soft_delete_hides_but_retains() {
        let mut db = test_db();
        let (couple_id, ana_id, _) = active_couple(&mut db);

        let m = memory(couple_id, ana_id);
        db.create_memory(&m).unwrap();
        assert_eq!(db.list_active_memories(couple_id).unwrap().len(), 1);

        db.set_memory_status(m.id, MemoryStatus::Deleted, Utc::now())
            .unwrap();
        assert!(db.list_active_memories(couple_id).unwrap().is_empty());

        // The row itself still exists.
        let fetched = db.get_memory(m.id).unwrap();
        assert_eq!(fetched.status, MemoryStatus::Deleted);
    }

    #[test]
    fn test_update_requires_active_status() {
        let mut db = test_db();
        let (couple_id, ana_id, _) = active_couple(&mut db);

        let m = memory(couple_id, ana_id);
        db.create_memory(&m).unwrap();
        db.set_memory_status(m.id, MemoryStatus::Archived, Utc::now())
            .unwrap();

        let err = db.update_memory(m.id, "New", "Body", None, None, Utc::now());
        assert!(matches!(err, Err(StoreError::NotFound)));
    }
}
