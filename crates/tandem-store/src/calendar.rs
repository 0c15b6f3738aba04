//! CRUD operations for [`CalendarEvent`] records.

use rusqlite::params;
use uuid::Uuid;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::CalendarEvent;
use crate::sql;

impl Database {
    /// Insert a new calendar event.
    pub fn create_calendar_event(&self, event: &CalendarEvent) -> Result<()> {
        self.conn().execute(
            "INSERT INTO calendar_events (id, couple_id, author_id, title, note, starts_on, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                event.id.to_string(),
                event.couple_id.to_string(),
                event.author_id.to_string(),
                event.title,
                event.note,
                sql::date_str(event.starts_on),
                event.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// List a couple's events, soonest first.
    pub fn calendar_events_for_couple(&self, couple_id: Uuid) -> Result<Vec<CalendarEvent>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, couple_id, author_id, title, note, starts_on, created_at
             FROM calendar_events
             WHERE couple_id = ?1
             ORDER BY starts_on ASC",
        )?;
        let rows = stmt.query_map(params![couple_id.to_string()], row_to_event)?;

        let mut events = Vec::new();
        for row in rows {
            events.push(row?);
        }
        Ok(events)
    }

    /// Delete an event.  Guarded on the owning couple so one couple cannot
    /// delete another's event by id.
    pub fn delete_calendar_event(&self, event_id: Uuid, couple_id: Uuid) -> Result<()> {
        let affected = self.conn().execute(
            "DELETE FROM calendar_events WHERE id = ?1 AND couple_id = ?2",
            params![event_id.to_string(), couple_id.to_string()],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

fn row_to_event(row: &rusqlite::Row<'_>) -> rusqlite::Result<CalendarEvent> {
    let id_str: String = row.get(0)?;
    let couple_id_str: String = row.get(1)?;
    let author_id_str: String = row.get(2)?;
    let title: String = row.get(3)?;
    let note: Option<String> = row.get(4)?;
    let starts_str: String = row.get(5)?;
    let created_str: String = row.get(6)?;

    Ok(CalendarEvent {
        id: sql::parse_uuid(0, &id_str)?,
        couple_id: sql::parse_uuid(1, &couple_id_str)?,
        author_id: sql::parse_uuid(2, &author_id_str)?,
        title,
        note,
        starts_on: sql::parse_date(5, &starts_str)?,
        created_at: sql::parse_ts(6, &created_str)?,
    })
}
