//! CRUD operations for [`LocationPin`] records.
//!
//! One row per (couple, partner); position updates are upserts.

use rusqlite::params;
use uuid::Uuid;

use crate::database::Database;
use crate::error::Result;
use crate::models::LocationPin;
use crate::sql;

impl Database {
    /// Insert or replace a partner's last known position.
    pub fn upsert_location(&self, pin: &LocationPin) -> Result<()> {
        self.conn().execute(
            "INSERT INTO locations (couple_id, user_id, latitude, longitude, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(couple_id, user_id)
             DO UPDATE SET latitude = ?3, longitude = ?4, updated_at = ?5",
            params![
                pin.couple_id.to_string(),
                pin.user_id.to_string(),
                pin.latitude,
                pin.longitude,
                pin.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Both partners' last known positions (0, 1, or 2 rows).
    pub fn locations_for_couple(&self, couple_id: Uuid) -> Result<Vec<LocationPin>> {
        let mut stmt = self.conn().prepare(
            "SELECT couple_id, user_id, latitude, longitude, updated_at
             FROM locations WHERE couple_id = ?1",
        )?;
        let rows = stmt.query_map(params![couple_id.to_string()], row_to_pin)?;

        let mut pins = Vec::new();
        for row in rows {
            pins.push(row?);
        }
        Ok(pins)
    }
}

fn row_to_pin(row: &rusqlite::Row<'_>) -> rusqlite::Result<LocationPin> {
    let couple_id_str: String = row.get(0)?;
    let user_id_str: String = row.get(1)?;
    let latitude: f64 = row.get(2)?;
    let longitude: f64 = row.get(3)?;
    let updated_str: String = row.get(4)?;

    Ok(LocationPin {
        couple_id: sql::parse_uuid(0, &couple_id_str)?,
        user_id: sql::parse_uuid(1, &user_id_str)?,
        latitude,
        longitude,
        updated_at: sql::parse_ts(4, &updated_str)?,
    })
}
