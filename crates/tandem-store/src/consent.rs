//! CRUD operations for [`ConsentLedger`] records and the append-only
//! consent history.
//!
//! History rows are written once and never updated or truncated; that makes
//! them safe for audit export.

use chrono::{DateTime, Utc};
use rusqlite::params;
use uuid::Uuid;

use tandem_shared::consent::{ConsentFeature, ConsentFlags};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{ConsentHistoryEntry, ConsentLedger};
use crate::sql;

pub(crate) const LEDGER_COLUMNS: &str = "couple_id, \
     p1_photo_sharing, p1_memory_access, p1_location_sharing, \
     p2_photo_sharing, p2_memory_access, p2_location_sharing, \
     p1_updated_at, p2_updated_at, created_at";

/// Column name for one partner's flag.  Both inputs are fixed enums; no user
/// data reaches the SQL text.
fn flag_column(partner1: bool, feature: ConsentFeature) -> &'static str {
    match (partner1, feature) {
        (true, ConsentFeature::PhotoSharing) => "p1_photo_sharing",
        (true, ConsentFeature::MemoryAccess) => "p1_memory_access",
        (true, ConsentFeature::LocationSharing) => "p1_location_sharing",
        (false, ConsentFeature::PhotoSharing) => "p2_photo_sharing",
        (false, ConsentFeature::MemoryAccess) => "p2_memory_access",
        (false, ConsentFeature::LocationSharing) => "p2_location_sharing",
    }
}

impl Database {
    /// Fetch the consent ledger for a couple, if one exists.
    pub fn get_consent_ledger(&self, couple_id: Uuid) -> Result<Option<ConsentLedger>> {
        let result = self.conn().query_row(
            &format!("SELECT {LEDGER_COLUMNS} FROM consent_ledgers WHERE couple_id = ?1"),
            params![couple_id.to_string()],
            row_to_ledger,
        );
        match result {
            Ok(ledger) => Ok(Some(ledger)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(other) => Err(StoreError::Sqlite(other)),
        }
    }

    /// Create an all-false ledger.  Normally done inside the accept
    /// transaction; also used as a lazy repair path for legacy rows.
    pub fn create_consent_ledger(&self, couple_id: Uuid, now: DateTime<Utc>) -> Result<()> {
        self.conn().execute(
            "INSERT INTO consent_ledgers (couple_id, created_at) VALUES (?1, ?2)",
            params![couple_id.to_string(), now.to_rfc3339()],
        )?;
        Ok(())
    }

    /// Apply a batch of flag changes for one partner: each flag is written,
    /// that partner's `updated_at` is stamped, and one history entry is
    /// appended per change — all in a single transaction.
    ///
    /// Callers pass only flags that actually differ from the stored value;
    /// no-op toggles must not reach the audit log.
    pub fn apply_consent_changes(
        &mut self,
        couple_id: Uuid,
        user_id: Uuid,
        partner1: bool,
        changes: &[(ConsentFeature, bool)],
        now: DateTime<Utc>,
    ) -> Result<()> {
        if changes.is_empty() {
            return Ok(());
        }

        let tx = self.conn_mut().transaction()?;

        for (feature, value) in changes {
            let column = flag_column(partner1, *feature);
            tx.execute(
                &format!("UPDATE consent_ledgers SET {column} = ?1 WHERE couple_id = ?2"),
                params![value, couple_id.to_string()],
            )?;
            tx.execute(
                "INSERT INTO consent_history (id, couple_id, user_id, feature, new_value, changed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    Uuid::new_v4().to_string(),
                    couple_id.to_string(),
                    user_id.to_string(),
                    feature.as_str(),
                    value,
                    now.to_rfc3339(),
                ],
            )?;
        }

        let stamp_column = if partner1 { "p1_updated_at" } else { "p2_updated_at" };
        tx.execute(
            &format!("UPDATE consent_ledgers SET {stamp_column} = ?1 WHERE couple_id = ?2"),
            params![now.to_rfc3339(), couple_id.to_string()],
        )?;

        tx.commit()?;
        Ok(())
    }

    /// The couple's consent audit log, newest first.
    pub fn consent_history_for_couple(
        &self,
        couple_id: Uuid,
        limit: u32,
    ) -> Result<Vec<ConsentHistoryEntry>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, couple_id, user_id, feature, new_value, changed_at
             FROM consent_history
             WHERE couple_id = ?1
             ORDER BY changed_at DESC
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![couple_id.to_string(), limit], row_to_history)?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }

    /// Total history size across all couples (admin reporting).
    pub fn count_consent_history(&self) -> Result<i64> {
        let count = self
            .conn()
            .query_row("SELECT COUNT(*) FROM consent_history", [], |row| row.get(0))?;
        Ok(count)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Map a `rusqlite::Row` to a [`ConsentLedger`].
pub(crate) fn row_to_ledger(row: &rusqlite::Row<'_>) -> rusqlite::Result<ConsentLedger> {
    let couple_id_str: String = row.get(0)?;
    let partner1 = ConsentFlags {
        photo_sharing: row.get(1)?,
        memory_access: row.get(2)?,
        location_sharing: row.get(3)?,
    };
    let partner2 = ConsentFlags {
        photo_sharing: row.get(4)?,
        memory_access: row.get(5)?,
        location_sharing: row.get(6)?,
    };
    let p1_updated_str: Option<String> = row.get(7)?;
    let p2_updated_str: Option<String> = row.get(8)?;
    let created_str: String = row.get(9)?;

    Ok(ConsentLedger {
        couple_id: sql::parse_uuid(0, &couple_id_str)?,
        partner1,
        partner2,
        partner1_updated_at: sql::parse_ts_opt(7, p1_updated_str)?,
        partner2_updated_at: sql::parse_ts_opt(8, p2_updated_str)?,
        created_at: sql::parse_ts(9, &created_str)?,
    })
}

fn row_to_history(row: &rusqlite::Row<'_>) -> rusqlite::Result<ConsentHistoryEntry> {
    let id_str: String = row.get(0)?;
    let couple_id_str: String = row.get(1)?;
    let user_id_str: String = row.get(2)?;
    let feature_str: String = row.get(3)?;
    let new_value: bool = row.get(4)?;
    let changed_str: String = row.get(5)?;

    Ok(ConsentHistoryEntry {
        id: sql::parse_uuid(0, &id_str)?,
        couple_id: sql::parse_uuid(1, &couple_id_str)?,
        user_id: sql::parse_uuid(2, &user_id_str)?,
        feature: sql::parse_enum(3, &feature_str, ConsentFeature::parse, "consent feature")?,
        new_value,
        changed_at: sql::parse_ts(5, &changed_str)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{active_couple, test_db};

    #[test]
    fn test_apply_changes_updates_flags_and_history() {
        let mut db = test_db();
        let (couple_id, ana_id, _ben_id) = active_couple(&mut db);

        db.apply_consent_changes(
            couple_id,
            ana_id,
            true,
            &[
                (ConsentFeature::PhotoSharing, true),
                (ConsentFeature::LocationSharing, true),
            ],
            Utc::now(),
        )
        .unwrap();

        let ledger = db.get_consent_ledger(couple_id).unwrap().unwrap();
        assert!(ledger.partner1.photo_sharing);
        assert!(ledger.partner1.location_sharing);
        assert!(!ledger.partner1.memory_access);
        assert!(ledger.partner1_updated_at.is_some());
        assert!(ledger.partner2_updated_at.is_none());

        let history = db.consent_history_for_couple(couple_id, 50).unwrap();
        assert_eq!(history.len(), 2);
        assert!(history.iter().all(|e| e.user_id == ana_id && e.new_value));
    }

    #[test]
    fn test_empty_change_set_is_a_no_op() {
        let mut db = test_db();
        let (couple_id, ana_id, _) = active_couple(&mut db);

        db.apply_consent_changes(couple_id, ana_id, true, &[], Utc::now())
            .unwrap();

        let ledger = db.get_consent_ledger(couple_id).unwrap().unwrap();
        assert!(ledger.partner1_updated_at.is_none());
        assert!(db.consent_history_for_couple(couple_id, 50).unwrap().is_empty());
    }
}
