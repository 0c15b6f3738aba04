//! CRUD and lifecycle transitions for [`Couple`] records.
//!
//! The multi-entity transitions (accept, reject, dissolve) run as single
//! SQLite transactions guarded by compare-and-set `UPDATE`s on the couple's
//! state, so a concurrent reader never observes a half-applied transition
//! and the second of two racing calls fails cleanly with [`StoreError::NotFound`].

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection};
use uuid::Uuid;

use tandem_shared::consent::ConsentFeature;
use tandem_shared::types::{CoupleState, RequestStatus};

use crate::consent::row_to_ledger;
use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{BreakupReview, Couple, PairingRequest, RelationshipHistoryEntry};
use crate::sql;

pub(crate) const COUPLE_COLUMNS: &str = "id, partner1_id, partner2_id, state, \
     request_initiator_id, request_target_id, request_status, request_created_at, \
     request_resolved_at, paired_at, relationship_started_on, dissolved_at";

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a pending couple together with its two live membership rows.
    ///
    /// The partial unique index on `couple_members` enforces "at most one
    /// pending/active couple per user" at the database level; a constraint
    /// violation here means another live pairing won a concurrent race.
    pub fn create_pending_couple(&mut self, couple: &Couple) -> Result<()> {
        let tx = self.conn_mut().transaction()?;

        tx.execute(
            "INSERT INTO couples (id, partner1_id, partner2_id, state,
                                  request_initiator_id, request_target_id, request_status,
                                  request_created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                couple.id.to_string(),
                couple.partner1_id.to_string(),
                couple.partner2_id.to_string(),
                couple.state.as_str(),
                couple.request.initiator_id.to_string(),
                couple.request.target_id.to_string(),
                couple.request.status.as_str(),
                couple.request.created_at.to_rfc3339(),
            ],
        )?;

        for user_id in [couple.partner1_id, couple.partner2_id] {
            tx.execute(
                "INSERT INTO couple_members (couple_id, user_id, live) VALUES (?1, ?2, 1)",
                params![couple.id.to_string(), user_id.to_string()],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a single couple by id.
    pub fn get_couple(&self, id: Uuid) -> Result<Couple> {
        self.conn()
            .query_row(
                &format!("SELECT {COUPLE_COLUMNS} FROM couples WHERE id = ?1"),
                params![id.to_string()],
                row_to_couple,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// The user's live (pending or active) couple, if any.  At most one can
    /// exist thanks to the membership index.
    pub fn live_couple_for_user(&self, user_id: Uuid) -> Result<Option<Couple>> {
        let result = self.conn().query_row(
            &format!(
                "SELECT {COUPLE_COLUMNS} FROM couples c
                 JOIN couple_members m ON m.couple_id = c.id
                 WHERE m.user_id = ?1 AND m.live = 1"
            ),
            params![user_id.to_string()],
            row_to_couple,
        );
        match result {
            Ok(couple) => Ok(Some(couple)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(other) => Err(StoreError::Sqlite(other)),
        }
    }

    /// Couple counts by lifecycle state (admin reporting).
    pub fn couple_counts_by_state(&self) -> Result<(i64, i64, i64)> {
        let count = |state: CoupleState| -> Result<i64> {
            let n = self.conn().query_row(
                "SELECT COUNT(*) FROM couples WHERE state = ?1",
                params![state.as_str()],
                |row| row.get(0),
            )?;
            Ok(n)
        };
        Ok((
            count(CoupleState::Pending)?,
            count(CoupleState::Active)?,
            count(CoupleState::Dissolved)?,
        ))
    }

    /// Anonymous reviews left for a dissolved couple.
    pub fn breakup_reviews_for_couple(&self, couple_id: Uuid) -> Result<Vec<BreakupReview>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, couple_id, note, created_at
             FROM breakup_reviews WHERE couple_id = ?1 ORDER BY created_at DESC",
        )?;
        let rows = stmt.query_map(params![couple_id.to_string()], row_to_review)?;

        let mut reviews = Vec::new();
        for row in rows {
            reviews.push(row?);
        }
        Ok(reviews)
    }

    // ------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------

    /// PENDING -> ACTIVE, as one atomic unit: couple activated and request
    /// accepted, both users marked paired, a fresh all-false consent ledger
    /// and a zeroed streak counter created.
    ///
    /// The guarded `UPDATE` requires the couple to still be pending with the
    /// responder as the request target; if it matches nothing (already
    /// resolved, wrong responder, or a concurrent accept won) the whole
    /// transaction fails with [`StoreError::NotFound`].
    pub fn accept_pairing_txn(
        &mut self,
        couple_id: Uuid,
        responder_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Couple> {
        let tx = self.conn_mut().transaction()?;

        let affected = tx.execute(
            "UPDATE couples
             SET state = 'active', paired_at = ?1,
                 request_status = 'accepted', request_resolved_at = ?1
             WHERE id = ?2 AND state = 'pending' AND request_target_id = ?3",
            params![
                now.to_rfc3339(),
                couple_id.to_string(),
                responder_id.to_string()
            ],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }

        let couple = get_couple_on(&tx, couple_id)?;

        for user_id in [couple.partner1_id, couple.partner2_id] {
            tx.execute(
                "UPDATE users SET relationship_status = 'paired', couple_id = ?1 WHERE id = ?2",
                params![couple_id.to_string(), user_id.to_string()],
            )?;
        }

        tx.execute(
            "INSERT INTO consent_ledgers (couple_id, created_at) VALUES (?1, ?2)",
            params![couple_id.to_string(), now.to_rfc3339()],
        )?;
        tx.execute(
            "INSERT INTO streak_counters (couple_id) VALUES (?1)",
            params![couple_id.to_string()],
        )?;

        tx.commit()?;
        Ok(couple)
    }

    /// PENDING -> DISSOLVED via rejection.  No user rows change; neither
    /// party was ever paired.  Membership rows are retired so both users
    /// become free to pair again.
    pub fn reject_pairing_txn(
        &mut self,
        couple_id: Uuid,
        responder_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let tx = self.conn_mut().transaction()?;

        let affected = tx.execute(
            "UPDATE couples
             SET state = 'dissolved', dissolved_at = ?1,
                 request_status = 'rejected', request_resolved_at = ?1
             WHERE id = ?2 AND state = 'pending' AND request_target_id = ?3",
            params![
                now.to_rfc3339(),
                couple_id.to_string(),
                responder_id.to_string()
            ],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }

        tx.execute(
            "UPDATE couple_members SET live = 0 WHERE couple_id = ?1",
            params![couple_id.to_string()],
        )?;

        tx.commit()?;
        Ok(())
    }

    /// ACTIVE -> DISSOLVED, the full breakup cascade in one transaction:
    /// shared memories archived, live streak photos expired, all consent
    /// flags revoked (each true->false flip logged, attributed to the flag's
    /// owner), the couple dissolved, one permanent history entry per partner,
    /// both users returned to single, membership retired, and the optional
    /// anonymous review persisted.
    ///
    /// `history` carries the two pre-computed entries; the caller resolves
    /// start date and duration.  Fails with [`StoreError::NotFound`] if the
    /// couple is no longer active (the second of two racing dissolve calls).
    pub fn dissolve_couple_txn(
        &mut self,
        couple: &Couple,
        history: &[RelationshipHistoryEntry],
        note: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let couple_id = couple.id;
        let tx = self.conn_mut().transaction()?;

        let affected = tx.execute(
            "UPDATE couples SET state = 'dissolved', dissolved_at = ?1
             WHERE id = ?2 AND state = 'active'",
            params![now.to_rfc3339(), couple_id.to_string()],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }

        // Archive, never delete, the couple's shared content.
        tx.execute(
            "UPDATE memories SET status = 'archived', updated_at = ?1
             WHERE couple_id = ?2 AND status = 'active'",
            params![now.to_rfc3339(), couple_id.to_string()],
        )?;
        tx.execute(
            "UPDATE ephemeral_items SET is_expired = 1
             WHERE couple_id = ?1 AND is_expired = 0",
            params![couple_id.to_string()],
        )?;

        // Revoke all consent, logging every true->false flip.
        let ledger = tx
            .query_row(
                &format!(
                    "SELECT {} FROM consent_ledgers WHERE couple_id = ?1",
                    crate::consent::LEDGER_COLUMNS
                ),
                params![couple_id.to_string()],
                row_to_ledger,
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(StoreError::Sqlite(other)),
            })?;

        if let Some(ledger) = ledger {
            for (owner_id, flags) in [
                (couple.partner1_id, ledger.partner1),
                (couple.partner2_id, ledger.partner2),
            ] {
                for feature in ConsentFeature::ALL {
                    if flags.get(feature) {
                        tx.execute(
                            "INSERT INTO consent_history
                                 (id, couple_id, user_id, feature, new_value, changed_at)
                             VALUES (?1, ?2, ?3, ?4, 0, ?5)",
                            params![
                                Uuid::new_v4().to_string(),
                                couple_id.to_string(),
                                owner_id.to_string(),
                                feature.as_str(),
                                now.to_rfc3339(),
                            ],
                        )?;
                    }
                }
            }
            tx.execute(
                "UPDATE consent_ledgers
                 SET p1_photo_sharing = 0, p1_memory_access = 0, p1_location_sharing = 0,
                     p2_photo_sharing = 0, p2_memory_access = 0, p2_location_sharing = 0,
                     p1_updated_at = ?1, p2_updated_at = ?1
                 WHERE couple_id = ?2",
                params![now.to_rfc3339(), couple_id.to_string()],
            )?;
        }

        for entry in history {
            tx.execute(
                "INSERT INTO relationship_history
                     (id, user_id, couple_id, partner_id, partner_name, started_at,
                      ended_at, duration_days, initiated_breakup, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    entry.id.to_string(),
                    entry.user_id.to_string(),
                    entry.couple_id.to_string(),
                    entry.partner_id.to_string(),
                    entry.partner_name,
                    entry.started_at.to_rfc3339(),
                    entry.ended_at.to_rfc3339(),
                    entry.duration_days,
                    entry.initiated_breakup,
                    entry.created_at.to_rfc3339(),
                ],
            )?;
        }

        for user_id in [couple.partner1_id, couple.partner2_id] {
            tx.execute(
                "UPDATE users SET relationship_status = 'single', couple_id = NULL WHERE id = ?1",
                params![user_id.to_string()],
            )?;
        }

        tx.execute(
            "UPDATE couple_members SET live = 0 WHERE couple_id = ?1",
            params![couple_id.to_string()],
        )?;

        if let Some(note) = note {
            // No author reference is stored, by design.
            tx.execute(
                "INSERT INTO breakup_reviews (id, couple_id, note, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    Uuid::new_v4().to_string(),
                    couple_id.to_string(),
                    note,
                    now.to_rfc3339(),
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Set the user-supplied relationship start date.  Guarded on the couple
    /// still being active; a no-match fails with [`StoreError::NotFound`].
    pub fn set_relationship_started_on(&self, couple_id: Uuid, date: NaiveDate) -> Result<()> {
        let affected = self.conn().execute(
            "UPDATE couples SET relationship_started_on = ?1
             WHERE id = ?2 AND state = 'active'",
            params![sql::date_str(date), couple_id.to_string()],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn get_couple_on(conn: &Connection, id: Uuid) -> Result<Couple> {
    conn.query_row(
        &format!("SELECT {COUPLE_COLUMNS} FROM couples WHERE id = ?1"),
        params![id.to_string()],
        row_to_couple,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
        other => StoreError::Sqlite(other),
    })
}

/// Map a `rusqlite::Row` to a [`Couple`].
pub(crate) fn row_to_couple(row: &rusqlite::Row<'_>) -> rusqlite::Result<Couple> {
    let id_str: String = row.get(0)?;
    let p1_str: String = row.get(1)?;
    let p2_str: String = row.get(2)?;
    let state_str: String = row.get(3)?;
    let initiator_str: String = row.get(4)?;
    let target_str: String = row.get(5)?;
    let req_status_str: String = row.get(6)?;
    let req_created_str: String = row.get(7)?;
    let req_resolved_str: Option<String> = row.get(8)?;
    let paired_str: Option<String> = row.get(9)?;
    let started_on_str: Option<String> = row.get(10)?;
    let dissolved_str: Option<String> = row.get(11)?;

    Ok(Couple {
        id: sql::parse_uuid(0, &id_str)?,
        partner1_id: sql::parse_uuid(1, &p1_str)?,
        partner2_id: sql::parse_uuid(2, &p2_str)?,
        state: sql::parse_enum(3, &state_str, CoupleState::parse, "couple state")?,
        request: PairingRequest {
            initiator_id: sql::parse_uuid(4, &initiator_str)?,
            target_id: sql::parse_uuid(5, &target_str)?,
            status: sql::parse_enum(6, &req_status_str, RequestStatus::parse, "request status")?,
            created_at: sql::parse_ts(7, &req_created_str)?,
            resolved_at: sql::parse_ts_opt(8, req_resolved_str)?,
        },
        paired_at: sql::parse_ts_opt(9, paired_str)?,
        relationship_started_on: sql::parse_date_opt(10, started_on_str)?,
        dissolved_at: sql::parse_ts_opt(11, dissolved_str)?,
    })
}

fn row_to_review(row: &rusqlite::Row<'_>) -> rusqlite::Result<BreakupReview> {
    let id_str: String = row.get(0)?;
    let couple_id_str: String = row.get(1)?;
    let note: String = row.get(2)?;
    let created_str: String = row.get(3)?;

    Ok(BreakupReview {
        id: sql::parse_uuid(0, &id_str)?,
        couple_id: sql::parse_uuid(1, &couple_id_str)?,
        note,
        created_at: sql::parse_ts(3, &created_str)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{test_db, two_users};
    use tandem_shared::types::RelationshipStatus;

    fn pending_couple(db: &mut Database, initiator: Uuid, target: Uuid) -> Couple {
        let now = Utc::now();
        let couple = Couple {
            id: Uuid::new_v4(),
            partner1_id: initiator,
            partner2_id: target,
            state: CoupleState::Pending,
            request: PairingRequest {
                initiator_id: initiator,
                target_id: target,
                status: RequestStatus::Pending,
                created_at: now,
                resolved_at: None,
            },
            paired_at: None,
            relationship_started_on: None,
            dissolved_at: None,
        };
        db.create_pending_couple(&couple).expect("create couple");
        couple
    }

    #[test]
    fn test_one_live_couple_per_user() {
        let mut db = test_db();
        let (ana, ben) = two_users(&db);
        let cara = crate::testutil::new_user(&db, "Cara", "CCCC4444");

        pending_couple(&mut db, ana.id, ben.id);

        // Ben already has a live membership; a second live couple must be
        // rejected by the partial unique index, not application code.
        let now = Utc::now();
        let second = Couple {
            id: Uuid::new_v4(),
            partner1_id: cara.id,
            partner2_id: ben.id,
            state: CoupleState::Pending,
            request: PairingRequest {
                initiator_id: cara.id,
                target_id: ben.id,
                status: RequestStatus::Pending,
                created_at: now,
                resolved_at: None,
            },
            paired_at: None,
            relationship_started_on: None,
            dissolved_at: None,
        };
        let err = db.create_pending_couple(&second).unwrap_err();
        assert!(err.is_constraint_violation());

        // The failed transaction must not leave a couple row behind.
        assert!(matches!(db.get_couple(second.id), Err(StoreError::NotFound)));
        // Cara is still free to pair.
        assert!(db.live_couple_for_user(cara.id).unwrap().is_none());
    }

    #[test]
    fn test_accept_creates_ledger_and_counter_atomically() {
        let mut db = test_db();
        let (ana, ben) = two_users(&db);
        let couple = pending_couple(&mut db, ana.id, ben.id);

        let accepted = db
            .accept_pairing_txn(couple.id, ben.id, Utc::now())
            .unwrap();
        assert_eq!(accepted.state, CoupleState::Active);
        assert!(accepted.paired_at.is_some());
        assert_eq!(accepted.request.status, RequestStatus::Accepted);

        // Both users flipped to paired.
        for id in [ana.id, ben.id] {
            let user = db.get_user(id).unwrap();
            assert_eq!(user.relationship_status, RelationshipStatus::Paired);
            assert_eq!(user.couple_id, Some(couple.id));
        }

        // Ledger exists, all-false; counter exists, zeroed.
        let ledger = db.get_consent_ledger(couple.id).unwrap().unwrap();
        assert_eq!(ledger.partner1, Default::default());
        assert_eq!(ledger.partner2, Default::default());
        let counter = db.get_streak_counter(couple.id).unwrap();
        assert_eq!(counter.current, 0);
        assert_eq!(counter.best, 0);
    }

    #[test]
    fn test_double_accept_loses() {
        let mut db = test_db();
        let (ana, ben) = two_users(&db);
        let couple = pending_couple(&mut db, ana.id, ben.id);

        db.accept_pairing_txn(couple.id, ben.id, Utc::now()).unwrap();
        let err = db.accept_pairing_txn(couple.id, ben.id, Utc::now());
        assert!(matches!(err, Err(StoreError::NotFound)));
    }

    #[test]
    fn test_accept_requires_matching_target() {
        let mut db = test_db();
        let (ana, ben) = two_users(&db);
        let couple = pending_couple(&mut db, ana.id, ben.id);

        // The initiator cannot accept their own request.
        let err = db.accept_pairing_txn(couple.id, ana.id, Utc::now());
        assert!(matches!(err, Err(StoreError::NotFound)));
    }

    #[test]
    fn test_reject_dissolves_without_touching_users() {
        let mut db = test_db();
        let (ana, ben) = two_users(&db);
        let couple = pending_couple(&mut db, ana.id, ben.id);

        db.reject_pairing_txn(couple.id, ben.id, Utc::now()).unwrap();

        let rejected = db.get_couple(couple.id).unwrap();
        assert_eq!(rejected.state, CoupleState::Dissolved);
        assert_eq!(rejected.request.status, RequestStatus::Rejected);
        assert!(rejected.dissolved_at.is_some());

        for id in [ana.id, ben.id] {
            let user = db.get_user(id).unwrap();
            assert_eq!(user.relationship_status, RelationshipStatus::Single);
            assert!(user.couple_id.is_none());
            assert!(db.live_couple_for_user(id).unwrap().is_none());
        }
    }

    #[test]
    fn test_start_date_guard_requires_active() {
        let mut db = test_db();
        let (ana, ben) = two_users(&db);
        let couple = pending_couple(&mut db, ana.id, ben.id);

        let date = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        assert!(matches!(
            db.set_relationship_started_on(couple.id, date),
            Err(StoreError::NotFound)
        ));

        db.accept_pairing_txn(couple.id, ben.id, Utc::now()).unwrap();
        db.set_relationship_started_on(couple.id, date).unwrap();
        assert_eq!(
            db.get_couple(couple.id).unwrap().relationship_started_on,
            Some(date)
        );
    }
}
