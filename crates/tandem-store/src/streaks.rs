//! Ephemeral items (streak photos) and the per-couple streak counter.
//!
//! Expiry is enforced at read time: a live item satisfies
//! `is_expired = 0 AND expires_at > now`.  The periodic sweep that flags
//! past-TTL rows is an optimization only, never a correctness requirement.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::params;
use uuid::Uuid;

use tandem_shared::streak;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{EphemeralItem, StreakCounter};
use crate::sql;

const ITEM_COLUMNS: &str = "id, couple_id, uploader_id, content_ref, created_at, \
     expires_at, viewed_at, viewed_by, is_expired";

impl Database {
    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch one item by id.
    pub fn get_ephemeral_item(&self, id: Uuid) -> Result<EphemeralItem> {
        self.conn()
            .query_row(
                &format!("SELECT {ITEM_COLUMNS} FROM ephemeral_items WHERE id = ?1"),
                params![id.to_string()],
                row_to_item,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// Number of live items a given uploader currently has.
    pub fn count_live_items(&self, uploader_id: Uuid, now: DateTime<Utc>) -> Result<i64> {
        let count = self.conn().query_row(
            "SELECT COUNT(*) FROM ephemeral_items
             WHERE uploader_id = ?1 AND is_expired = 0 AND expires_at > ?2",
            params![uploader_id.to_string(), now.to_rfc3339()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// All of a couple's live items, newest first.
    pub fn live_items_for_couple(
        &self,
        couple_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<EphemeralItem>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {ITEM_COLUMNS} FROM ephemeral_items
             WHERE couple_id = ?1 AND is_expired = 0 AND expires_at > ?2
             ORDER BY created_at DESC"
        ))?;
        let rows = stmt.query_map(
            params![couple_id.to_string(), now.to_rfc3339()],
            row_to_item,
        )?;

        let mut items = Vec::new();
        for row in rows {
            items.push(row?);
        }
        Ok(items)
    }

    /// Fetch the couple's streak counter.
    pub fn get_streak_counter(&self, couple_id: Uuid) -> Result<StreakCounter> {
        self.conn()
            .query_row(
                "SELECT couple_id, current, best, last_qualifying_day,
                        p1_last_submitted_at, p2_last_submitted_at
                 FROM streak_counters WHERE couple_id = ?1",
                params![couple_id.to_string()],
                row_to_counter,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    // ------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------

    /// Insert a new item and update the streak counter, in one transaction:
    /// the uploader's last-submission timestamp is stamped, and when both
    /// partners' last submissions now fall on `today` the streak advances
    /// (increment on a consecutive day, reset to 1 otherwise, same-day
    /// no-op).  The read-then-write on the counter stays inside the
    /// transaction so simultaneous submissions cannot lose an update.
    pub fn submit_item_txn(
        &mut self,
        item: &EphemeralItem,
        uploader_is_partner1: bool,
        today: NaiveDate,
    ) -> Result<StreakCounter> {
        let tx = self.conn_mut().transaction()?;

        tx.execute(
            "INSERT INTO ephemeral_items
                 (id, couple_id, uploader_id, content_ref, created_at, expires_at, is_expired)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0)",
            params![
                item.id.to_string(),
                item.couple_id.to_string(),
                item.uploader_id.to_string(),
                item.content_ref,
                item.created_at.to_rfc3339(),
                item.expires_at.to_rfc3339(),
            ],
        )?;

        let column = if uploader_is_partner1 {
            "p1_last_submitted_at"
        } else {
            "p2_last_submitted_at"
        };
        tx.execute(
            &format!("UPDATE streak_counters SET {column} = ?1 WHERE couple_id = ?2"),
            params![item.created_at.to_rfc3339(), item.couple_id.to_string()],
        )?;

        let mut counter = tx
            .query_row(
                "SELECT couple_id, current, best, last_qualifying_day,
                        p1_last_submitted_at, p2_last_submitted_at
                 FROM streak_counters WHERE couple_id = ?1",
                params![item.couple_id.to_string()],
                row_to_counter,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })?;

        let both_today = streak::submitted_on(counter.partner1_last_submitted_at, today)
            && streak::submitted_on(counter.partner2_last_submitted_at, today);
        if both_today {
            let next = streak::advance(&counter.state(), today);
            tx.execute(
                "UPDATE streak_counters
                 SET current = ?1, best = ?2, last_qualifying_day = ?3
                 WHERE couple_id = ?4",
                params![
                    next.current,
                    next.best,
                    next.last_qualifying_day.map(sql::date_str),
                    item.couple_id.to_string(),
                ],
            )?;
            counter.current = next.current;
            counter.best = next.best;
            counter.last_qualifying_day = next.last_qualifying_day;
        }

        tx.commit()?;
        Ok(counter)
    }

    /// Record a view and retire the item immediately.  Guarded on the item
    /// still being live; returns [`StoreError::NotFound`] when the guard
    /// matches nothing (already viewed, past TTL, or absent).
    pub fn mark_item_viewed(
        &self,
        item_id: Uuid,
        viewer_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let affected = self.conn().execute(
            "UPDATE ephemeral_items
             SET viewed_at = ?1, viewed_by = ?2, is_expired = 1
             WHERE id = ?3 AND is_expired = 0 AND expires_at > ?1",
            params![
                now.to_rfc3339(),
                viewer_id.to_string(),
                item_id.to_string()
            ],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    /// Flag all past-TTL rows as expired.  Background sweep only; read
    /// paths filter on `expires_at` regardless.
    pub fn expire_overdue_items(&self, now: DateTime<Utc>) -> Result<usize> {
        let affected = self.conn().execute(
            "UPDATE ephemeral_items SET is_expired = 1
             WHERE is_expired = 0 AND expires_at <= ?1",
            params![now.to_rfc3339()],
        )?;
        Ok(affected)
    }

    /// Back-date counter state.  Test-support hook for exercising the
    /// day-boundary logic without mocking the clock.
    pub fn overwrite_streak_counter(&self, counter: &StreakCounter) -> Result<()> {
        self.conn().execute(
            "UPDATE streak_counters
             SET current = ?1, best = ?2, last_qualifying_day = ?3,
                 p1_last_submitted_at = ?4, p2_last_submitted_at = ?5
             WHERE couple_id = ?6",
            params![
                counter.current,
                counter.best,
                counter.last_qualifying_day.map(sql::date_str),
                counter.partner1_last_submitted_at.map(|t| t.to_rfc3339()),
                counter.partner2_last_submitted_at.map(|t| t.to_rfc3339()),
                counter.couple_id.to_string(),
            ],
        )?;
        Ok(())
    }

    /// Back-date an item's expiry.  Test-support hook.
    pub fn overwrite_item_expiry(&self, item_id: Uuid, expires_at: DateTime<Utc>) -> Result<()> {
        self.conn().execute(
            "UPDATE ephemeral_items SET expires_at = ?1 WHERE id = ?2",
            params![expires_at.to_rfc3339(), item_id.to_string()],
        )?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn row_to_item(row: &rusqlite::Row<'_>) -> rusqlite::Result<EphemeralItem> {
    let id_str: String = row.get(0)?;
    let couple_id_str: String = row.get(1)?;
    let uploader_id_str: String = row.get(2)?;
    let content_ref: String = row.get(3)?;
    let created_str: String = row.get(4)?;
    let expires_str: String = row.get(5)?;
    let viewed_str: Option<String> = row.get(6)?;
    let viewed_by_str: Option<String> = row.get(7)?;
    let is_expired: bool = row.get(8)?;

    Ok(EphemeralItem {
        id: sql::parse_uuid(0, &id_str)?,
        couple_id: sql::parse_uuid(1, &couple_id_str)?,
        uploader_id: sql::parse_uuid(2, &uploader_id_str)?,
        content_ref,
        created_at: sql::parse_ts(4, &created_str)?,
        expires_at: sql::parse_ts(5, &expires_str)?,
        viewed_at: sql::parse_ts_opt(6, viewed_str)?,
        viewed_by: sql::parse_uuid_opt(7, viewed_by_str)?,
        is_expired,
    })
}

fn row_to_counter(row: &rusqlite::Row<'_>) -> rusqlite::Result<StreakCounter> {
    let couple_id_str: String = row.get(0)?;
    let current: u32 = row.get(1)?;
    let best: u32 = row.get(2)?;
    let day_str: Option<String> = row.get(3)?;
    let p1_str: Option<String> = row.get(4)?;
    let p2_str: Option<String> = row.get(5)?;

    Ok(StreakCounter {
        couple_id: sql::parse_uuid(0, &couple_id_str)?,
        current,
        best,
        last_qualifying_day: sql::parse_date_opt(3, day_str)?,
        partner1_last_submitted_at: sql::parse_ts_opt(4, p1_str)?,
        partner2_last_submitted_at: sql::parse_ts_opt(5, p2_str)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{active_couple, test_db};
    use chrono::Duration;

    fn item(couple_id: Uuid, uploader_id: Uuid, now: DateTime<Utc>) -> EphemeralItem {
        EphemeralItem {
            id: Uuid::new_v4(),
            couple_id,
            uploader_id,
            content_ref: "photos/abc123".into(),
            created_at: now,
            expires_at: now + Duration::hours(24),
            viewed_at: None,
            viewed_by: None,
            is_expired: false,
        }
    }

    #[test]
    fn test_single_partner_submission_does_not_advance_streak() {
        let mut db = test_db();
        let (couple_id, ana_id, _) = active_couple(&mut db);
        let now = Utc::now();

        let counter = db
            .submit_item_txn(&item(couple_id, ana_id, now), true, now.date_naive())
            .unwrap();
        assert_eq!(counter.current, 0);
        assert!(counter.last_qualifying_day.is_none());
        assert!(counter.partner1_last_submitted_at.is_some());
    }

    #[test]
    fn test_both_partners_today_starts_streak() {
        let mut db = test_db();
        let (couple_id, ana_id, ben_id) = active_couple(&mut db);
        let now = Utc::now();
        let today = now.date_naive();

        db.submit_item_txn(&item(couple_id, ana_id, now), true, today)
            .unwrap();
        let counter = db
            .submit_item_txn(&item(couple_id, ben_id, now), false, today)
            .unwrap();

        assert_eq!(counter.current, 1);
        assert_eq!(counter.best, 1);
        assert_eq!(counter.last_qualifying_day, Some(today));
    }

    #[test]
    fn test_same_day_resubmission_does_not_double_count() {
        let mut db = test_db();
        let (couple_id, ana_id, ben_id) = active_couple(&mut db);
        let now = Utc::now();
        let today = now.date_naive();

        db.submit_item_txn(&item(couple_id, ana_id, now), true, today)
            .unwrap();
        db.submit_item_txn(&item(couple_id, ben_id, now), false, today)
            .unwrap();
        let counter = db
            .submit_item_txn(&item(couple_id, ana_id, now), true, today)
            .unwrap();

        assert_eq!(counter.current, 1);
    }

    #[test]
    fn test_view_retires_item_once() {
        let mut db = test_db();
        let (couple_id, ana_id, ben_id) = active_couple(&mut db);
        let now = Utc::now();

        let photo = item(couple_id, ana_id, now);
        db.submit_item_txn(&photo, true, now.date_naive()).unwrap();

        db.mark_item_viewed(photo.id, ben_id, now).unwrap();
        let viewed = db.get_ephemeral_item(photo.id).unwrap();
        assert!(viewed.is_expired);
        assert_eq!(viewed.viewed_by, Some(ben_id));

        // Second view loses the guard.
        assert!(matches!(
            db.mark_item_viewed(photo.id, ben_id, now),
            Err(StoreError::NotFound)
        ));
    }

    #[test]
    fn test_past_ttl_item_is_gone_at_read_time() {
        let mut db = test_db();
        let (couple_id, ana_id, ben_id) = active_couple(&mut db);
        let now = Utc::now();

        let photo = item(couple_id, ana_id, now);
        db.submit_item_txn(&photo, true, now.date_naive()).unwrap();
        db.overwrite_item_expiry(photo.id, now - Duration::minutes(1))
            .unwrap();

        // Live listings and the view guard treat it as gone even though no
        // sweep has run.
        assert!(db.live_items_for_couple(couple_id, now).unwrap().is_empty());
        assert!(matches!(
            db.mark_item_viewed(photo.id, ben_id, now),
            Err(StoreError::NotFound)
        ));
        assert_eq!(db.count_live_items(ana_id, now).unwrap(), 0);

        // The sweep flags it afterwards.
        assert_eq!(db.expire_overdue_items(now).unwrap(), 1);
        assert!(db.get_ephemeral_item(photo.id).unwrap().is_expired);
    }
}
