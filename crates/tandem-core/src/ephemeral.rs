//! Ephemeral streak photos.
//!
//! Photos carry a 24-hour TTL and additionally retire the moment the
//! partner views them; whichever trigger fires first wins, and liveness is
//! always re-derived at read time.  Submissions feed the couple's daily
//! streak counter.

use chrono::{Duration, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use tandem_shared::consent::ConsentFeature;
use tandem_shared::constants::{
    MAX_CONTENT_REF_LEN, MAX_LIVE_ITEMS_PER_UPLOADER, STREAK_PHOTO_TTL_HOURS,
};
use tandem_shared::streak::StreakState;

use tandem_store::{EphemeralItem, StoreError, StreakCounter};

use crate::engine::Engine;
use crate::error::{EngineError, Result};
use crate::gate;

/// Outcome of a photo submission: the stored item plus the streak state the
/// submission produced.
#[derive(Debug, Clone, Serialize)]
pub struct PhotoSubmission {
    pub item: EphemeralItem,
    pub streak: StreakState,
}

/// One partner's view of the couple's live photos.
#[derive(Debug, Clone, Serialize)]
pub struct PhotoFeed {
    /// The caller's own most recent live photo.
    pub mine: Option<EphemeralItem>,
    /// The partner's most recent live photo, still unviewed by definition.
    pub from_partner: Option<EphemeralItem>,
    /// All live photos for the couple, newest first.
    pub live: Vec<EphemeralItem>,
    pub streak: StreakState,
}

impl Engine {
    /// Submit a streak photo.  Requires mutual photo-sharing consent and at
    /// most two other live photos from the same uploader.
    pub async fn submit_photo(&self, user_id: Uuid, content_ref: &str) -> Result<PhotoSubmission> {
        let content_ref = content_ref.trim();
        if content_ref.is_empty() {
            return Err(EngineError::Validation("content reference is required".into()));
        }
        if content_ref.len() > MAX_CONTENT_REF_LEN {
            return Err(EngineError::Validation(format!(
                "content reference must be at most {MAX_CONTENT_REF_LEN} characters"
            )));
        }

        let mut db = self.lock().await;
        let grant = gate::authorize(&db, user_id, ConsentFeature::PhotoSharing)?;
        let now = Utc::now();

        if db.count_live_items(user_id, now)? >= MAX_LIVE_ITEMS_PER_UPLOADER {
            return Err(EngineError::ItemLimitReached);
        }

        let item = EphemeralItem {
            id: Uuid::new_v4(),
            couple_id: grant.couple.id,
            uploader_id: user_id,
            content_ref: content_ref.to_string(),
            created_at: now,
            expires_at: now + Duration::hours(STREAK_PHOTO_TTL_HOURS),
            viewed_at: None,
            viewed_by: None,
            is_expired: false,
        };
        let uploader_is_partner1 = grant.couple.is_partner1(user_id);
        let counter = db.submit_item_txn(&item, uploader_is_partner1, now.date_naive())?;

        info!(
            couple = %grant.couple.id,
            uploader = %user_id,
            item = %item.id,
            streak = counter.current,
            "photo submitted"
        );
        Ok(PhotoSubmission {
            item,
            streak: counter.state(),
        })
    }

    /// View the partner's photo, retiring it immediately.  Any way the item
    /// can be unavailable (absent, another couple's, already viewed, past
    /// TTL) reads the same from outside; only viewing your own upload is
    /// called out separately.
    pub async fn view_photo(&self, user_id: Uuid, item_id: Uuid) -> Result<EphemeralItem> {
        let db = self.lock().await;
        let grant = gate::authorize(&db, user_id, ConsentFeature::PhotoSharing)?;
        let now = Utc::now();

        let item = db.get_ephemeral_item(item_id).map_err(item_not_found)?;
        if item.couple_id != grant.couple.id {
            return Err(EngineError::ItemNotFound);
        }
        if item.uploader_id == user_id {
            return Err(EngineError::CannotViewOwnItem);
        }

        // The guarded update re-checks liveness; a concurrent expiry or an
        // earlier view surfaces here.
        db.mark_item_viewed(item.id, user_id, now)
            .map_err(item_not_found)?;

        info!(couple = %grant.couple.id, viewer = %user_id, item = %item.id, "photo viewed");
        Ok(EphemeralItem {
            viewed_at: Some(now),
            viewed_by: Some(user_id),
            is_expired: true,
            ..item
        })
    }

    /// The caller's photo feed: both sides' live photos plus the streak.
    pub async fn photo_feed(&self, user_id: Uuid) -> Result<PhotoFeed> {
        let db = self.lock().await;
        let grant = gate::authorize(&db, user_id, ConsentFeature::PhotoSharing)?;
        let now = Utc::now();

        let live = db.live_items_for_couple(grant.couple.id, now)?;
        let mine = live.iter().find(|i| i.uploader_id == user_id).cloned();
        let from_partner = live.iter().find(|i| i.uploader_id != user_id).cloned();
        let streak = db.get_streak_counter(grant.couple.id)?.state();

        Ok(PhotoFeed {
            mine,
            from_partner,
            live,
            streak,
        })
    }

    /// The couple's streak counter.  Gated like every other photo surface:
    /// the counter only exists because of photo submissions.
    pub async fn streak(&self, user_id: Uuid) -> Result<StreakCounter> {
        let db = self.lock().await;
        let grant = gate::authorize(&db, user_id, ConsentFeature::PhotoSharing)?;
        Ok(db.get_streak_counter(grant.couple.id)?)
    }

    /// Background sweep: flag all past-TTL photos.  Returns how many rows
    /// were touched.
    pub async fn expire_overdue(&self) -> Result<usize> {
        let db = self.lock().await;
        Ok(db.expire_overdue_items(Utc::now())?)
    }
}

fn item_not_found(e: StoreError) -> EngineError {
    match e {
        StoreError::NotFound => EngineError::ItemNotFound,
        other => EngineError::Store(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{paired_couple, paired_couple_with_photos, register};
    use chrono::NaiveDate;

    #[tokio::test]
    async fn test_submission_requires_mutual_consent() {
        let (engine, ana, _ben, _couple) = paired_couple().await;

        assert!(matches!(
            engine.submit_photo(ana.id, "photos/day1").await,
            Err(EngineError::ConsentRequired(ConsentFeature::PhotoSharing))
        ));
    }

    #[tokio::test]
    async fn test_streak_read_requires_mutual_consent() {
        let (engine, ana, ben, _couple) = paired_couple().await;

        // One-sided consent is not enough to read the counter.
        engine
            .update_consent(
                ana.id,
                crate::consent::ConsentUpdate {
                    photo_sharing: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(matches!(
            engine.streak(ana.id).await,
            Err(EngineError::ConsentRequired(ConsentFeature::PhotoSharing))
        ));

        engine
            .update_consent(
                ben.id,
                crate::consent::ConsentUpdate {
                    photo_sharing: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let counter = engine.streak(ana.id).await.unwrap();
        assert_eq!(counter.current, 0);
    }

    #[tokio::test]
    async fn test_scenario_daily_exchange() {
        let (engine, ana, ben, _couple) = paired_couple_with_photos().await;

        let hers = engine.submit_photo(ana.id, "photos/ana-day1").await.unwrap();
        assert_eq!(hers.streak.current, 0);

        let his = engine.submit_photo(ben.id, "photos/ben-day1").await.unwrap();
        assert_eq!(his.streak.current, 1);
        assert_eq!(his.streak.best, 1);

        // Each partner sees the other's photo in their feed.
        let feed = engine.photo_feed(ana.id).await.unwrap();
        assert_eq!(feed.mine.as_ref().map(|i| i.id), Some(hers.item.id));
        assert_eq!(feed.from_partner.as_ref().map(|i| i.id), Some(his.item.id));
        assert_eq!(feed.live.len(), 2);

        // Viewing retires the photo for good.
        let viewed = engine.view_photo(ana.id, his.item.id).await.unwrap();
        assert_eq!(viewed.viewed_by, Some(ana.id));
        assert!(matches!(
            engine.view_photo(ana.id, his.item.id).await,
            Err(EngineError::ItemNotFound)
        ));
        let feed = engine.photo_feed(ana.id).await.unwrap();
        assert!(feed.from_partner.is_none());

        // The streak survives the photos' retirement.
        assert_eq!(feed.streak.current, 1);
    }

    #[tokio::test]
    async fn test_consecutive_day_advances_and_gap_resets() {
        let (engine, ana, ben, couple) = paired_couple_with_photos().await;
        let today = Utc::now().date_naive();

        // Back-date an established streak ending yesterday.
        {
            let db = engine.db().lock().await;
            let mut counter = db.get_streak_counter(couple.id).unwrap();
            counter.current = 4;
            counter.best = 9;
            counter.last_qualifying_day = Some(today - Duration::days(1));
            db.overwrite_streak_counter(&counter).unwrap();
        }

        engine.submit_photo(ana.id, "photos/a").await.unwrap();
        let result = engine.submit_photo(ben.id, "photos/b").await.unwrap();
        assert_eq!(result.streak.current, 5);
        assert_eq!(result.streak.best, 9);

        // A stale qualifying day resets to 1, never 0.
        {
            let db = engine.db().lock().await;
            let mut counter = db.get_streak_counter(couple.id).unwrap();
            counter.last_qualifying_day = Some(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
            counter.partner1_last_submitted_at = None;
            counter.partner2_last_submitted_at = None;
            db.overwrite_streak_counter(&counter).unwrap();
        }
        engine.submit_photo(ana.id, "photos/a2").await.unwrap();
        let result = engine.submit_photo(ben.id, "photos/b2").await.unwrap();
        assert_eq!(result.streak.current, 1);
        assert_eq!(result.streak.best, 9);
    }

    #[tokio::test]
    async fn test_live_item_cap_is_per_uploader() {
        let (engine, ana, ben, _couple) = paired_couple_with_photos().await;

        for n in 0..MAX_LIVE_ITEMS_PER_UPLOADER {
            engine
                .submit_photo(ana.id, &format!("photos/{n}"))
                .await
                .unwrap();
        }
        assert!(matches!(
            engine.submit_photo(ana.id, "photos/overflow").await,
            Err(EngineError::ItemLimitReached)
        ));
        // The cap does not bleed onto the partner.
        engine.submit_photo(ben.id, "photos/fine").await.unwrap();

        // A view frees a slot.
        let feed = engine.photo_feed(ben.id).await.unwrap();
        let from_ana = feed.from_partner.unwrap();
        engine.view_photo(ben.id, from_ana.id).await.unwrap();
        engine.submit_photo(ana.id, "photos/again").await.unwrap();
    }

    #[tokio::test]
    async fn test_own_and_foreign_items_are_unviewable() {
        let (engine, ana, ben, _couple) = paired_couple_with_photos().await;

        let submission = engine.submit_photo(ana.id, "photos/mine").await.unwrap();
        assert!(matches!(
            engine.view_photo(ana.id, submission.item.id).await,
            Err(EngineError::CannotViewOwnItem)
        ));

        assert!(matches!(
            engine.view_photo(ben.id, Uuid::new_v4()).await,
            Err(EngineError::ItemNotFound)
        ));

        // A member of another couple gets the same answer as a missing item,
        // even for a real id.
        let cara = register(&engine, "Cara").await;
        let dan = register(&engine, "Dan").await;
        let pending = engine
            .request_pairing(cara.id, &dan.pairing_code)
            .await
            .unwrap();
        engine.accept_pairing(dan.id, pending.id).await.unwrap();
        for user in [&cara, &dan] {
            engine
                .update_consent(
                    user.id,
                    crate::consent::ConsentUpdate {
                        photo_sharing: Some(true),
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
        }
        assert!(matches!(
            engine.view_photo(cara.id, submission.item.id).await,
            Err(EngineError::ItemNotFound)
        ));
    }

    #[tokio::test]
    async fn test_past_ttl_photo_is_invisible() {
        let (engine, ana, ben, _couple) = paired_couple_with_photos().await;

        let submission = engine.submit_photo(ana.id, "photos/stale").await.unwrap();
        {
            let db = engine.db().lock().await;
            db.overwrite_item_expiry(submission.item.id, Utc::now() - Duration::minutes(1))
                .unwrap();
        }

        let feed = engine.photo_feed(ben.id).await.unwrap();
        assert!(feed.live.is_empty());
        assert!(matches!(
            engine.view_photo(ben.id, submission.item.id).await,
            Err(EngineError::ItemNotFound)
        ));

        assert_eq!(engine.expire_overdue().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_content_ref_validation() {
        let (engine, ana, _ben, _couple) = paired_couple_with_photos().await;

        assert!(matches!(
            engine.submit_photo(ana.id, "   ").await,
            Err(EngineError::Validation(_))
        ));
        let oversized = "x".repeat(MAX_CONTENT_REF_LEN + 1);
        assert!(matches!(
            engine.submit_photo(ana.id, &oversized).await,
            Err(EngineError::Validation(_))
        ));
    }
}
