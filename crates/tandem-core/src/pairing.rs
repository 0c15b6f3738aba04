//! The pairing state machine.
//!
//! Couple lifecycle: `NONE` (no row) -> `PENDING` -> `ACTIVE` -> `DISSOLVED`,
//! with rejection moving `PENDING` straight to `DISSOLVED`.  Transitions run
//! as single store transactions guarded by compare-and-set updates, and the
//! membership index enforces "one live couple per user" in the database.

use chrono::{NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use tandem_shared::constants::MAX_BREAKUP_NOTE_LEN;
use tandem_shared::pairing_code;
use tandem_shared::types::{CoupleState, RelationshipStatus, RequestStatus};

use crate::engine::Engine;
use crate::error::{EngineError, Result};

use tandem_store::{Couple, PairingRequest, RelationshipHistoryEntry, StoreError, User};

/// A user's current pairing situation, as returned by
/// [`Engine::pairing_status`].  `couple` covers both an incoming/outgoing
/// pending request and an active relationship.
#[derive(Debug, Clone, Serialize)]
pub struct PairingStatus {
    pub relationship_status: RelationshipStatus,
    pub couple: Option<Couple>,
    pub partner: Option<User>,
}

impl Engine {
    /// Send a pairing request to the user owning `target_code`.
    ///
    /// Creates the couple row eagerly, in `PENDING`, with the request
    /// embedded.  Fails when either side already has a live couple, when the
    /// code resolves to nobody (or to the initiator), or when this exact
    /// pair already has a pending request.
    pub async fn request_pairing(&self, initiator_id: Uuid, target_code: &str) -> Result<Couple> {
        let mut db = self.lock().await;

        if db.live_couple_for_user(initiator_id)?.is_some() {
            return Err(EngineError::AlreadyPaired);
        }

        let code = pairing_code::normalize(target_code);
        if !pairing_code::is_valid(&code) {
            return Err(EngineError::TargetNotFound);
        }
        let target = db
            .get_user_by_code(&code)?
            .ok_or(EngineError::TargetNotFound)?;
        if target.id == initiator_id {
            return Err(EngineError::SelfPairing);
        }

        if let Some(existing) = db.live_couple_for_user(target.id)? {
            if existing.state == CoupleState::Pending && existing.includes(initiator_id) {
                return Err(EngineError::DuplicateRequest);
            }
            return Err(EngineError::TargetAlreadyPaired);
        }

        let now = Utc::now();
        let couple = Couple {
            id: Uuid::new_v4(),
            partner1_id: initiator_id,
            partner2_id: target.id,
            state: CoupleState::Pending,
            request: PairingRequest {
                initiator_id,
                target_id: target.id,
                status: RequestStatus::Pending,
                created_at: now,
                resolved_at: None,
            },
            paired_at: None,
            relationship_started_on: None,
            dissolved_at: None,
        };

        // The membership index backstops any race that slipped past the
        // checks above.
        db.create_pending_couple(&couple).map_err(|e| {
            if e.is_constraint_violation() {
                EngineError::DuplicateRequest
            } else {
                EngineError::Store(e)
            }
        })?;

        info!(couple = %couple.id, initiator = %initiator_id, target = %target.id, "pairing requested");
        Ok(couple)
    }

    /// Accept a pending request addressed to `responder_id`.
    ///
    /// One atomic unit: couple -> `ACTIVE` with the pairing date stamped,
    /// both users marked paired, a fresh all-false consent ledger and a
    /// zeroed streak counter created.  The second of two racing accepts
    /// fails with [`EngineError::RequestNotFound`].
    pub async fn accept_pairing(&self, responder_id: Uuid, couple_id: Uuid) -> Result<Couple> {
        let mut db = self.lock().await;

        let couple = db
            .accept_pairing_txn(couple_id, responder_id, Utc::now())
            .map_err(request_not_found)?;

        info!(couple = %couple.id, responder = %responder_id, "pairing accepted");
        Ok(couple)
    }

    /// Reject a pending request addressed to `responder_id`.  The couple
    /// moves straight to `DISSOLVED`; neither user's state changes, since
    /// neither was ever paired.
    pub async fn reject_pairing(&self, responder_id: Uuid, couple_id: Uuid) -> Result<()> {
        let mut db = self.lock().await;

        db.reject_pairing_txn(couple_id, responder_id, Utc::now())
            .map_err(request_not_found)?;

        info!(couple = %couple_id, responder = %responder_id, "pairing rejected");
        Ok(())
    }

    /// Dissolve the initiator's active couple: archive shared content,
    /// revoke all consent, write one permanent history entry per partner,
    /// return both users to single, and persist the optional fully-anonymous
    /// note.  All in one transaction.
    pub async fn dissolve(&self, initiator_id: Uuid, note: Option<&str>) -> Result<()> {
        let note = match note.map(str::trim) {
            Some("") | None => None,
            Some(n) if n.chars().count() > MAX_BREAKUP_NOTE_LEN => {
                return Err(EngineError::Validation(format!(
                    "note must be at most {MAX_BREAKUP_NOTE_LEN} characters"
                )));
            }
            Some(n) => Some(n),
        };

        let mut db = self.lock().await;

        let couple = db
            .live_couple_for_user(initiator_id)?
            .ok_or(EngineError::NoActiveRelationship)?;
        if couple.state != CoupleState::Active {
            return Err(EngineError::RelationshipNotActive);
        }

        let partner1 = db.get_user(couple.partner1_id)?;
        let partner2 = db.get_user(couple.partner2_id)?;

        let now = Utc::now();
        // The explicit relationship start date wins over the pairing date
        // when set; duration is whole elapsed days, rounded down.
        let started_at = match couple.relationship_started_on {
            Some(date) => date.and_time(NaiveTime::MIN).and_utc(),
            None => couple.paired_at.unwrap_or(couple.request.created_at),
        };
        let duration_days = (now - started_at).num_days().max(0);

        let history: Vec<RelationshipHistoryEntry> = [(&partner1, &partner2), (&partner2, &partner1)]
            .into_iter()
            .map(|(user, partner)| RelationshipHistoryEntry {
                id: Uuid::new_v4(),
                user_id: user.id,
                couple_id: couple.id,
                partner_id: partner.id,
                partner_name: partner.display_name.clone(),
                started_at,
                ended_at: now,
                duration_days,
                initiated_breakup: user.id == initiator_id,
                created_at: now,
            })
            .collect();

        db.dissolve_couple_txn(&couple, &history, note, now)
            .map_err(|e| match e {
                StoreError::NotFound => EngineError::RelationshipNotActive,
                other => EngineError::Store(other),
            })?;

        info!(
            couple = %couple.id,
            initiator = %initiator_id,
            duration_days,
            "couple dissolved"
        );
        Ok(())
    }

    /// Set the user-supplied relationship start date.  Allowed only while
    /// the couple is active, and only to a past-or-present date.  Never
    /// rewrites history entries created by an earlier dissolution.
    pub async fn set_relationship_start_date(&self, user_id: Uuid, date: NaiveDate) -> Result<()> {
        if date > Utc::now().date_naive() {
            return Err(EngineError::Validation(
                "relationship start date cannot be in the future".into(),
            ));
        }

        let db = self.lock().await;
        let couple = db
            .live_couple_for_user(user_id)?
            .ok_or(EngineError::NoActiveRelationship)?;
        if couple.state != CoupleState::Active {
            return Err(EngineError::RelationshipNotActive);
        }

        db.set_relationship_started_on(couple.id, date)
            .map_err(|e| match e {
                StoreError::NotFound => EngineError::RelationshipNotActive,
                other => EngineError::Store(other),
            })
    }

    /// The user's current pairing situation, reconciled defensively: a user
    /// marked paired whose couple is missing or dissolved is reported (not
    /// persisted) as single, so a crash between the writes of an old
    /// transition can never resurrect a dead relationship on read.
    pub async fn pairing_status(&self, user_id: Uuid) -> Result<PairingStatus> {
        let db = self.lock().await;

        let user = db.get_user(user_id)?;
        let couple = db.live_couple_for_user(user_id)?;

        let effective_status = match (&user.relationship_status, &couple) {
            (RelationshipStatus::Paired, Some(c)) if c.state == CoupleState::Active => {
                RelationshipStatus::Paired
            }
            (RelationshipStatus::Paired, _) => {
                warn!(user = %user_id, "paired user without an active couple; reading as single");
                RelationshipStatus::Single
            }
            (status, _) => *status,
        };

        let partner = match &couple {
            Some(c) => match c.partner_of(user_id) {
                Some(partner_id) => Some(db.get_user(partner_id)?),
                None => None,
            },
            None => None,
        };

        Ok(PairingStatus {
            relationship_status: effective_status,
            couple,
            partner,
        })
    }

    /// The user's permanent relationship history, newest first.  Entries
    /// survive dissolution and are never deleted.
    pub async fn relationship_history(&self, user_id: Uuid) -> Result<Vec<RelationshipHistoryEntry>> {
        let db = self.lock().await;
        Ok(db.relationship_history_for_user(user_id)?)
    }
}

fn request_not_found(e: StoreError) -> EngineError {
    match e {
        StoreError::NotFound => EngineError::RequestNotFound,
        other => EngineError::Store(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{paired_couple, register, test_engine};

    #[tokio::test]
    async fn test_scenario_request_then_accept() {
        let engine = test_engine();
        let ana = register(&engine, "Ana").await;
        let ben = register(&engine, "Ben").await;

        let pending = engine
            .request_pairing(ana.id, &ben.pairing_code)
            .await
            .unwrap();
        assert_eq!(pending.state, CoupleState::Pending);
        assert_eq!(pending.request.initiator_id, ana.id);

        let active = engine.accept_pairing(ben.id, pending.id).await.unwrap();
        assert_eq!(active.state, CoupleState::Active);
        assert!(active.paired_at.is_some());

        // A fresh all-false ledger exists for this couple.
        let db = engine.db().lock().await;
        let ledger = db.get_consent_ledger(active.id).unwrap().unwrap();
        assert_eq!(ledger.partner1, Default::default());
        assert_eq!(ledger.partner2, Default::default());
    }

    #[tokio::test]
    async fn test_request_preconditions() {
        let engine = test_engine();
        let ana = register(&engine, "Ana").await;
        let ben = register(&engine, "Ben").await;
        let cara = register(&engine, "Cara").await;

        assert!(matches!(
            engine.request_pairing(ana.id, &ana.pairing_code).await,
            Err(EngineError::SelfPairing)
        ));
        assert!(matches!(
            engine.request_pairing(ana.id, "ZZZZ9999").await,
            Err(EngineError::TargetNotFound)
        ));

        engine
            .request_pairing(ana.id, &ben.pairing_code)
            .await
            .unwrap();

        // The initiator now has a live couple.
        assert!(matches!(
            engine.request_pairing(ana.id, &cara.pairing_code).await,
            Err(EngineError::AlreadyPaired)
        ));
        // The target is busy for third parties.
        assert!(matches!(
            engine.request_pairing(cara.id, &ben.pairing_code).await,
            Err(EngineError::TargetAlreadyPaired)
        ));
        // The reverse request between the same pair is a duplicate.
        assert!(matches!(
            engine.request_pairing(ben.id, &ana.pairing_code).await,
            Err(EngineError::DuplicateRequest)
        ));
    }

    #[tokio::test]
    async fn test_code_input_is_normalized() {
        let engine = test_engine();
        let ana = register(&engine, "Ana").await;
        let ben = register(&engine, "Ben").await;

        let sloppy = format!(
            " {}-{} ",
            &ben.pairing_code[..4].to_lowercase(),
            &ben.pairing_code[4..]
        );
        let couple = engine.request_pairing(ana.id, &sloppy).await.unwrap();
        assert_eq!(couple.partner2_id, ben.id);
    }

    #[tokio::test]
    async fn test_accept_races_and_wrong_responder() {
        let engine = test_engine();
        let ana = register(&engine, "Ana").await;
        let ben = register(&engine, "Ben").await;

        let pending = engine
            .request_pairing(ana.id, &ben.pairing_code)
            .await
            .unwrap();

        // The initiator cannot accept their own request.
        assert!(matches!(
            engine.accept_pairing(ana.id, pending.id).await,
            Err(EngineError::RequestNotFound)
        ));

        engine.accept_pairing(ben.id, pending.id).await.unwrap();

        // Only the first accept commits; replays fail.
        assert!(matches!(
            engine.accept_pairing(ben.id, pending.id).await,
            Err(EngineError::RequestNotFound)
        ));
        // So does a late reject.
        assert!(matches!(
            engine.reject_pairing(ben.id, pending.id).await,
            Err(EngineError::RequestNotFound)
        ));
    }

    #[tokio::test]
    async fn test_reject_frees_both_users() {
        let engine = test_engine();
        let ana = register(&engine, "Ana").await;
        let ben = register(&engine, "Ben").await;

        let pending = engine
            .request_pairing(ana.id, &ben.pairing_code)
            .await
            .unwrap();
        engine.reject_pairing(ben.id, pending.id).await.unwrap();

        let status = engine.pairing_status(ana.id).await.unwrap();
        assert_eq!(status.relationship_status, RelationshipStatus::Single);
        assert!(status.couple.is_none());

        // A rejected pair can start over with a brand-new couple.
        let fresh = engine
            .request_pairing(ana.id, &ben.pairing_code)
            .await
            .unwrap();
        assert_ne!(fresh.id, pending.id);
    }

    #[tokio::test]
    async fn test_scenario_dissolve_cascade() {
        let (engine, ana, ben, couple) = paired_couple().await;

        // Some shared state to cascade over.
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

        engine
            .dissolve(ana.id, Some("we grew apart"))
            .await
            .unwrap();

        for (user, initiated) in [(&ana, true), (&ben, false)] {
            let status = engine.pairing_status(user.id).await.unwrap();
            assert_eq!(status.relationship_status, RelationshipStatus::Single);
            assert!(status.couple.is_none());

            let history = engine.relationship_history(user.id).await.unwrap();
            assert_eq!(history.len(), 1);
            assert_eq!(history[0].initiated_breakup, initiated);
            assert_eq!(history[0].couple_id, couple.id);
        }

        // The review exists, keyed only to the couple.
        {
            let db = engine.db().lock().await;
            let reviews = db.breakup_reviews_for_couple(couple.id).unwrap();
            assert_eq!(reviews.len(), 1);
            assert_eq!(reviews[0].note, "we grew apart");
        }

        // Former partners can no longer touch consent.
        assert!(matches!(
            engine
                .update_consent(
                    ben.id,
                    crate::consent::ConsentUpdate {
                        photo_sharing: Some(true),
                        ..Default::default()
                    },
                )
                .await,
            Err(EngineError::NoActiveRelationship)
        ));

        // Only the first dissolve wins.
        assert!(matches!(
            engine.dissolve(ben.id, None).await,
            Err(EngineError::NoActiveRelationship)
        ));
    }

    #[tokio::test]
    async fn test_dissolve_note_validation() {
        let (engine, ana, _ben, _couple) = paired_couple().await;

        let long = "x".repeat(MAX_BREAKUP_NOTE_LEN + 1);
        assert!(matches!(
            engine.dissolve(ana.id, Some(&long)).await,
            Err(EngineError::Validation(_))
        ));

        // A blank note is treated as no note at all.
        engine.dissolve(ana.id, Some("   ")).await.unwrap();
        let db = engine.db().lock().await;
        let status = db.couple_counts_by_state().unwrap();
        assert_eq!(status, (0, 0, 1));
    }

    #[tokio::test]
    async fn test_start_date_rules() {
        let (engine, ana, _ben, couple) = paired_couple().await;

        let tomorrow = Utc::now().date_naive() + chrono::Duration::days(1);
        assert!(matches!(
            engine.set_relationship_start_date(ana.id, tomorrow).await,
            Err(EngineError::Validation(_))
        ));

        let anniversary = Utc::now().date_naive() - chrono::Duration::days(400);
        engine
            .set_relationship_start_date(ana.id, anniversary)
            .await
            .unwrap();

        // Dissolution resolves the start from the explicit date.
        engine.dissolve(ana.id, None).await.unwrap();
        let history = engine.relationship_history(ana.id).await.unwrap();
        assert_eq!(history[0].duration_days, 400);

        let db = engine.db().lock().await;
        let dissolved = db.get_couple(couple.id).unwrap();
        assert_eq!(dissolved.relationship_started_on, Some(anniversary));
    }
}
