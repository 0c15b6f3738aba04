//! Consent ledger operations.
//!
//! A user edits only their own side of the ledger, one or more toggles at a
//! time.  Only toggles that actually change value are written or logged, so
//! the audit history records real decisions, not idempotent replays.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use tandem_shared::consent::{ConsentFeature, ConsentFlags};

use tandem_store::{ConsentHistoryEntry, ConsentLedger};

use crate::engine::Engine;
use crate::error::Result;
use crate::gate;

/// A partial consent edit: `None` leaves a toggle untouched.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ConsentUpdate {
    pub photo_sharing: Option<bool>,
    pub memory_access: Option<bool>,
    pub location_sharing: Option<bool>,
}

impl ConsentUpdate {
    /// The toggles that would actually change `current`.
    fn changes(&self, current: &ConsentFlags) -> Vec<(ConsentFeature, bool)> {
        [
            (ConsentFeature::PhotoSharing, self.photo_sharing),
            (ConsentFeature::MemoryAccess, self.memory_access),
            (ConsentFeature::LocationSharing, self.location_sharing),
        ]
        .into_iter()
        .filter_map(|(feature, wanted)| match wanted {
            Some(value) if value != current.get(feature) => Some((feature, value)),
            _ => None,
        })
        .collect()
    }
}

/// One partner's view of the couple's consent state.  The caller sees both
/// sides' flags (each partner can always check what is mutually enabled) but
/// edits only their own.
#[derive(Debug, Clone, Serialize)]
pub struct ConsentSnapshot {
    pub couple_id: Uuid,
    pub mine: ConsentFlags,
    pub partner: ConsentFlags,
    /// Features currently enabled by both sides.
    pub active_features: Vec<ConsentFeature>,
}

impl ConsentSnapshot {
    fn new(ledger: &ConsentLedger, caller_is_partner1: bool) -> Self {
        Self {
            couple_id: ledger.couple_id,
            mine: ledger.flags_for(caller_is_partner1),
            partner: ledger.flags_for(!caller_is_partner1),
            active_features: ledger.active_features(),
        }
    }
}

impl Engine {
    /// Apply a consent edit to the caller's own side of the ledger and
    /// return the resulting snapshot.
    pub async fn update_consent(&self, user_id: Uuid, update: ConsentUpdate) -> Result<ConsentSnapshot> {
        let mut db = self.lock().await;
        let couple = gate::require_active(&db, user_id)?;
        let caller_is_partner1 = couple.is_partner1(user_id);
        let now = Utc::now();

        // The ledger is created at acceptance; recreate it (all-false) if a
        // legacy couple is missing one.
        let ledger = match db.get_consent_ledger(couple.id)? {
            Some(ledger) => ledger,
            None => {
                db.create_consent_ledger(couple.id, now)?;
                db.get_consent_ledger(couple.id)?
                    .ok_or(tandem_store::StoreError::NotFound)?
            }
        };

        let changes = update.changes(&ledger.flags_for(caller_is_partner1));
        db.apply_consent_changes(couple.id, user_id, caller_is_partner1, &changes, now)?;

        for (feature, value) in &changes {
            info!(couple = %couple.id, user = %user_id, feature = %feature, value, "consent changed");
        }

        let ledger = db
            .get_consent_ledger(couple.id)?
            .ok_or(tandem_store::StoreError::NotFound)?;
        Ok(ConsentSnapshot::new(&ledger, caller_is_partner1))
    }

    /// The caller's current consent snapshot.
    pub async fn consent_snapshot(&self, user_id: Uuid) -> Result<ConsentSnapshot> {
        let db = self.lock().await;
        let couple = gate::require_active(&db, user_id)?;
        let ledger = db
            .get_consent_ledger(couple.id)?
            .ok_or(crate::EngineError::ConsentNotConfigured)?;
        Ok(ConsentSnapshot::new(&ledger, couple.is_partner1(user_id)))
    }

    /// The couple's consent audit log, newest first.
    pub async fn consent_history(&self, user_id: Uuid, limit: u32) -> Result<Vec<ConsentHistoryEntry>> {
        let db = self.lock().await;
        let couple = gate::require_active(&db, user_id)?;
        Ok(db.consent_history_for_couple(couple.id, limit)?)
    }
}
