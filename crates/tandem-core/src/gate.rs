//! The consent gate.
//!
//! Every consent-gated feature entry point passes through
//! [`Engine::authorize_feature`], which re-reads the ledger each time: a
//! feature is available iff the couple is active AND both partners' flags
//! for it are currently true.  Nothing is cached, so a revocation takes
//! effect on the very next request.

use tracing::warn;
use uuid::Uuid;

use tandem_shared::consent::ConsentFeature;
use tandem_shared::types::{CoupleState, RelationshipStatus};

use tandem_store::{ConsentLedger, Couple, Database};

use crate::engine::Engine;
use crate::error::{EngineError, Result};

/// Proof that a consent check passed, carrying the rows the check read.
/// Collaborator handlers take the couple id (and partner labels) from here
/// instead of re-resolving them.
#[derive(Debug, Clone)]
pub struct FeatureGrant {
    pub couple: Couple,
    pub ledger: ConsentLedger,
}

impl FeatureGrant {
    /// The other partner's id.  The grant was issued for a member of the
    /// couple, so this cannot miss.
    pub fn partner_of(&self, user_id: Uuid) -> Uuid {
        self.couple
            .partner_of(user_id)
            .unwrap_or(self.couple.partner2_id)
    }
}

impl Engine {
    /// Resolve the caller's active couple, or say precisely why there is
    /// none.
    pub async fn require_active_couple(&self, user_id: Uuid) -> Result<Couple> {
        let db = self.lock().await;
        require_active(&db, user_id)
    }

    /// Authorize one consent-gated feature for `user_id`.
    pub async fn authorize_feature(
        &self,
        user_id: Uuid,
        feature: ConsentFeature,
    ) -> Result<FeatureGrant> {
        let db = self.lock().await;
        authorize(&db, user_id, feature)
    }
}

/// Lock-free inner check, shared with engine operations that already hold
/// the database guard.
pub(crate) fn require_active(db: &Database, user_id: Uuid) -> Result<Couple> {
    match db.live_couple_for_user(user_id)? {
        Some(couple) if couple.state == CoupleState::Active => Ok(couple),
        Some(_) => Err(EngineError::RelationshipNotActive),
        None => {
            // A user flagged paired with no live couple is a torn write from
            // an old version; read it as unpaired rather than half-paired.
            let user = db.get_user(user_id)?;
            if user.relationship_status == RelationshipStatus::Paired {
                warn!(user = %user_id, "paired user has no live couple; treating as unpaired");
            }
            Err(EngineError::NoActiveRelationship)
        }
    }
}

pub(crate) fn authorize(
    db: &Database,
    user_id: Uuid,
    feature: ConsentFeature,
) -> Result<FeatureGrant> {
    let couple = require_active(db, user_id)?;
    let ledger = db
        .get_consent_ledger(couple.id)?
        .ok_or(EngineError::ConsentNotConfigured)?;

    if !ledger.is_feature_active(feature) {
        return Err(EngineError::ConsentRequired(feature));
    }

    Ok(FeatureGrant { couple, ledger })
}
