//! Domain model structs persisted in the SQLite database.
//!
//! Every struct derives `Serialize` and `Deserialize` so it can be handed
//! directly to the HTTP layer as a JSON payload.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use tandem_shared::consent::{ConsentFeature, ConsentFlags};
use tandem_shared::streak::StreakState;
use tandem_shared::types::{CoupleState, MemoryStatus, RelationshipStatus, RequestStatus};

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// A registered user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    /// Unique user identifier.
    pub id: Uuid,
    /// Short human-shareable pairing code.
    pub pairing_code: String,
    /// Display name.
    pub display_name: String,
    /// The user's own view of their relationship state.
    pub relationship_status: RelationshipStatus,
    /// Weak reference to the current couple, if any.  The user does not own
    /// the couple's lifecycle.
    pub couple_id: Option<Uuid>,
    /// Free-text mood status, if set.
    pub mood: Option<String>,
    /// When the mood was last changed.
    pub mood_updated_at: Option<DateTime<Utc>>,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Couple
// ---------------------------------------------------------------------------

/// The pairing-request sub-record embedded in a [`Couple`].
///
/// A couple row is created eagerly at request time, before acceptance; the
/// sub-record is immutable once `accepted` or `rejected`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PairingRequest {
    pub initiator_id: Uuid,
    pub target_id: Uuid,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// A joint entity formed by two distinct users.
///
/// `partner1`/`partner2` are labels fixed at creation (partner1 is the
/// request initiator), not a priority ranking.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Couple {
    pub id: Uuid,
    pub partner1_id: Uuid,
    pub partner2_id: Uuid,
    pub state: CoupleState,
    /// The embedded pairing request this couple was created from.
    pub request: PairingRequest,
    /// Set at acceptance.
    pub paired_at: Option<DateTime<Utc>>,
    /// User-supplied relationship start date; may predate the app pairing,
    /// never in the future.
    pub relationship_started_on: Option<NaiveDate>,
    /// Set on dissolution or rejection.
    pub dissolved_at: Option<DateTime<Utc>>,
}

impl Couple {
    /// Returns `true` if `user_id` is one of the two partners.
    pub fn includes(&self, user_id: Uuid) -> bool {
        self.partner1_id == user_id || self.partner2_id == user_id
    }

    /// Returns `true` if `user_id` holds the partner1 label.
    pub fn is_partner1(&self, user_id: Uuid) -> bool {
        self.partner1_id == user_id
    }

    /// Returns the other partner's id, if `user_id` is a member.
    pub fn partner_of(&self, user_id: Uuid) -> Option<Uuid> {
        if self.partner1_id == user_id {
            Some(self.partner2_id)
        } else if self.partner2_id == user_id {
            Some(self.partner1_id)
        } else {
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Consent
// ---------------------------------------------------------------------------

/// Per-couple consent record, one-to-one with a couple that has reached
/// `active`.  Created with all flags false at the moment of acceptance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConsentLedger {
    pub couple_id: Uuid,
    pub partner1: ConsentFlags,
    pub partner2: ConsentFlags,
    pub partner1_updated_at: Option<DateTime<Utc>>,
    pub partner2_updated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ConsentLedger {
    /// Flags belonging to the given side of the couple.
    pub fn flags_for(&self, partner1: bool) -> ConsentFlags {
        if partner1 {
            self.partner1
        } else {
            self.partner2
        }
    }

    /// `true` iff both partners have opted in to `feature`.
    pub fn is_feature_active(&self, feature: ConsentFeature) -> bool {
        tandem_shared::consent::is_feature_active(&self.partner1, &self.partner2, feature)
    }

    /// The derived active-feature set.
    pub fn active_features(&self) -> Vec<ConsentFeature> {
        tandem_shared::consent::active_features(&self.partner1, &self.partner2)
    }
}

/// One entry in the append-only consent audit log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConsentHistoryEntry {
    pub id: Uuid,
    pub couple_id: Uuid,
    pub user_id: Uuid,
    pub feature: ConsentFeature,
    pub new_value: bool,
    pub changed_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Relationship history
// ---------------------------------------------------------------------------

/// A permanent record of a past relationship.  Written once at dissolution,
/// never updated or deleted, and survives everything else.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RelationshipHistoryEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub couple_id: Uuid,
    pub partner_id: Uuid,
    /// Partner display name snapshotted at dissolution time.
    pub partner_name: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    /// Whole elapsed days, rounded down.
    pub duration_days: i64,
    /// True only for the party that initiated the breakup.
    pub initiated_breakup: bool,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Ephemeral items (streak photos)
// ---------------------------------------------------------------------------

/// A streak photo with two independent expiry triggers: absolute TTL and
/// post-view retirement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EphemeralItem {
    pub id: Uuid,
    pub couple_id: Uuid,
    pub uploader_id: Uuid,
    /// Opaque content-hosting reference; the store never holds raw bytes.
    pub content_ref: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub viewed_at: Option<DateTime<Utc>>,
    pub viewed_by: Option<Uuid>,
    pub is_expired: bool,
}

impl EphemeralItem {
    /// An item is live when neither expiry trigger has fired.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        !self.is_expired && self.expires_at > now
    }
}

/// Per-couple streak counter, created zeroed at acceptance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StreakCounter {
    pub couple_id: Uuid,
    pub current: u32,
    pub best: u32,
    pub last_qualifying_day: Option<NaiveDate>,
    pub partner1_last_submitted_at: Option<DateTime<Utc>>,
    pub partner2_last_submitted_at: Option<DateTime<Utc>>,
}

impl StreakCounter {
    /// The pure-math view of this counter.
    pub fn state(&self) -> StreakState {
        StreakState {
            current: self.current,
            best: self.best,
            last_qualifying_day: self.last_qualifying_day,
        }
    }
}

// ---------------------------------------------------------------------------
// Breakup review
// ---------------------------------------------------------------------------

/// A fully anonymous note left at dissolution.  Keyed only to the dissolved
/// couple; no author reference is stored at all.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BreakupReview {
    pub id: Uuid,
    pub couple_id: Uuid,
    pub note: String,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Feature collaborators
// ---------------------------------------------------------------------------

/// A shared memory (consent-gated by `memory_access`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Memory {
    pub id: Uuid,
    pub couple_id: Uuid,
    pub author_id: Uuid,
    pub title: String,
    pub body: String,
    pub photo_ref: Option<String>,
    pub happened_on: Option<NaiveDate>,
    pub status: MemoryStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A chat message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub id: Uuid,
    pub couple_id: Uuid,
    pub sender_id: Uuid,
    pub body: String,
    pub sent_at: DateTime<Utc>,
}

/// A partner's last known position (consent-gated by `location_sharing`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LocationPin {
    pub couple_id: Uuid,
    pub user_id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
    pub updated_at: DateTime<Utc>,
}

/// A walkie-talkie buzz.  Poll-based: the recipient fetches unseen buzzes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Buzz {
    pub id: Uuid,
    pub couple_id: Uuid,
    pub sender_id: Uuid,
    pub voice_ref: Option<String>,
    pub sent_at: DateTime<Utc>,
    pub seen_at: Option<DateTime<Utc>>,
}

/// A shared calendar event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CalendarEvent {
    pub id: Uuid,
    pub couple_id: Uuid,
    pub author_id: Uuid,
    pub title: String,
    pub note: Option<String>,
    pub starts_on: NaiveDate,
    pub created_at: DateTime<Utc>,
}

/// A bearer-token session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}
