//! Shared fixtures for store tests.

use chrono::Utc;
use uuid::Uuid;

use tandem_shared::types::RelationshipStatus;

use crate::database::Database;
use crate::models::User;

/// Fresh in-memory database with migrations applied.
pub fn test_db() -> Database {
    Database::open_in_memory().expect("in-memory database")
}

/// Insert and return a single user.
pub fn new_user(db: &Database, name: &str, code: &str) -> User {
    let user = User {
        id: Uuid::new_v4(),
        pairing_code: code.to_string(),
        display_name: name.to_string(),
        relationship_status: RelationshipStatus::Single,
        couple_id: None,
        mood: None,
        mood_updated_at: None,
        created_at: Utc::now(),
    };
    db.create_user(&user).expect("create user");
    user
}

/// Insert two users and return them.
pub fn two_users(db: &Database) -> (User, User) {
    (
        new_user(db, "Ana", "AAAA2222"),
        new_user(db, "Ben", "BBBB3333"),
    )
}

/// Insert two users, pair them, and accept the request.  Returns
/// `(couple_id, partner1_id, partner2_id)`.
pub fn active_couple(db: &mut Database) -> (Uuid, Uuid, Uuid) {
    use crate::models::{Couple, PairingRequest};
    use tandem_shared::types::{CoupleState, RequestStatus};

    let (ana, ben) = two_users(db);
    let now = Utc::now();
    let couple = Couple {
        id: Uuid::new_v4(),
        partner1_id: ana.id,
        partner2_id: ben.id,
        state: CoupleState::Pending,
        request: PairingRequest {
            initiator_id: ana.id,
            target_id: ben.id,
            status: RequestStatus::Pending,
            created_at: now,
            resolved_at: None,
        },
        paired_at: None,
        relationship_started_on: None,
        dissolved_at: None,
    };
    db.create_pending_couple(&couple).expect("create couple");
    db.accept_pairing_txn(couple.id, ben.id, now)
        .expect("accept pairing");
    (couple.id, ana.id, ben.id)
}
