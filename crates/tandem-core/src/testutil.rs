//! Shared fixtures for engine tests.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use tandem_shared::pairing_code;
use tandem_shared::types::RelationshipStatus;

use tandem_store::{Couple, Database, User};

use crate::consent::ConsentUpdate;
use crate::Engine;

pub(crate) fn test_engine() -> Engine {
    let db = Database::open_in_memory().expect("open in-memory database");
    Engine::new(Arc::new(Mutex::new(db)))
}

pub(crate) async fn register(engine: &Engine, name: &str) -> User {
    let user = User {
        id: Uuid::new_v4(),
        pairing_code: pairing_code::generate(),
        display_name: name.to_string(),
        relationship_status: RelationshipStatus::Single,
        couple_id: None,
        mood: None,
        mood_updated_at: None,
        created_at: Utc::now(),
    };
    let db = engine.db().lock().await;
    db.create_user(&user).expect("create user");
    user
}

/// An engine with one freshly accepted couple (all consent still off).
pub(crate) async fn paired_couple() -> (Engine, User, User, Couple) {
    let engine = test_engine();
    let ana = register(&engine, "Ana").await;
    let ben = register(&engine, "Ben").await;

    let pending = engine
        .request_pairing(ana.id, &ben.pairing_code)
        .await
        .expect("request pairing");
    let couple = engine
        .accept_pairing(ben.id, pending.id)
        .await
        .expect("accept pairing");

    (engine, ana, ben, couple)
}

/// Like [`paired_couple`], with photo sharing already mutual.
pub(crate) async fn paired_couple_with_photos() -> (Engine, User, User, Couple) {
    let (engine, ana, ben, couple) = paired_couple().await;
    for user in [&ana, &ben] {
        engine
            .update_consent(
                user.id,
                ConsentUpdate {
                    photo_sharing: Some(true),
                    ..Default::default()
                },
            )
            .await
            .expect("enable photo sharing");
    }
    (engine, ana, ben, couple)
}
