//! Registration, profile, and session routes.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use tandem_shared::pairing_code;
use tandem_shared::types::RelationshipStatus;
use tandem_store::{Session, User};

use crate::api::AppState;
use crate::auth::{self, require_user};
use crate::error::ApiError;

/// Bounded retry budget for pairing-code collisions.  The code space is
/// 31^8; hitting this limit means something other than bad luck.
const CODE_ATTEMPTS: usize = 16;

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub display_name: String,
}

#[derive(Serialize)]
pub struct RegisterResponse {
    pub user: User,
    pub token: String,
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>, ApiError> {
    let display_name = req.display_name.trim();
    if display_name.is_empty() {
        return Err(ApiError::BadRequest("display name is required".into()));
    }
    if display_name.chars().count() > 64 {
        return Err(ApiError::BadRequest(
            "display name must be at most 64 characters".into(),
        ));
    }

    let now = Utc::now();
    let db = state.db.lock().await;

    // Pairing codes are unique by constraint; regenerate on collision.
    let mut user = None;
    for _ in 0..CODE_ATTEMPTS {
        let candidate = User {
            id: Uuid::new_v4(),
            pairing_code: pairing_code::generate(),
            display_name: display_name.to_string(),
            relationship_status: RelationshipStatus::Single,
            couple_id: None,
            mood: None,
            mood_updated_at: None,
            created_at: now,
        };
        match db.create_user(&candidate) {
            Ok(()) => {
                user = Some(candidate);
                break;
            }
            Err(e) if e.is_constraint_violation() => continue,
            Err(e) => return Err(e.into()),
        }
    }
    let user = user.ok_or_else(|| {
        ApiError::BadRequest("could not allocate a pairing code, try again".into())
    })?;

    let token = auth::mint_token();
    db.create_session(&Session {
        token: token.clone(),
        user_id: user.id,
        created_at: now,
        last_seen_at: now,
    })?;

    info!(user = %user.id, "User registered");
    Ok(Json(RegisterResponse { user, token }))
}

pub async fn me(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<User>, ApiError> {
    let user = require_user(&state, &headers).await?;
    Ok(Json(user))
}

pub async fn logout(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let token = auth::bearer_token(&headers).ok_or(ApiError::Unauthenticated)?;
    let db = state.db.lock().await;
    let deleted = db.delete_session(token)?;
    Ok(Json(serde_json::json!({ "logged_out": deleted })))
}
