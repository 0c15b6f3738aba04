//! Walkie-talkie buzz routes.  Poll-based by design; no push delivery.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use tandem_shared::constants::MAX_CONTENT_REF_LEN;
use tandem_store::Buzz;

use crate::api::AppState;
use crate::auth::require_user;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct SendBuzzBody {
    /// Optional opaque voice-clip reference.
    #[serde(default)]
    pub voice_ref: Option<String>,
}

pub async fn send(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(body): Json<SendBuzzBody>,
) -> Result<Json<Buzz>, ApiError> {
    let user = require_user(&state, &headers).await?;
    if let Some(voice_ref) = &body.voice_ref {
        if voice_ref.len() > MAX_CONTENT_REF_LEN {
            return Err(ApiError::BadRequest(format!(
                "voice reference must be at most {MAX_CONTENT_REF_LEN} characters"
            )));
        }
    }

    let couple = state.engine.require_active_couple(user.id).await?;
    let buzz = Buzz {
        id: Uuid::new_v4(),
        couple_id: couple.id,
        sender_id: user.id,
        voice_ref: body.voice_ref,
        sent_at: Utc::now(),
        seen_at: None,
    };

    let db = state.db.lock().await;
    db.insert_buzz(&buzz)?;
    Ok(Json(buzz))
}

pub async fn unseen(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<Vec<Buzz>>, ApiError> {
    let user = require_user(&state, &headers).await?;
    let couple = state.engine.require_active_couple(user.id).await?;

    let db = state.db.lock().await;
    Ok(Json(db.unseen_buzzes_for_user(couple.id, user.id)?))
}

pub async fn mark_seen(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = require_user(&state, &headers).await?;
    let couple = state.engine.require_active_couple(user.id).await?;

    // Scoping the acknowledgment to the caller's couple makes a foreign
    // buzz id indistinguishable from a missing one.
    let db = state.db.lock().await;
    db.mark_buzz_seen(id, couple.id, user.id, Utc::now())?;
    Ok(Json(serde_json::json!({ "seen": true })))
}
