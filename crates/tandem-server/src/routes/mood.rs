//! Mood status routes.  Requires an active couple; not consent-gated.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tandem_shared::constants::MAX_MOOD_LEN;

use crate::api::AppState;
use crate::auth::require_user;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct MoodBody {
    /// `null` or an empty string clears the mood.
    #[serde(default)]
    pub mood: Option<String>,
}

#[derive(Serialize)]
pub struct MoodEntry {
    pub mood: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
pub struct MoodResponse {
    pub mine: MoodEntry,
    pub partner: MoodEntry,
}

pub async fn update(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(body): Json<MoodBody>,
) -> Result<Json<MoodEntry>, ApiError> {
    let user = require_user(&state, &headers).await?;
    state.engine.require_active_couple(user.id).await?;

    let mood = match body.mood.as_deref().map(str::trim) {
        Some("") | None => None,
        Some(m) if m.chars().count() > MAX_MOOD_LEN => {
            return Err(ApiError::BadRequest(format!(
                "mood must be at most {MAX_MOOD_LEN} characters"
            )));
        }
        Some(m) => Some(m.to_string()),
    };

    let now = Utc::now();
    let db = state.db.lock().await;
    db.set_user_mood(user.id, mood.as_deref(), now)?;
    Ok(Json(MoodEntry {
        mood,
        updated_at: Some(now),
    }))
}

pub async fn get(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<MoodResponse>, ApiError> {
    let user = require_user(&state, &headers).await?;
    let couple = state.engine.require_active_couple(user.id).await?;

    let db = state.db.lock().await;
    let me = db.get_user(user.id)?;
    let partner_id = couple.partner_of(user.id).unwrap_or(couple.partner2_id);
    let partner = db.get_user(partner_id)?;

    Ok(Json(MoodResponse {
        mine: MoodEntry {
            mood: me.mood,
            updated_at: me.mood_updated_at,
        },
        partner: MoodEntry {
            mood: partner.mood,
            updated_at: partner.mood_updated_at,
        },
    }))
}
