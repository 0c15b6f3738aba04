//! Shared calendar routes.  Requires an active couple; not consent-gated.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use uuid::Uuid;

use tandem_shared::constants::MAX_MEMORY_TITLE_LEN;
use tandem_store::CalendarEvent;

use crate::api::AppState;
use crate::auth::require_user;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct CreateEventBody {
    pub title: String,
    pub starts_on: NaiveDate,
    #[serde(default)]
    pub note: Option<String>,
}

pub async fn create(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(body): Json<CreateEventBody>,
) -> Result<Json<CalendarEvent>, ApiError> {
    let user = require_user(&state, &headers).await?;
    let title = body.title.trim();
    if title.is_empty() {
        return Err(ApiError::BadRequest("title is required".into()));
    }
    if title.chars().count() > MAX_MEMORY_TITLE_LEN {
        return Err(ApiError::BadRequest(format!(
            "title must be at most {MAX_MEMORY_TITLE_LEN} characters"
        )));
    }

    let couple = state.engine.require_active_couple(user.id).await?;
    let event = CalendarEvent {
        id: Uuid::new_v4(),
        couple_id: couple.id,
        author_id: user.id,
        title: title.to_string(),
        note: body.note,
        starts_on: body.starts_on,
        created_at: Utc::now(),
    };

    let db = state.db.lock().await;
    db.create_calendar_event(&event)?;
    Ok(Json(event))
}

pub async fn list(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<Vec<CalendarEvent>>, ApiError> {
    let user = require_user(&state, &headers).await?;
    let couple = state.engine.require_active_couple(user.id).await?;

    let db = state.db.lock().await;
    Ok(Json(db.calendar_events_for_couple(couple.id)?))
}

pub async fn delete(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = require_user(&state, &headers).await?;
    let couple = state.engine.require_active_couple(user.id).await?;

    let db = state.db.lock().await;
    db.delete_calendar_event(id, couple.id)?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}
