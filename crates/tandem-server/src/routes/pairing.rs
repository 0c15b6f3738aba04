//! Pairing lifecycle routes: request, accept, reject, status, dissolution,
//! start date, and permanent history.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use tandem_core::pairing::PairingStatus;
use tandem_store::{Couple, RelationshipHistoryEntry};

use crate::api::AppState;
use crate::auth::require_user;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct PairingRequestBody {
    /// The partner's pairing code, as typed (normalized server-side).
    pub code: String,
}

#[derive(Deserialize)]
pub struct PairingAnswerBody {
    pub couple_id: Uuid,
}

#[derive(Deserialize)]
pub struct DissolveBody {
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Deserialize)]
pub struct StartDateBody {
    pub date: NaiveDate,
}

pub async fn request(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(body): Json<PairingRequestBody>,
) -> Result<Json<Couple>, ApiError> {
    let user = require_user(&state, &headers).await?;
    let couple = state.engine.request_pairing(user.id, &body.code).await?;
    Ok(Json(couple))
}

pub async fn accept(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(body): Json<PairingAnswerBody>,
) -> Result<Json<Couple>, ApiError> {
    let user = require_user(&state, &headers).await?;
    let couple = state.engine.accept_pairing(user.id, body.couple_id).await?;
    Ok(Json(couple))
}

pub async fn reject(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(body): Json<PairingAnswerBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = require_user(&state, &headers).await?;
    state.engine.reject_pairing(user.id, body.couple_id).await?;
    Ok(Json(serde_json::json!({ "rejected": true })))
}

pub async fn status(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<PairingStatus>, ApiError> {
    let user = require_user(&state, &headers).await?;
    let status = state.engine.pairing_status(user.id).await?;
    Ok(Json(status))
}

pub async fn dissolve(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(body): Json<DissolveBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = require_user(&state, &headers).await?;
    state.engine.dissolve(user.id, body.note.as_deref()).await?;
    Ok(Json(serde_json::json!({ "dissolved": true })))
}

pub async fn set_start_date(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(body): Json<StartDateBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = require_user(&state, &headers).await?;
    state
        .engine
        .set_relationship_start_date(user.id, body.date)
        .await?;
    Ok(Json(serde_json::json!({ "relationship_started_on": body.date })))
}

pub async fn history(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<Vec<RelationshipHistoryEntry>>, ApiError> {
    let user = require_user(&state, &headers).await?;
    let entries = state.engine.relationship_history(user.id).await?;
    Ok(Json(entries))
}
