//! Consent ledger routes.

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;

use tandem_core::consent::{ConsentSnapshot, ConsentUpdate};
use tandem_store::ConsentHistoryEntry;

use crate::api::AppState;
use crate::auth::require_user;
use crate::error::ApiError;

const DEFAULT_HISTORY_LIMIT: u32 = 50;
const MAX_HISTORY_LIMIT: u32 = 500;

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<u32>,
}

pub async fn snapshot(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<ConsentSnapshot>, ApiError> {
    let user = require_user(&state, &headers).await?;
    let snapshot = state.engine.consent_snapshot(user.id).await?;
    Ok(Json(snapshot))
}

pub async fn update(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(body): Json<ConsentUpdate>,
) -> Result<Json<ConsentSnapshot>, ApiError> {
    let user = require_user(&state, &headers).await?;
    let snapshot = state.engine.update_consent(user.id, body).await?;
    Ok(Json(snapshot))
}

pub async fn history(
    headers: HeaderMap,
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<ConsentHistoryEntry>>, ApiError> {
    let user = require_user(&state, &headers).await?;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .min(MAX_HISTORY_LIMIT);
    let entries = state.engine.consent_history(user.id, limit).await?;
    Ok(Json(entries))
}
