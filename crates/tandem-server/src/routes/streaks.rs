//! Streak photo routes: submit, feed, view, counter.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use tandem_core::ephemeral::{PhotoFeed, PhotoSubmission};
use tandem_store::{EphemeralItem, StreakCounter};

use crate::api::AppState;
use crate::auth::require_user;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct SubmitPhotoBody {
    /// Opaque content-hosting reference; the server never stores bytes.
    pub content_ref: String,
}

pub async fn submit(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(body): Json<SubmitPhotoBody>,
) -> Result<Json<PhotoSubmission>, ApiError> {
    let user = require_user(&state, &headers).await?;
    let submission = state.engine.submit_photo(user.id, &body.content_ref).await?;
    Ok(Json(submission))
}

pub async fn feed(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<PhotoFeed>, ApiError> {
    let user = require_user(&state, &headers).await?;
    let feed = state.engine.photo_feed(user.id).await?;
    Ok(Json(feed))
}

pub async fn view(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
) -> Result<Json<EphemeralItem>, ApiError> {
    let user = require_user(&state, &headers).await?;
    let item = state.engine.view_photo(user.id, item_id).await?;
    Ok(Json(item))
}

pub async fn streak(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<StreakCounter>, ApiError> {
    let user = require_user(&state, &headers).await?;
    let counter = state.engine.streak(user.id).await?;
    Ok(Json(counter))
}
