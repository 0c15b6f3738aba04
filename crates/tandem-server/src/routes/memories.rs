//! Shared memory routes.  Gated by the `memory_access` consent toggle.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use uuid::Uuid;

use tandem_shared::consent::ConsentFeature;
use tandem_shared::constants::{MAX_CONTENT_REF_LEN, MAX_MEMORY_BODY_LEN, MAX_MEMORY_TITLE_LEN};
use tandem_shared::types::MemoryStatus;
use tandem_store::Memory;

use crate::api::AppState;
use crate::auth::require_user;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct MemoryBody {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub photo_ref: Option<String>,
    #[serde(default)]
    pub happened_on: Option<NaiveDate>,
}

fn validate(body: &MemoryBody) -> Result<(), ApiError> {
    let title = body.title.trim();
    if title.is_empty() {
        return Err(ApiError::BadRequest("title is required".into()));
    }
    if title.chars().count() > MAX_MEMORY_TITLE_LEN {
        return Err(ApiError::BadRequest(format!(
            "title must be at most {MAX_MEMORY_TITLE_LEN} characters"
        )));
    }
    if body.body.chars().count() > MAX_MEMORY_BODY_LEN {
        return Err(ApiError::BadRequest(format!(
            "body must be at most {MAX_MEMORY_BODY_LEN} characters"
        )));
    }
    if let Some(photo_ref) = &body.photo_ref {
        if photo_ref.len() > MAX_CONTENT_REF_LEN {
            return Err(ApiError::BadRequest(format!(
                "photo reference must be at most {MAX_CONTENT_REF_LEN} characters"
            )));
        }
    }
    Ok(())
}

pub async fn create(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(body): Json<MemoryBody>,
) -> Result<Json<Memory>, ApiError> {
    let user = require_user(&state, &headers).await?;
    validate(&body)?;
    let grant = state
        .engine
        .authorize_feature(user.id, ConsentFeature::MemoryAccess)
        .await?;

    let now = Utc::now();
    let memory = Memory {
        id: Uuid::new_v4(),
        couple_id: grant.couple.id,
        author_id: user.id,
        title: body.title.trim().to_string(),
        body: body.body,
        photo_ref: body.photo_ref,
        happened_on: body.happened_on,
        status: MemoryStatus::Active,
        created_at: now,
        updated_at: now,
    };

    let db = state.db.lock().await;
    db.create_memory(&memory)?;
    Ok(Json(memory))
}

pub async fn list(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<Vec<Memory>>, ApiError> {
    let user = require_user(&state, &headers).await?;
    let grant = state
        .engine
        .authorize_feature(user.id, ConsentFeature::MemoryAccess)
        .await?;

    let db = state.db.lock().await;
    Ok(Json(db.list_active_memories(grant.couple.id)?))
}

pub async fn get(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Memory>, ApiError> {
    let user = require_user(&state, &headers).await?;
    let grant = state
        .engine
        .authorize_feature(user.id, ConsentFeature::MemoryAccess)
        .await?;

    let db = state.db.lock().await;
    let memory = db.get_memory(id)?;
    // Other couples' memories read as absent, and archived rows are
    // invisible outside the list of active ones too.
    if memory.couple_id != grant.couple.id || memory.status != MemoryStatus::Active {
        return Err(tandem_store::StoreError::NotFound.into());
    }
    Ok(Json(memory))
}

pub async fn update(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<MemoryBody>,
) -> Result<Json<Memory>, ApiError> {
    let user = require_user(&state, &headers).await?;
    validate(&body)?;
    let grant = state
        .engine
        .authorize_feature(user.id, ConsentFeature::MemoryAccess)
        .await?;

    let db = state.db.lock().await;
    let memory = db.get_memory(id)?;
    if memory.couple_id != grant.couple.id {
        return Err(tandem_store::StoreError::NotFound.into());
    }
    db.update_memory(
        id,
        body.title.trim(),
        &body.body,
        body.photo_ref.as_deref(),
        body.happened_on,
        Utc::now(),
    )?;
    Ok(Json(db.get_memory(id)?))
}

pub async fn delete(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = require_user(&state, &headers).await?;
    let grant = state
        .engine
        .authorize_feature(user.id, ConsentFeature::MemoryAccess)
        .await?;

    let db = state.db.lock().await;
    let memory = db.get_memory(id)?;
    if memory.couple_id != grant.couple.id {
        return Err(tandem_store::StoreError::NotFound.into());
    }
    db.set_memory_status(id, MemoryStatus::Deleted, Utc::now())?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}
