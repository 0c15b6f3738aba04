//! Chat routes.  Requires an active couple; not consent-gated.

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use tandem_shared::constants::MAX_MESSAGE_LEN;
use tandem_store::ChatMessage;

use crate::api::AppState;
use crate::auth::require_user;
use crate::error::ApiError;

const DEFAULT_PAGE: u32 = 50;
const MAX_PAGE: u32 = 200;

#[derive(Deserialize)]
pub struct SendMessageBody {
    pub body: String,
}

#[derive(Deserialize)]
pub struct PageQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

pub async fn send(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(body): Json<SendMessageBody>,
) -> Result<Json<ChatMessage>, ApiError> {
    let user = require_user(&state, &headers).await?;
    let text = body.body.trim();
    if text.is_empty() {
        return Err(ApiError::BadRequest("message body is required".into()));
    }
    if text.chars().count() > MAX_MESSAGE_LEN {
        return Err(ApiError::BadRequest(format!(
            "message must be at most {MAX_MESSAGE_LEN} characters"
        )));
    }

    let couple = state.engine.require_active_couple(user.id).await?;
    let message = ChatMessage {
        id: Uuid::new_v4(),
        couple_id: couple.id,
        sender_id: user.id,
        body: text.to_string(),
        sent_at: Utc::now(),
    };

    let db = state.db.lock().await;
    db.insert_chat_message(&message)?;
    Ok(Json(message))
}

pub async fn list(
    headers: HeaderMap,
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Vec<ChatMessage>>, ApiError> {
    let user = require_user(&state, &headers).await?;
    let couple = state.engine.require_active_couple(user.id).await?;

    let limit = query.limit.unwrap_or(DEFAULT_PAGE).min(MAX_PAGE);
    let offset = query.offset.unwrap_or(0);

    let db = state.db.lock().await;
    Ok(Json(db.chat_messages_for_couple(couple.id, limit, offset)?))
}
