//! Bearer-token sessions.
//!
//! Registration mints an opaque token (32 random bytes, hex); every
//! authenticated route resolves `Authorization: Bearer <token>` to a user
//! and stamps the session's `last_seen_at`.

use axum::http::HeaderMap;
use chrono::Utc;
use rand::RngCore;

use tandem_store::{StoreError, User};

use crate::api::AppState;
use crate::error::ApiError;

/// Mint a fresh opaque session token.
pub fn mint_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// The bearer token from the Authorization header, if any.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Resolve the calling user from the request headers, touching the session.
pub async fn require_user(state: &AppState, headers: &HeaderMap) -> Result<User, ApiError> {
    let token = bearer_token(headers).ok_or(ApiError::Unauthenticated)?;

    let db = state.db.lock().await;
    let session = match db.get_session(token) {
        Ok(session) => session,
        Err(StoreError::NotFound) => return Err(ApiError::Unauthenticated),
        Err(other) => return Err(other.into()),
    };
    db.touch_session(token, Utc::now())?;
    Ok(db.get_user(session.user_id)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mint_token_shape() {
        let token = mint_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(token, mint_token());
    }

    #[test]
    fn test_bearer_token_extraction() {
        let mut headers = HeaderMap::new();
        assert!(bearer_token(&headers).is_none());

        headers.insert("authorization", "Bearer abc123".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("abc123"));

        headers.insert("authorization", "Basic abc123".parse().unwrap());
        assert!(bearer_token(&headers).is_none());

        headers.insert("authorization", "Bearer ".parse().unwrap());
        assert!(bearer_token(&headers).is_none());
    }
}
