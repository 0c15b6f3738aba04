use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;

use tandem_core::EngineError;
use tandem_store::StoreError;

/// HTTP-facing error.  Engine errors carry the domain taxonomy; the response
/// body is always `{error, kind}` JSON, plus `feature` when the consent gate
/// names the missing toggle.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("authentication required")]
    Unauthenticated,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("invalid request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match &self {
            ApiError::Unauthenticated => {
                (StatusCode::UNAUTHORIZED, "unauthenticated", self.to_string())
            }
            ApiError::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden", self.to_string()),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "validation", self.to_string()),
            ApiError::Engine(e) => {
                let status = match e.kind() {
                    "conflict" | "limit_exceeded" => StatusCode::CONFLICT,
                    "not_found" => StatusCode::NOT_FOUND,
                    "invalid_state" | "consent_required" | "forbidden" => StatusCode::FORBIDDEN,
                    "validation" => StatusCode::BAD_REQUEST,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
                    error!(error = %e, "Engine failure");
                    "Internal server error".to_string()
                } else {
                    e.to_string()
                };
                (status, e.kind(), message)
            }
            ApiError::Store(StoreError::NotFound) => {
                (StatusCode::NOT_FOUND, "not_found", "not found".to_string())
            }
            ApiError::Store(e) => {
                error!(error = %e, "Storage failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal",
                    "Internal server error".to_string(),
                )
            }
        };

        let mut body = serde_json::json!({
            "error": message,
            "kind": kind,
        });
        if let ApiError::Engine(e) = &self {
            if let Some(feature) = e.missing_feature() {
                body["feature"] = serde_json::json!(feature.as_str());
            }
        }

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tandem_shared::consent::ConsentFeature;

    fn status_of(err: ApiError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_of(ApiError::Unauthenticated), StatusCode::UNAUTHORIZED);
        assert_eq!(
            status_of(ApiError::Engine(EngineError::AlreadyPaired)),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(ApiError::Engine(EngineError::ItemLimitReached)),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(ApiError::Engine(EngineError::TargetNotFound)),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(ApiError::Engine(EngineError::ConsentRequired(
                ConsentFeature::PhotoSharing
            ))),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_of(ApiError::Engine(EngineError::Validation("bad".into()))),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(ApiError::Store(StoreError::NotFound)),
            StatusCode::NOT_FOUND
        );
    }
}
