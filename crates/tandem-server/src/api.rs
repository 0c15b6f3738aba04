use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{DefaultBodyLimit, State},
    http::{HeaderMap, Method},
    middleware,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Serialize;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use tandem_core::Engine;
use tandem_store::Database;

use crate::config::ServerConfig;
use crate::error::ApiError;
use crate::rate_limit::{rate_limit_middleware, RateLimiter};
use crate::routes;

#[derive(Clone)]
pub struct AppState {
    pub engine: Engine,
    pub db: Arc<Mutex<Database>>,
    pub rate_limiter: RateLimiter,
    pub config: Arc<ServerConfig>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(db: Arc<Mutex<Database>>, config: ServerConfig) -> Self {
        let rate_limiter = RateLimiter::new(config.rate_limit_rps, config.rate_limit_burst);
        Self {
            engine: Engine::new(db.clone()),
            db,
            rate_limiter,
            config: Arc::new(config),
            started_at: Instant::now(),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/auth/register", post(routes::account::register))
        .route("/auth/me", get(routes::account::me))
        .route("/auth/session", delete(routes::account::logout))
        .route("/pairing/request", post(routes::pairing::request))
        .route("/pairing/accept", post(routes::pairing::accept))
        .route("/pairing/reject", post(routes::pairing::reject))
        .route("/pairing/status", get(routes::pairing::status))
        .route("/pairing/dissolve", post(routes::pairing::dissolve))
        .route("/pairing/start-date", put(routes::pairing::set_start_date))
        .route("/pairing/history", get(routes::pairing::history))
        .route("/consent", get(routes::consent::snapshot))
        .route("/consent", put(routes::consent::update))
        .route("/consent/history", get(routes::consent::history))
        .route("/photos", post(routes::streaks::submit))
        .route("/photos/feed", get(routes::streaks::feed))
        .route("/photos/:id/view", post(routes::streaks::view))
        .route("/streak", get(routes::streaks::streak))
        .route("/memories", post(routes::memories::create))
        .route("/memories", get(routes::memories::list))
        .route("/memories/:id", get(routes::memories::get))
        .route("/memories/:id", put(routes::memories::update))
        .route("/memories/:id", delete(routes::memories::delete))
        .route("/chat/messages", post(routes::chat::send))
        .route("/chat/messages", get(routes::chat::list))
        .route("/location", put(routes::location::update))
        .route("/location", get(routes::location::list))
        .route("/mood", put(routes::mood::update))
        .route("/mood", get(routes::mood::get))
        .route("/buzzes", post(routes::buzzes::send))
        .route("/buzzes/unseen", get(routes::buzzes::unseen))
        .route("/buzzes/:id/seen", post(routes::buzzes::mark_seen))
        .route("/calendar/events", post(routes::calendar::create))
        .route("/calendar/events", get(routes::calendar::list))
        .route("/calendar/events/:id", delete(routes::calendar::delete))
        .route("/admin/stats", get(admin_stats))
        .layer(DefaultBodyLimit::max(64 * 1024))
        .layer(middleware::from_fn_with_state(
            state.rate_limiter.clone(),
            rate_limit_middleware,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
struct AdminStatsResponse {
    name: String,
    users: i64,
    couples_pending: i64,
    couples_active: i64,
    couples_dissolved: i64,
    consent_history_entries: i64,
    uptime_secs: u64,
}

fn verify_admin_token(headers: &HeaderMap, config: &ServerConfig) -> Result<(), ApiError> {
    let Some(ref expected) = config.admin_token else {
        return Err(ApiError::Forbidden(
            "Admin API is disabled (no ADMIN_TOKEN configured)".into(),
        ));
    };

    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let token = auth.strip_prefix("Bearer ").unwrap_or(auth);

    // Constant-time comparison to prevent timing attacks on the admin token.
    use subtle::ConstantTimeEq;
    let token_bytes = token.as_bytes();
    let expected_bytes = expected.as_bytes();
    if token_bytes.len() != expected_bytes.len()
        || token_bytes.ct_eq(expected_bytes).unwrap_u8() != 1
    {
        return Err(ApiError::Forbidden("Invalid admin token".into()));
    }

    Ok(())
}

/// Read-only aggregates for instance operators.
async fn admin_stats(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<AdminStatsResponse>, ApiError> {
    verify_admin_token(&headers, &state.config)?;

    let db = state.db.lock().await;
    let users = db.count_users()?;
    let (couples_pending, couples_active, couples_dissolved) = db.couple_counts_by_state()?;
    let consent_history_entries = db.count_consent_history()?;

    Ok(Json(AdminStatsResponse {
        name: state.config.instance_name.clone(),
        users,
        couples_pending,
        couples_active,
        couples_dissolved,
        consent_history_entries,
        uptime_secs: state.started_at.elapsed().as_secs(),
    }))
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn test_state() -> AppState {
        let db = Database::open_in_memory().expect("open in-memory database");
        AppState::new(
            Arc::new(Mutex::new(db)),
            ServerConfig {
                admin_token: Some("sekrit".into()),
                // High enough that test request volume never trips it.
                rate_limit_rps: 1000.0,
                rate_limit_burst: 1000.0,
                ..ServerConfig::default()
            },
        )
    }

    async fn send(
        router: &Router,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = match body {
            Some(value) => builder
                .header("content-type", "application/json")
                .body(Body::from(value.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("build request");

        let response = router.clone().oneshot(request).await.expect("send request");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("parse body")
        };
        (status, value)
    }

    async fn register(router: &Router, name: &str) -> (Value, String) {
        let (status, body) = send(
            router,
            "POST",
            "/auth/register",
            None,
            Some(json!({ "display_name": name })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let token = body["token"].as_str().expect("token").to_string();
        (body["user"].clone(), token)
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let router = build_router(test_state());
        let (status, body) = send(&router, "GET", "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_authentication_is_required() {
        let router = build_router(test_state());

        let (status, body) = send(&router, "GET", "/pairing/status", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["kind"], "unauthenticated");

        let (status, _) = send(&router, "GET", "/auth/me", Some("bogus"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_register_and_me() {
        let router = build_router(test_state());
        let (user, token) = register(&router, "Ana").await;
        assert_eq!(user["relationship_status"], "single");
        assert_eq!(user["pairing_code"].as_str().unwrap().len(), 8);

        let (status, me) = send(&router, "GET", "/auth/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["id"], user["id"]);

        let (status, _) = send(&router, "DELETE", "/auth/session", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&router, "GET", "/auth/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_pairing_and_consent_over_http() {
        let router = build_router(test_state());
        let (ana, ana_token) = register(&router, "Ana").await;
        let (_ben, ben_token) = register(&router, "Ben").await;

        // Ben requests Ana by code; Ana accepts.
        let (status, pending) = send(
            &router,
            "POST",
            "/pairing/request",
            Some(&ben_token),
            Some(json!({ "code": ana["pairing_code"] })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(pending["state"], "pending");

        let (status, couple) = send(
            &router,
            "POST",
            "/pairing/accept",
            Some(&ana_token),
            Some(json!({ "couple_id": pending["id"] })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(couple["state"], "active");

        // Photos are refused until both partners opt in, naming the toggle.
        let (status, denial) = send(
            &router,
            "POST",
            "/photos",
            Some(&ana_token),
            Some(json!({ "content_ref": "photos/first" })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(denial["kind"], "consent_required");
        assert_eq!(denial["feature"], "photo_sharing");

        for token in [&ana_token, &ben_token] {
            let (status, _) = send(
                &router,
                "PUT",
                "/consent",
                Some(token),
                Some(json!({ "photo_sharing": true })),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
        }

        let (status, submission) = send(
            &router,
            "POST",
            "/photos",
            Some(&ana_token),
            Some(json!({ "content_ref": "photos/first" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(submission["streak"]["current"], 0);

        let (status, feed) = send(&router, "GET", "/photos/feed", Some(&ben_token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(feed["from_partner"]["content_ref"], "photos/first");
    }

    #[tokio::test]
    async fn test_duplicate_pairing_request_conflicts() {
        let router = build_router(test_state());
        let (ana, _ana_token) = register(&router, "Ana").await;
        let (_ben, ben_token) = register(&router, "Ben").await;

        let code = ana["pairing_code"].clone();
        let (status, _) = send(
            &router,
            "POST",
            "/pairing/request",
            Some(&ben_token),
            Some(json!({ "code": code })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(
            &router,
            "POST",
            "/pairing/request",
            Some(&ben_token),
            Some(json!({ "code": code })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["kind"], "conflict");
    }

    #[tokio::test]
    async fn test_admin_stats_requires_token() {
        let router = build_router(test_state());

        let (status, _) = send(&router, "GET", "/admin/stats", None, None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, stats) = send(&router, "GET", "/admin/stats", Some("sekrit"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(stats["users"], 0);
        assert_eq!(stats["couples_active"], 0);
    }
}
