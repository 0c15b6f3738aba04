//! Per-client request throttling.
//!
//! One refill-on-demand token bucket per client IP, sized by the configured
//! sustained rate and burst.  The table lives in memory only: budgets reset
//! on restart, which is fine for a soft abuse limit in front of an API whose
//! hard invariants all live in the database.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tokio::sync::Mutex;
use tracing::warn;

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    touched: Instant,
}

/// Config-driven per-IP throttle.  Tokens accrue continuously at `rps` up
/// to `burst`; each request spends one.
#[derive(Clone)]
pub struct RateLimiter {
    table: Arc<Mutex<HashMap<IpAddr, Bucket>>>,
    rps: f64,
    burst: f64,
}

impl RateLimiter {
    pub fn new(rps: f64, burst: f64) -> Self {
        Self {
            table: Arc::new(Mutex::new(HashMap::new())),
            rps,
            burst,
        }
    }

    /// Spend one token for `ip`, refilling for the elapsed time first.
    pub async fn allow(&self, ip: IpAddr) -> bool {
        let now = Instant::now();
        let mut table = self.table.lock().await;
        let bucket = table.entry(ip).or_insert(Bucket {
            tokens: self.burst,
            touched: now,
        });

        let idle = now.duration_since(bucket.touched).as_secs_f64();
        bucket.tokens = (bucket.tokens + idle * self.rps).min(self.burst);
        bucket.touched = now;

        if bucket.tokens < 1.0 {
            return false;
        }
        bucket.tokens -= 1.0;
        true
    }

    /// Drop buckets idle longer than `max_idle` and report how many went.
    /// The table otherwise grows with every distinct client address ever
    /// seen, so the server runs this on a timer.
    pub async fn evict_idle(&self, max_idle: Duration) -> usize {
        let mut table = self.table.lock().await;
        let before = table.len();
        let now = Instant::now();
        table.retain(|_, bucket| now.duration_since(bucket.touched) < max_idle);
        before - table.len()
    }
}

/// Axum middleware wrapping the whole router.  A throttled request gets the
/// same JSON error shape as the rest of the API.
pub async fn rate_limit_middleware(
    State(limiter): State<RateLimiter>,
    req: Request<axum::body::Body>,
    next: Next,
) -> Response {
    if let Some(ip) = client_ip(&req) {
        if !limiter.allow(ip).await {
            warn!(ip = %ip, path = %req.uri().path(), "Request throttled");
            let body = serde_json::json!({
                "error": "too many requests",
                "kind": "rate_limited",
            });
            return (StatusCode::TOO_MANY_REQUESTS, axum::Json(body)).into_response();
        }
    }
    next.run(req).await
}

fn client_ip(req: &Request<axum::body::Body>) -> Option<IpAddr> {
    if let Some(ConnectInfo(addr)) = req.extensions().get::<ConnectInfo<SocketAddr>>() {
        return Some(addr.ip());
    }
    forwarded_ip(req.headers())
}

/// Reverse-proxy fallback when no socket address is attached: the first
/// `X-Forwarded-For` hop, then `X-Real-IP`.
fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|v| v.trim().parse().ok());

    forwarded.or_else(|| {
        headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok())
    })
}
