//! # tandem-server
//!
//! HTTP backend for the tandem couples app.
//!
//! This binary provides:
//! - **Pairing lifecycle** — request/accept/reject/dissolve with one live
//!   couple per user enforced in the database
//! - **Mutual consent** — per-couple ledger, append-only audit history, and
//!   the conjunctive authorization gate in front of shared features
//! - **Streak photos** — ephemeral items with a 24-hour TTL, view-once
//!   retirement, and the couple's daily streak counter
//! - **Feature surfaces** — chat, memories, location, mood, buzzes, calendar
//! - **REST API** (axum) with bearer-token sessions and per-IP rate limiting

mod api;
mod auth;
mod config;
mod error;
mod rate_limit;
mod routes;

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use tandem_store::Database;

use crate::api::AppState;
use crate::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tandem_server=debug")),
        )
        .init();

    info!("Starting tandem server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");
    info!(
        instance = %config.instance_name,
        admin_enabled = config.admin_token.is_some(),
        "Instance settings"
    );

    // -----------------------------------------------------------------------
    // 3. Open the database (WAL mode, migrations run here)
    // -----------------------------------------------------------------------
    let database = Database::open_at(&config.db_path)?;
    info!(path = %config.db_path.display(), "Database ready");

    let http_addr = config.http_addr;
    let state = AppState::new(Arc::new(Mutex::new(database)), config);

    // -----------------------------------------------------------------------
    // 4. Spawn background tasks
    // -----------------------------------------------------------------------

    // Periodic rate limiter cleanup (every 5 minutes, evict buckets idle >10 min)
    let rl = state.rate_limiter.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(300));
        loop {
            interval.tick().await;
            rl.evict_idle(std::time::Duration::from_secs(600)).await;
        }
    });

    // Periodic expiry sweep for past-TTL streak photos.  Read paths filter
    // on expires_at regardless; this just keeps the table tidy.
    let engine = state.engine.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(600));
        loop {
            interval.tick().await;
            match engine.expire_overdue().await {
                Ok(0) => {}
                Ok(n) => info!(count = n, "Expired overdue streak photos"),
                Err(e) => warn!(error = %e, "Expiry sweep failed"),
            }
        }
    });

    // -----------------------------------------------------------------------
    // 5. Run the HTTP API server (blocks until shutdown)
    // -----------------------------------------------------------------------
    // tokio::select! ensures that if either the HTTP server or a shutdown
    // signal arrives, we exit cleanly.
    tokio::select! {
        result = api::serve(state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
