//! Server configuration loaded from environment variables.
//!
//! All settings have defaults so the server starts with zero configuration
//! for local development.

use std::net::SocketAddr;
use std::path::PathBuf;

use tandem_shared::constants::DEFAULT_HTTP_PORT;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// Filesystem path of the SQLite database.
    /// Env: `DB_PATH`
    /// Default: `./tandem.db`
    pub db_path: PathBuf,

    /// Human-readable name for this server instance.
    /// Env: `INSTANCE_NAME`
    /// Default: `"Tandem Node"`
    pub instance_name: String,

    /// Admin API bearer token. Required to access /admin/* endpoints.
    /// Env: `ADMIN_TOKEN`
    /// Default: empty (admin API disabled).
    pub admin_token: Option<String>,

    /// Sustained per-IP request rate (requests per second).
    /// Env: `RATE_LIMIT_RPS`
    /// Default: `10`
    pub rate_limit_rps: f64,

    /// Per-IP burst capacity.
    /// Env: `RATE_LIMIT_BURST`
    /// Default: `30`
    pub rate_limit_burst: f64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            db_path: PathBuf::from("./tandem.db"),
            instance_name: "Tandem Node".to_string(),
            admin_token: None,
            rate_limit_rps: 10.0,
            rate_limit_burst: 30.0,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default");
            }
        }

        if let Ok(path) = std::env::var("DB_PATH") {
            config.db_path = PathBuf::from(path);
        }

        if let Ok(name) = std::env::var("INSTANCE_NAME") {
            config.instance_name = name;
        }

        if let Ok(token) = std::env::var("ADMIN_TOKEN") {
            if !token.is_empty() {
                config.admin_token = Some(token);
            }
        }

        if let Ok(val) = std::env::var("RATE_LIMIT_RPS") {
            match val.parse::<f64>() {
                Ok(rps) if rps > 0.0 => config.rate_limit_rps = rps,
                _ => tracing::warn!(value = %val, "Invalid RATE_LIMIT_RPS, using default"),
            }
        }

        if let Ok(val) = std::env::var("RATE_LIMIT_BURST") {
            match val.parse::<f64>() {
                Ok(burst) if burst >= 1.0 => config.rate_limit_burst = burst,
                _ => tracing::warn!(value = %val, "Invalid RATE_LIMIT_BURST, using default"),
            }
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }
}
