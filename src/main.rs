//! cipherd - realtime direct-messaging server.
//!
//! Users exchange text messages over a persistent WebSocket session. Every
//! message is stored in SQLite before it is forwarded (at most once) to an
//! online recipient. A small HTTP API serves history, user management,
//! presence and Prometheus metrics.

mod config;
mod db;
mod error;
mod http;
mod metrics;
mod network;
mod session;
mod state;
mod store;
mod telemetry;

use crate::config::Config;
use crate::db::Database;
use crate::network::{ConnectionSettings, Gateway};
use crate::session::{SessionManager, SessionPolicy};
use crate::state::ConnectionRegistry;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Inbound messages above this multiple of `limits.max_frame_bytes` break
/// the connection instead of producing an error frame.
const HARD_FRAME_LIMIT_FACTOR: usize = 4;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if std::env::var("CIPHERD_LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    let config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;

    if let Err(errors) = config::validation::validate(&config) {
        for e in &errors {
            error!(error = %e, "Invalid configuration");
        }
        anyhow::bail!("{} configuration error(s) in {}", errors.len(), config_path);
    }

    info!(server = %config.server.name, "Starting cipherd");

    // Initialize database
    let db = Database::new(&config.database.path).await?;
    for user in &config.users {
        db.users().upsert(&user.user_id, &user.display_name).await?;
    }
    if !config.users.is_empty() {
        info!(count = config.users.len(), "Seeded users from config");
    }

    if config.server.metrics {
        metrics::init();
        info!("Metrics initialized");
    } else {
        info!("Metrics disabled");
    }

    let registry = Arc::new(ConnectionRegistry::new());
    let sessions = Arc::new(SessionManager::new(
        Arc::clone(&registry),
        Arc::new(db.clone()),
        Arc::new(db.clone()),
        SessionPolicy::from_config(&config.session, &config.limits),
    ));

    if let Some(http_cfg) = &config.http {
        let state = http::HttpState {
            db: db.clone(),
            sessions: Arc::clone(&sessions),
        };
        let addr = http_cfg.address;
        tokio::spawn(async move {
            http::run_http_server(addr, state).await;
        });
    } else {
        warn!("No [http] section; REST API and /metrics are disabled");
    }

    let settings = ConnectionSettings {
        outbound_queue: config.session.outbound_queue,
        idle_timeout: config.session.idle_timeout(),
        max_message_bytes: config
            .limits
            .max_frame_bytes
            .saturating_mul(HARD_FRAME_LIMIT_FACTOR),
    };
    let gateway = Gateway::bind(config.listen.address, config.tls, sessions, settings).await?;
    info!(address = %gateway.local_addr()?, "Accepting sessions");

    tokio::select! {
        result = gateway.run() => result?,
        _ = tokio::signal::ctrl_c() => info!("Shutdown requested"),
    }

    Ok(())
}
