//! rollsum server
//!
//! - Rolling one-hour sums per metric key
//! - HTTP: POST /metric/:key, GET /metric/:key/sum
//! - Graceful shutdown on Ctrl+C: stop accepting, drain the queue, stop sweeps

use std::path::Path;

use tracing_subscriber::{fmt, EnvFilter};

use rollsum_core::error::{Result, RollsumError};
use rollsum_engine::{app_state, config, router, Engine};

const DEFAULT_CONFIG_PATH: &str = "rollsum.yaml";

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let path = std::env::var("ROLLSUM_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
    let cfg = if Path::new(&path).exists() {
        config::load_from_file(&path)?
    } else {
        tracing::info!(%path, "config file not found, using defaults");
        config::RollsumConfig::default()
    };
    let listen = cfg.server.listen_addr()?;

    let engine = Engine::start(cfg.engine.clone())?;
    let state = app_state::AppState::new(cfg, engine.clone());
    let app = router::build_router(state);

    tracing::info!(%listen, "rollsum starting");
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .map_err(|e| RollsumError::Internal(format!("failed to bind {listen}: {e}")))?;

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| RollsumError::Internal(format!("server failed: {e}")));

    engine.shutdown().await?;
    served
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c; shutting down");
    }
    tracing::info!("shutdown signal received");
}
