//! # Kitshare API Server
//!
//! Wires configuration, storage, the booking engine and its collaborators
//! into the HTTP server.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           Startup                                       │
//! │                                                                         │
//! │  env ──► ApiConfig ──► Database (SQLite, migrations)                   │
//! │           │                                                             │
//! │           ├──► EngineConfig (TOML + RENTAL_* overrides)                │
//! │           │                                                             │
//! │           ├──► REDIS_URL? ──yes──► RedisRateLimiter                    │
//! │           │                 no ──► InMemoryRateLimiter                  │
//! │           ▼                                                             │
//! │       BookingEngine ──► axum::serve (graceful shutdown)                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use kitshare_api::{build_router, ApiConfig, AppState, JwtManager};
use rental_db::{Database, DbConfig};
use rental_engine::rate_limit::RateLimiter;
use rental_engine::{
    BookingEngine, Collaborators, EngineConfig, InMemoryRateLimiter, RedisRateLimiter,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .init();

    info!("Starting Kitshare API server...");

    // Load configuration
    let config = ApiConfig::load()?;
    if config.uses_dev_secret() {
        warn!("JWT_SECRET not set, using the development secret");
    }
    let engine_config = EngineConfig::load(config.engine_config.clone())?;
    info!(
        port = config.http_port,
        database = %config.database_path.display(),
        service_fee_bps = engine_config.pricing.service_fee_bps,
        "Configuration loaded"
    );

    // Connect to database (migrations run on connect)
    let db = Database::new(DbConfig::new(&config.database_path)).await?;
    info!("Database ready");

    // Redis is optional: shared rate limiting and health only
    let (redis, rate_limiter) = connect_redis(&config, &engine_config).await;

    let collaborators = Collaborators {
        rate_limiter,
        ..Collaborators::in_memory(&engine_config)
    };
    let engine = BookingEngine::new(db, &engine_config, collaborators);

    let jwt = JwtManager::new(&config.jwt_secret, config.jwt_access_lifetime_secs);
    let app = build_router(AppState::new(engine.clone(), redis, jwt));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "Starting HTTP server");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    engine.database().close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Connects to Redis when configured, falling back to the in-process
/// limiter if it cannot be reached.
async fn connect_redis(
    config: &ApiConfig,
    engine_config: &EngineConfig,
) -> (Option<redis::Client>, Arc<dyn RateLimiter>) {
    let in_memory = || -> Arc<dyn RateLimiter> {
        Arc::new(InMemoryRateLimiter::new(&engine_config.rate_limit))
    };

    let Some(redis_url) = config.redis_url.as_deref() else {
        return (None, in_memory());
    };

    let client = match redis::Client::open(redis_url) {
        Ok(client) => client,
        Err(e) => {
            warn!(?e, "Invalid REDIS_URL, continuing without Redis");
            return (None, in_memory());
        }
    };

    match RedisRateLimiter::connect(redis_url, &engine_config.rate_limit).await {
        Ok(limiter) => {
            info!("Connected to Redis");
            (Some(client), Arc::new(limiter))
        }
        Err(e) => {
            warn!(error = %e, "Failed to connect to Redis, rate limiting per instance");
            (Some(client), in_memory())
        }
    }
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");
}
