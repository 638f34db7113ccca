//! # Kitshare API
//!
//! HTTP surface of the booking engine.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           API Routes                                    │
//! │                                                                         │
//! │  ┌──────────────────────────────┐  ┌──────────────────────────────────┐│
//! │  │  Bookings (JWT required)     │  │  Health (public)                 ││
//! │  │                              │  │                                  ││
//! │  │ • POST  /bookings            │  │ • GET /health                    ││
//! │  │ • GET   /bookings            │  │   database + optional Redis      ││
//! │  │ • GET   /bookings/{id}       │  │                                  ││
//! │  │ • PATCH /bookings/{id}       │  │                                  ││
//! │  │ • POST  /bookings/quote      │  │                                  ││
//! │  └──────────────┬───────────────┘  └──────────────────────────────────┘│
//! │                 │                                                       │
//! │                 ▼                                                       │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │  BookingEngine (rental-engine)  ──►  SQLite (rental-db)           │  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration
//! Environment variables:
//! - `HTTP_PORT` - listen port (default: 8080)
//! - `DATABASE_PATH` - SQLite file (default: kitshare.db)
//! - `REDIS_URL` - Redis for shared rate limiting (optional)
//! - `JWT_SECRET` - secret for validating bearer tokens
//! - `ENGINE_CONFIG` - engine TOML file (optional)
//! - `RUST_LOG` - log filter (default: info)

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use rental_db::Database;
use rental_engine::BookingEngine;

// Re-exports
pub use auth::{AuthUser, JwtManager};
pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub engine: BookingEngine,
    pub db: Database,
    pub redis: Option<redis::Client>,
    pub jwt: Arc<JwtManager>,
}

impl AppState {
    pub fn new(engine: BookingEngine, redis: Option<redis::Client>, jwt: JwtManager) -> Self {
        AppState {
            db: engine.database().clone(),
            engine,
            redis,
            jwt: Arc::new(jwt),
        }
    }
}

/// Builds the router with every route and middleware attached.
pub fn build_router(state: AppState) -> Router {
    let bookings = Router::new()
        .route(
            "/bookings",
            post(routes::bookings::create_booking).get(routes::bookings::list_bookings),
        )
        .route("/bookings/quote", post(routes::bookings::quote))
        .route(
            "/bookings/{id}",
            get(routes::bookings::get_booking).patch(routes::bookings::update_booking),
        );

    Router::new()
        .route("/health", get(routes::health::health))
        .merge(bookings)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
