//! Health check endpoint.
//!
//! The database is required; Redis is optional, so a Redis failure only
//! degrades the service.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::AppState;

/// Serving status of one component or the whole service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServingStatus {
    Serving,
    Degraded,
    NotServing,
    NotConfigured,
}

/// Response of `GET /health`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: ServingStatus,
    pub database: ServingStatus,
    pub redis: ServingStatus,
    pub message: String,
    pub server_time: String,
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let database = if state.db.health_check().await {
        ServingStatus::Serving
    } else {
        ServingStatus::NotServing
    };
    let (redis, redis_message) = check_redis(&state).await;

    let (status, message) = match (database, redis) {
        (ServingStatus::NotServing, _) => (ServingStatus::NotServing, "Database unhealthy".to_string()),
        (_, ServingStatus::NotServing) => (
            ServingStatus::Degraded,
            format!("Degraded: Redis unhealthy - {}", redis_message),
        ),
        _ => (ServingStatus::Serving, "All systems operational".to_string()),
    };

    let code = if status == ServingStatus::NotServing {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    (
        code,
        Json(HealthResponse {
            status,
            database,
            redis,
            message,
            server_time: Utc::now().to_rfc3339(),
        }),
    )
}

async fn check_redis(state: &AppState) -> (ServingStatus, String) {
    let Some(client) = &state.redis else {
        return (ServingStatus::NotConfigured, "Redis not configured".to_string());
    };

    match client.get_multiplexed_async_connection().await {
        Ok(mut conn) => match redis::cmd("PING").query_async::<String>(&mut conn).await {
            Ok(_) => (ServingStatus::Serving, "Redis connected".to_string()),
            Err(e) => (ServingStatus::NotServing, format!("Redis ping failed: {}", e)),
        },
        Err(e) => (ServingStatus::NotServing, format!("Redis connection failed: {}", e)),
    }
}
