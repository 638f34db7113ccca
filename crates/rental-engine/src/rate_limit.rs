//! # Update Rate Limiting
//!
//! Caps how often one caller may update bookings (20 per 15 minutes by
//! default).
//!
//! ```text
//! ┌─────────────────────────────┬────────────────────────────────────────────┐
//! │ InMemoryRateLimiter         │ token bucket per caller, one process       │
//! │ RedisRateLimiter            │ fixed window counter shared by instances   │
//! └─────────────────────────────┴────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use redis::aio::ConnectionManager;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::config::RateLimitConfig;

// =============================================================================
// Trait
// =============================================================================

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: u32 },
    Limited { retry_after: Duration },
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateDecision::Allowed { .. })
    }
}

#[derive(Debug, Error)]
pub enum RateLimitError {
    /// The shared store could not be reached.
    #[error("Rate limit store unavailable: {0}")]
    Backend(String),
}

impl From<redis::RedisError> for RateLimitError {
    fn from(err: redis::RedisError) -> Self {
        RateLimitError::Backend(err.to_string())
    }
}

/// Consumes one unit of `key`'s allowance per call.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    async fn check(&self, key: &str) -> Result<RateDecision, RateLimitError>;
}

// =============================================================================
// In-Memory Token Bucket
// =============================================================================

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    refilled_at: Instant,
}

#[derive(Debug)]
struct Buckets {
    by_key: HashMap<String, Bucket>,
    swept_at: Instant,
}

/// Token bucket per key: `max_updates` tokens, refilled evenly over the
/// window.
///
/// A bucket that has refilled to capacity behaves exactly like a missing
/// one, so at most once per window full buckets are dropped.
#[derive(Debug)]
pub struct InMemoryRateLimiter {
    capacity: f64,
    refill_per_sec: f64,
    window: Duration,
    buckets: Mutex<Buckets>,
}

impl InMemoryRateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        let capacity = f64::from(config.max_updates);
        InMemoryRateLimiter {
            capacity,
            refill_per_sec: capacity / config.window().as_secs_f64(),
            window: config.window(),
            buckets: Mutex::new(Buckets {
                by_key: HashMap::new(),
                swept_at: Instant::now(),
            }),
        }
    }

    /// Number of callers currently tracked.
    pub async fn tracked_keys(&self) -> usize {
        self.buckets.lock().await.by_key.len()
    }

    fn refilled(&self, bucket: &Bucket, now: Instant) -> f64 {
        let elapsed = now.duration_since(bucket.refilled_at).as_secs_f64();
        (bucket.tokens + elapsed * self.refill_per_sec).min(self.capacity)
    }
}

#[async_trait]
impl RateLimiter for InMemoryRateLimiter {
    async fn check(&self, key: &str) -> Result<RateDecision, RateLimitError> {
        let now = Instant::now();
        let mut state = self.buckets.lock().await;

        if now.duration_since(state.swept_at) >= self.window {
            let before = state.by_key.len();
            state
                .by_key
                .retain(|_, bucket| self.refilled(bucket, now) < self.capacity);
            state.swept_at = now;
            debug!(dropped = before - state.by_key.len(), "Swept full rate-limit buckets");
        }

        let bucket = state.by_key.entry(key.to_string()).or_insert(Bucket {
            tokens: self.capacity,
            refilled_at: now,
        });

        bucket.tokens = self.refilled(bucket, now);
        bucket.refilled_at = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            return Ok(RateDecision::Allowed {
                remaining: bucket.tokens.floor() as u32,
            });
        }

        let wait = (1.0 - bucket.tokens) / self.refill_per_sec;
        debug!(key = %key, wait_secs = wait, "Rate limited");
        Ok(RateDecision::Limited {
            retry_after: Duration::from_secs_f64(wait),
        })
    }
}

// =============================================================================
// Redis Fixed Window
// =============================================================================

/// Fixed-window counter in Redis: `INCR ratelimit:{key}:{window}` with the
/// key expiring at the end of the window.
#[derive(Clone)]
pub struct RedisRateLimiter {
    conn: ConnectionManager,
    max_updates: u32,
    window_secs: u64,
}

impl RedisRateLimiter {
    /// Connects to `redis_url`.
    pub async fn connect(redis_url: &str, config: &RateLimitConfig) -> Result<Self, RateLimitError> {
        let client = redis::Client::open(redis_url)?;
        let conn = client.get_connection_manager().await?;
        info!("Rate limiter connected to Redis");

        Ok(RedisRateLimiter {
            conn,
            max_updates: config.max_updates,
            window_secs: config.window_secs,
        })
    }
}

/// Window index and seconds left in it, for a unix timestamp.
fn window_position(now_secs: u64, window_secs: u64) -> (u64, u64) {
    let index = now_secs / window_secs;
    let remaining = window_secs - now_secs % window_secs;
    (index, remaining)
}

#[async_trait]
impl RateLimiter for RedisRateLimiter {
    async fn check(&self, key: &str) -> Result<RateDecision, RateLimitError> {
        let now_secs = Utc::now().timestamp().max(0) as u64;
        let (window, remaining_secs) = window_position(now_secs, self.window_secs);
        let redis_key = format!("ratelimit:{}:{}", key, window);

        let mut conn = self.conn.clone();
        let (count,): (u64,) = redis::pipe()
            .atomic()
            .incr(&redis_key, 1)
            .expire(&redis_key, remaining_secs as i64)
            .ignore()
            .query_async(&mut conn)
            .await?;

        if count <= u64::from(self.max_updates) {
            return Ok(RateDecision::Allowed {
                remaining: (u64::from(self.max_updates) - count) as u32,
            });
        }

        debug!(key = %key, count, "Rate limited");
        Ok(RateDecision::Limited {
            retry_after: Duration::from_secs(remaining_secs),
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
