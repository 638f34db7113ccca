//! # rental-engine: Booking Lifecycle for Kitshare
//!
//! Turns the pure rules of `rental-core` and the storage of `rental-db`
//! into the booking use cases, talking to the outside world only through
//! traits.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        rental-engine                                    │
//! │                                                                         │
//! │   apps/api ──► BookingEngine (orchestrator.rs)                         │
//! │                    │                                                    │
//! │        ┌───────────┼──────────────┬──────────────┬─────────────┐       │
//! │        ▼           ▼              ▼              ▼             ▼       │
//! │   rental-core   rental-db   PaymentCoordinator  Notifier   RateLimiter │
//! │   (pricing,     (SQLite)     (payment.rs)       (notify)   (rate_limit)│
//! │    state                          │                                     │
//! │    machine)                       ▼                                     │
//! │                             PaymentGateway (gateway.rs)                 │
//! │                                                                         │
//! │   Clock (clock.rs) supplies "today" for date and refund rules.         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`orchestrator`] - `BookingEngine`: create, transition, update, queries
//! - [`payment`] - Upfront / rental / refund stages with retry and lookup
//! - [`gateway`] - `PaymentGateway` trait and the in-memory gateway
//! - [`notify`] - `Notifier` trait, fire-and-forget dispatch
//! - [`rate_limit`] - `RateLimiter` trait, token bucket and Redis window
//! - [`clock`] - `Clock` trait
//! - [`config`] - `EngineConfig` (TOML + environment)
//! - [`error`] - `EngineError` taxonomy
//!
//! ## Usage
//! ```rust,ignore
//! use rental_engine::{BookingEngine, Collaborators, EngineConfig};
//!
//! let config = EngineConfig::load(None)?;
//! let engine = BookingEngine::new(db, &config, Collaborators::in_memory(&config));
//!
//! let booking = engine.create_booking("renter-1", request).await?;
//! let booking = engine
//!     .transition(&booking.id, &booking.owner_uid, BookingStatus::Confirmed, None)
//!     .await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod clock;
pub mod config;
pub mod error;
pub mod gateway;
pub mod notify;
pub mod orchestrator;
pub mod payment;
pub mod rate_limit;

// =============================================================================
// Re-exports
// =============================================================================

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{ConfigError, EngineConfig};
pub use error::{EngineError, EngineResult, ErrorKind};
pub use gateway::{GatewayError, InMemoryGateway, PaymentGateway};
pub use notify::{NotificationTemplate, Notifier, RecordingNotifier, TracingNotifier};
pub use orchestrator::{
    BookingEngine, BookingPatch, BookingView, Collaborators, CreateBookingRequest, QuoteRequest,
};
pub use payment::PaymentCoordinator;
pub use rate_limit::{InMemoryRateLimiter, RateLimiter, RedisRateLimiter};
