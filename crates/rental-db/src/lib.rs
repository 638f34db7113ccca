//! # rental-db
//!
//! SQLite storage for listings and bookings, plus the status change log.
//!
//! ```text
//!   rental-engine
//!        │  db.bookings() / db.listings()
//!        ▼
//!   ┌──────────────────────────── rental-db ─────────────────────────────┐
//!   │  Database ── SqlitePool (WAL) ── migrations run on open            │
//!   │                                                                    │
//!   │  BookingRepository   reads, conflict scans, insert_checked,        │
//!   │                      apply_transition, payment/details updates     │
//!   │  ListingRepository   reads, inserts, availability_version bumps    │
//!   └────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Pricing and state rules live in `rental-core`. This crate only enforces
//! what must hold inside a single write transaction: no two confirmed
//! bookings on a listing overlap, a creation key maps to one booking, and
//! a status change only applies from the status the caller last saw.
//!
//! ```rust,ignore
//! let db = Database::new(DbConfig::new("kitshare.db")).await?;
//! let booking = db.bookings().get_by_id(&id).await?;
//! ```

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::booking::{
    BookingRepository, DetailsPatch, InsertOutcome, PaymentUpdate, StatusChange, TransitionOutcome,
};
pub use repository::listing::ListingRepository;
