//! # rental-core: Pure Business Logic for Kitshare
//!
//! The booking rules as pure functions: pricing, date overlap, refunds and
//! the role-gated status machine.
//!
//! ```text
//!   apps/api ──► rental-engine ──► rental-core ◄── rental-db
//!                  (orchestrator)     (this crate)    (row types via
//!                                                      the `sqlx` feature)
//! ```
//!
//! No I/O happens here. "Today" and the fee schedule are always passed in.
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Booking, Listing, statuses)
//! - [`money`] - Cents, basis-point rates and single-step rounding
//! - [`pricing`] - Price breakdowns, guarantee and loyalty modifiers
//! - [`availability`] - Inclusive date-range overlap detection
//! - [`state_machine`] - Role-gated booking transitions
//! - [`cancellation`] - Refund amounts per cancellation policy
//! - [`error`] - `CoreError` and `ValidationError`
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use chrono::NaiveDate;
//! use rental_core::money::Money;
//! use rental_core::pricing::{compute_price, FeeSchedule, PriceRequest};
//! use rental_core::types::{DeliveryMethod, GuaranteeTier};
//!
//! let request = PriceRequest {
//!     daily_rate: Money::from_units(45),
//!     start_date: NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
//!     end_date: NaiveDate::from_ymd_opt(2024, 3, 18).unwrap(),
//!     delivery_method: DeliveryMethod::Pickup,
//!     delivery_fee: Money::zero(),
//!     guarantee_tier: GuaranteeTier::None,
//!     gear_value: Money::zero(),
//!     fee_reduction_bps: 0,
//! };
//!
//! let price = compute_price(&request, &FeeSchedule::default()).unwrap();
//! assert_eq!(price.days, 3);
//! assert_eq!(price.total.cents(), 14_900);
//! ```

pub mod availability;
pub mod cancellation;
pub mod error;
pub mod money;
pub mod pricing;
pub mod state_machine;
pub mod types;
pub mod validation;

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use pricing::{compute_price, FeeSchedule, PriceBreakdown, PriceRequest};
pub use state_machine::{ActorRole, TransitionError};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum length of any free-text booking field (notes, conditions).
pub const MAX_NOTE_LENGTH: usize = 2000;
