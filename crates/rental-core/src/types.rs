//! # Domain Types
//!
//! Core domain types used throughout Kitshare.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌──────────────────┐   ┌─────────────────────┐  │
//! │  │    Listing      │   │     Booking      │   │ BookingTransition   │  │
//! │  │  ─────────────  │   │  ──────────────  │   │  ─────────────────  │  │
//! │  │  id (UUID)      │◄──│  listing_id (FK) │◄──│  booking_id (FK)    │  │
//! │  │  owner_uid      │   │  owner/renter    │   │  from → to          │  │
//! │  │  daily_price    │   │  price snapshot  │   │  actor_uid          │  │
//! │  │  policy, tier   │   │  status, payment │   │  idempotency_key    │  │
//! │  └─────────────────┘   └──────────────────┘   └─────────────────────┘  │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌──────────────────┐   ┌─────────────────────┐  │
//! │  │ BookingStatus   │   │  PaymentStage    │   │  PaymentStatus      │  │
//! │  │  PENDING_...    │   │  upfront         │   │  pending, paid      │  │
//! │  │  CONFIRMED ...  │   │  rental, settled │   │  failed, refunded   │  │
//! │  └─────────────────┘   └──────────────────┘   └─────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Snapshot Pattern
//! A booking freezes everything that could change on the listing after the
//! renter committed: the daily price, every fee, and the cancellation
//! policy. Editing a listing never reprices existing bookings.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::state_machine::ActorRole;

// =============================================================================
// Booking Status
// =============================================================================

/// Lifecycle state of a booking.
///
/// ```text
/// PENDING_OWNER_APPROVAL ──► CONFIRMED ──► ACTIVE ──► COMPLETED
///        │        │              │
///        ▼        ▼              ▼
///    REJECTED  CANCELLED     CANCELLED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    /// Requested by the renter, waiting for the owner.
    PendingOwnerApproval,
    /// Approved by the owner; rental stage captured.
    Confirmed,
    /// Item handed over.
    Active,
    /// Item returned. Terminal.
    Completed,
    /// Declined by the owner. Terminal.
    Rejected,
    /// Withdrawn by the renter. Terminal.
    Cancelled,
}

impl BookingStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [BookingStatus; 6] = [
        BookingStatus::PendingOwnerApproval,
        BookingStatus::Confirmed,
        BookingStatus::Active,
        BookingStatus::Completed,
        BookingStatus::Rejected,
        BookingStatus::Cancelled,
    ];

    /// Terminal states accept no further transitions or field writes.
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingStatus::Completed | BookingStatus::Rejected | BookingStatus::Cancelled
        )
    }

    /// Whether a booking in this state occupies the listing's calendar.
    ///
    /// Pending requests do not block each other; the first owner
    /// confirmation wins.
    pub const fn blocks_availability(&self) -> bool {
        matches!(self, BookingStatus::Confirmed | BookingStatus::Active)
    }

    /// Wire/database representation.
    pub const fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::PendingOwnerApproval => "PENDING_OWNER_APPROVAL",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Active => "ACTIVE",
            BookingStatus::Completed => "COMPLETED",
            BookingStatus::Rejected => "REJECTED",
            BookingStatus::Cancelled => "CANCELLED",
        }
    }
}

impl Default for BookingStatus {
    fn default() -> Self {
        BookingStatus::PendingOwnerApproval
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Payment Stage & Status
// =============================================================================

/// Which of the two charges the booking is currently at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStage {
    /// Platform fee and guarantee, authorized at request time.
    Upfront,
    /// Rental fee, captured at confirmation.
    Rental,
    /// Both stages resolved (completed or refunded).
    Settled,
}

impl PaymentStage {
    pub const fn as_str(&self) -> &'static str {
        match self {
            PaymentStage::Upfront => "upfront",
            PaymentStage::Rental => "rental",
            PaymentStage::Settled => "settled",
        }
    }
}

/// Outcome of the most recent payment operation on the booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

// =============================================================================
// Listing-Side Enums
// =============================================================================

/// How the item reaches the renter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMethod {
    /// Renter collects the item. No delivery fee.
    #[default]
    Pickup,
    /// Owner delivers the item for the listing's delivery fee.
    Delivery,
}

/// Damage protection purchased with the booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum GuaranteeTier {
    #[default]
    None,
    Basic,
    Standard,
    Premium,
}

/// Owner loyalty level; higher tiers pay a reduced service fee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum LoyaltyTier {
    #[default]
    None,
    Silver,
    Gold,
    Platinum,
}

/// Refund rules applied when a renter cancels a confirmed booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum CancellationPolicy {
    #[default]
    Flexible,
    Moderate,
    Strict,
}

/// Publication state of a listing. Only active listings can be booked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum ListingStatus {
    Active,
    Paused,
    Archived,
}

// =============================================================================
// Listing
// =============================================================================

/// An item offered for rent. Read-only for the booking engine.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// User who owns the item and approves requests.
    pub owner_uid: String,

    /// Display title.
    pub title: String,

    /// Price per day in cents.
    pub daily_price_cents: i64,

    pub status: ListingStatus,

    /// Free-form pickup area shown to renters.
    pub location: Option<String>,

    /// Declared replacement value, the base for the guarantee premium.
    pub gear_value_cents: i64,

    /// Flat fee charged when the renter picks delivery.
    pub delivery_fee_cents: i64,

    pub owner_loyalty_tier: LoyaltyTier,

    pub cancellation_policy: CancellationPolicy,

    /// Bumped by every booking write that claims calendar time.
    pub availability_version: i64,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Listing {
    #[inline]
    pub fn daily_price(&self) -> Money {
        Money::from_cents(self.daily_price_cents)
    }

    #[inline]
    pub fn gear_value(&self) -> Money {
        Money::from_cents(self.gear_value_cents)
    }

    #[inline]
    pub fn delivery_fee(&self) -> Money {
        Money::from_cents(self.delivery_fee_cents)
    }

    #[inline]
    pub fn is_bookable(&self) -> bool {
        self.status == ListingStatus::Active
    }
}

// =============================================================================
// Booking
// =============================================================================

/// A renter's reservation of a listing for an inclusive date range.
///
/// ## Invariants
/// - `start_date <= end_date`
/// - `total = subtotal + service_fee + delivery_fee + guarantee_cost`
/// - `upfront_payment_id`, `rental_payment_id` and `refund_id` are written once
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: String,
    pub listing_id: String,
    pub owner_uid: String,
    pub renter_uid: String,

    #[ts(as = "String")]
    pub start_date: NaiveDate,
    #[ts(as = "String")]
    pub end_date: NaiveDate,
    pub days: i64,

    /// Listing price per day at booking time (frozen).
    pub daily_price_cents: i64,
    pub subtotal_cents: i64,
    pub service_fee_cents: i64,
    pub delivery_fee_cents: i64,
    pub guarantee_tier: GuaranteeTier,
    pub guarantee_cost_cents: i64,
    pub total_price_cents: i64,

    pub status: BookingStatus,
    pub payment_stage: PaymentStage,
    pub payment_status: PaymentStatus,
    pub upfront_payment_id: Option<String>,
    pub rental_payment_id: Option<String>,
    pub refund_id: Option<String>,

    pub delivery_method: DeliveryMethod,
    pub pickup_location: Option<String>,
    pub notes: Option<String>,
    pub owner_notes: Option<String>,
    pub renter_notes: Option<String>,
    pub checkout_condition: Option<String>,
    pub return_condition: Option<String>,

    /// Listing policy at booking time (frozen).
    pub cancellation_policy: CancellationPolicy,

    /// Creation key; the booking id is derived from it.
    pub idempotency_key: String,

    /// Row version, incremented on every write.
    pub version: i64,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// Which side of the booking `uid` is on, if any.
    pub fn role_of(&self, uid: &str) -> Option<ActorRole> {
        if uid == self.owner_uid {
            Some(ActorRole::Owner)
        } else if uid == self.renter_uid {
            Some(ActorRole::Renter)
        } else {
            None
        }
    }

    /// The other party, who gets notified about a change made by `role`.
    pub fn counterparty(&self, role: ActorRole) -> &str {
        match role {
            ActorRole::Owner => &self.renter_uid,
            ActorRole::Renter => &self.owner_uid,
        }
    }

    #[inline]
    pub fn subtotal(&self) -> Money {
        Money::from_cents(self.subtotal_cents)
    }

    #[inline]
    pub fn total_price(&self) -> Money {
        Money::from_cents(self.total_price_cents)
    }

    /// Charged at request time: platform fee plus guarantee premium.
    #[inline]
    pub fn upfront_amount(&self) -> Money {
        Money::from_cents(self.service_fee_cents + self.guarantee_cost_cents)
    }

    /// Captured at confirmation: rent plus delivery.
    #[inline]
    pub fn rental_amount(&self) -> Money {
        Money::from_cents(self.subtotal_cents + self.delivery_fee_cents)
    }
}

// =============================================================================
// Booking Transition (audit trail)
// =============================================================================

/// One committed status change.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct BookingTransition {
    pub id: String,
    pub booking_id: String,
    pub from_status: BookingStatus,
    pub to_status: BookingStatus,
    pub actor_uid: String,
    /// Unique; a replayed transition finds its row here.
    pub idempotency_key: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================
