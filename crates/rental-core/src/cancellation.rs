//! # Cancellation Policies
//!
//! How much money goes back to the renter when a booking ends early.
//!
//! ```text
//! ┌──────────────────────────┬──────────────────────────────────────────────┐
//! │ Booking was...           │ Refund                                       │
//! ├──────────────────────────┼──────────────────────────────────────────────┤
//! │ pending (reject/cancel)  │ full upfront charge                          │
//! │ confirmed, then cancelled│ policy % of the rental charge; upfront kept  │
//! └──────────────────────────┴──────────────────────────────────────────────┘
//!
//!   policy     ≥7d   ≥5d   ≥1d   same day / after start
//!   flexible   100   100   100   50  (100 until the start date)
//!   moderate   100   100    50    0
//!   strict      50     0     0    0
//! ```

use chrono::NaiveDate;

use crate::money::{Money, Rate, Rounding};
use crate::types::{Booking, BookingStatus, CancellationPolicy};

// =============================================================================
// Strategy Trait
// =============================================================================

/// Refund percentage as a function of notice given.
pub trait CancellationStrategy: Send + Sync {
    /// `days_notice` is `start_date - today`; zero on the start day, negative
    /// once the rental has begun.
    fn refund_rate(&self, days_notice: i64) -> Rate;
}

/// Full refund up to the day before pickup, half after.
#[derive(Debug, Clone, Copy, Default)]
pub struct Flexible;

impl CancellationStrategy for Flexible {
    fn refund_rate(&self, days_notice: i64) -> Rate {
        if days_notice > 0 {
            Rate::full()
        } else {
            Rate::from_bps(5000)
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Moderate;

impl CancellationStrategy for Moderate {
    fn refund_rate(&self, days_notice: i64) -> Rate {
        match days_notice {
            d if d >= 5 => Rate::full(),
            d if d >= 1 => Rate::from_bps(5000),
            _ => Rate::zero(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Strict;

impl CancellationStrategy for Strict {
    fn refund_rate(&self, days_notice: i64) -> Rate {
        if days_notice >= 7 {
            Rate::from_bps(5000)
        } else {
            Rate::zero()
        }
    }
}

/// The strategy for a policy snapshot.
pub fn strategy_for(policy: CancellationPolicy) -> &'static dyn CancellationStrategy {
    match policy {
        CancellationPolicy::Flexible => &Flexible,
        CancellationPolicy::Moderate => &Moderate,
        CancellationPolicy::Strict => &Strict,
    }
}

// =============================================================================
// Refund Planning
// =============================================================================

/// A refund to issue against one captured payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefundPlan {
    pub payment_id: String,
    pub amount: Money,
}

/// Decides what to refund when `booking` leaves its current status for
/// `target` (`Rejected` or `Cancelled`) on `today`.
///
/// Returns `None` when nothing is owed: no payment was taken, or the policy
/// keeps the whole rental charge.
pub fn plan_refund(booking: &Booking, target: BookingStatus, today: NaiveDate) -> Option<RefundPlan> {
    if !matches!(target, BookingStatus::Rejected | BookingStatus::Cancelled) {
        return None;
    }

    let plan = match booking.status {
        BookingStatus::PendingOwnerApproval => RefundPlan {
            payment_id: booking.upfront_payment_id.clone()?,
            amount: booking.upfront_amount(),
        },
        BookingStatus::Confirmed => {
            let days_notice = (booking.start_date - today).num_days();
            let rate = strategy_for(booking.cancellation_policy).refund_rate(days_notice);
            RefundPlan {
                payment_id: booking.rental_payment_id.clone()?,
                amount: booking.rental_amount().apply_rate(rate, Rounding::Cent),
            }
        }
        _ => return None,
    };

    plan.amount.is_positive().then_some(plan)
}

// =============================================================================
// Unit Tests
// =============================================================================
