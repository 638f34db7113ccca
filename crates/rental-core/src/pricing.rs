//! # Pricing Calculator
//!
//! Turns a listing's daily rate and a date range into a full price
//! breakdown, including the optional guarantee premium and the owner's
//! loyalty discount on the service fee.
//!
//! ## Formula
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  days           = max(1, end - start)          (same-day rental = 1)   │
//! │  subtotal       = daily_rate × days                                     │
//! │  service_fee    = round(subtotal × 10% × (1 - loyalty_reduction))       │
//! │  delivery_fee   = delivery ? listing.delivery_fee : 0                   │
//! │  guarantee_cost = round(gear_value × tier% × max(1, days / 7))          │
//! │  total          = subtotal + service_fee + delivery_fee + guarantee     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every percentage is a [`Rate`] in basis points and every product of rates
//! is kept as one exact i128 fraction until the single final rounding.
//! `days / 7` is a true ratio (10 days = 10/7 weeks), floored at one week.
//!
//! ## Scenario
//! ```text
//! $45/day, 2024-03-15 → 2024-03-18, pickup, no guarantee
//!      │
//!      ▼
//! days 3, subtotal $135, service fee $13.50 → $14, total $149
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::{Money, Rate, Rounding, BPS_SCALE};
use crate::types::{DeliveryMethod, GuaranteeTier, LoyaltyTier};

/// Days in the guarantee's pricing week.
const GUARANTEE_WEEK_DAYS: i128 = 7;

// =============================================================================
// Fee Schedule
// =============================================================================

/// Configurable percentages used by [`compute_price`].
///
/// Loaded from the `[pricing]` section of the engine config; every field
/// has a default so a partial section is fine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct FeeSchedule {
    /// Platform fee on the subtotal (1000 = 10%).
    #[serde(default = "default_service_fee_bps")]
    pub service_fee_bps: u32,

    #[serde(default = "default_guarantee_basic_bps")]
    pub guarantee_basic_bps: u32,

    #[serde(default = "default_guarantee_standard_bps")]
    pub guarantee_standard_bps: u32,

    #[serde(default = "default_guarantee_premium_bps")]
    pub guarantee_premium_bps: u32,

    /// Fraction of the service fee waived per loyalty tier.
    #[serde(default = "default_loyalty_silver_bps")]
    pub loyalty_silver_bps: u32,

    #[serde(default = "default_loyalty_gold_bps")]
    pub loyalty_gold_bps: u32,

    #[serde(default = "default_loyalty_platinum_bps")]
    pub loyalty_platinum_bps: u32,

    /// Where fees are rounded to.
    #[serde(default)]
    pub rounding: Rounding,
}

fn default_service_fee_bps() -> u32 {
    1000
}

fn default_guarantee_basic_bps() -> u32 {
    800
}

fn default_guarantee_standard_bps() -> u32 {
    1200
}

fn default_guarantee_premium_bps() -> u32 {
    1800
}

fn default_loyalty_silver_bps() -> u32 {
    1000
}

fn default_loyalty_gold_bps() -> u32 {
    2500
}

fn default_loyalty_platinum_bps() -> u32 {
    5000
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            service_fee_bps: default_service_fee_bps(),
            guarantee_basic_bps: default_guarantee_basic_bps(),
            guarantee_standard_bps: default_guarantee_standard_bps(),
            guarantee_premium_bps: default_guarantee_premium_bps(),
            loyalty_silver_bps: default_loyalty_silver_bps(),
            loyalty_gold_bps: default_loyalty_gold_bps(),
            loyalty_platinum_bps: default_loyalty_platinum_bps(),
            rounding: Rounding::default(),
        }
    }
}

impl FeeSchedule {
    /// Premium percentage for a guarantee tier. `None` is always zero.
    pub fn guarantee_rate(&self, tier: GuaranteeTier) -> Rate {
        match tier {
            GuaranteeTier::None => Rate::zero(),
            GuaranteeTier::Basic => Rate::from_bps(self.guarantee_basic_bps),
            GuaranteeTier::Standard => Rate::from_bps(self.guarantee_standard_bps),
            GuaranteeTier::Premium => Rate::from_bps(self.guarantee_premium_bps),
        }
    }

    /// Service fee reduction for a loyalty tier.
    pub fn loyalty_reduction(&self, tier: LoyaltyTier) -> Rate {
        match tier {
            LoyaltyTier::None => Rate::zero(),
            LoyaltyTier::Silver => Rate::from_bps(self.loyalty_silver_bps),
            LoyaltyTier::Gold => Rate::from_bps(self.loyalty_gold_bps),
            LoyaltyTier::Platinum => Rate::from_bps(self.loyalty_platinum_bps),
        }
    }

    /// Checks that every loyalty reduction is at most 100%.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (field, bps) in [
            ("loyalty_silver_bps", self.loyalty_silver_bps),
            ("loyalty_gold_bps", self.loyalty_gold_bps),
            ("loyalty_platinum_bps", self.loyalty_platinum_bps),
        ] {
            if bps as i128 > BPS_SCALE {
                return Err(ValidationError::OutOfRange {
                    field: field.to_string(),
                    min: 0,
                    max: BPS_SCALE as i64,
                });
            }
        }
        Ok(())
    }
}

// =============================================================================
// Request & Breakdown
// =============================================================================

/// Inputs to a price computation.
#[derive(Debug, Clone)]
pub struct PriceRequest {
    pub daily_rate: Money,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub delivery_method: DeliveryMethod,
    /// Listing's delivery fee; only charged for [`DeliveryMethod::Delivery`].
    pub delivery_fee: Money,
    pub guarantee_tier: GuaranteeTier,
    pub gear_value: Money,
    /// Service fee reduction in basis points (2500 = 25% off the fee).
    pub fee_reduction_bps: u32,
}

/// Result of a price computation, shown to the renter before they commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct PriceBreakdown {
    pub days: i64,
    pub daily_rate: Money,
    pub subtotal: Money,
    pub service_fee: Money,
    pub delivery_fee: Money,
    pub guarantee_tier: GuaranteeTier,
    pub guarantee_cost: Money,
    pub total: Money,
}

impl PriceBreakdown {
    /// Charged at request time.
    pub fn upfront_amount(&self) -> Money {
        self.service_fee + self.guarantee_cost
    }

    /// Captured at confirmation.
    pub fn rental_amount(&self) -> Money {
        self.subtotal + self.delivery_fee
    }
}

// =============================================================================
// Computation
// =============================================================================

/// Number of billable days for an inclusive date range.
///
/// ## Example
/// ```rust
/// use chrono::NaiveDate;
/// use rental_core::pricing::rental_days;
///
/// let d = |day| NaiveDate::from_ymd_opt(2024, 3, day).unwrap();
/// assert_eq!(rental_days(d(15), d(18)).unwrap(), 3);
/// assert_eq!(rental_days(d(15), d(15)).unwrap(), 1);
/// ```
pub fn rental_days(start: NaiveDate, end: NaiveDate) -> CoreResult<i64> {
    if end < start {
        return Err(CoreError::InvalidDateRange { start, end });
    }
    Ok((end - start).num_days().max(1))
}

/// Computes the full price breakdown for a reservation.
///
/// Pure and deterministic: the same request and schedule always produce the
/// same breakdown.
///
/// ## Errors
/// - [`CoreError::InvalidDateRange`] if `end_date < start_date`
/// - [`CoreError::Validation`] if the fee reduction exceeds 100%, or any
///   amount overflows `i64` cents
pub fn compute_price(request: &PriceRequest, schedule: &FeeSchedule) -> CoreResult<PriceBreakdown> {
    let days = rental_days(request.start_date, request.end_date)?;

    if request.fee_reduction_bps as i128 > BPS_SCALE {
        return Err(ValidationError::OutOfRange {
            field: "fee_reduction_bps".to_string(),
            min: 0,
            max: BPS_SCALE as i64,
        }
        .into());
    }

    let subtotal = request
        .daily_rate
        .checked_multiply_quantity(days)
        .ok_or_else(|| too_large("subtotal"))?;

    // subtotal × service% × (1 - reduction%), one fraction, one rounding
    let reduction = Rate::from_bps(request.fee_reduction_bps);
    let service_fee = (subtotal.cents() as i128)
        .checked_mul(schedule.service_fee_bps as i128)
        .and_then(|n| n.checked_mul(reduction.complement().bps() as i128))
        .and_then(|n| Money::try_from_ratio(n, BPS_SCALE * BPS_SCALE, schedule.rounding))
        .ok_or_else(|| too_large("service_fee"))?;

    let delivery_fee = match request.delivery_method {
        DeliveryMethod::Delivery => request.delivery_fee,
        DeliveryMethod::Pickup => Money::zero(),
    };

    // gear × tier% × max(7, days) / 7
    let tier_rate = schedule.guarantee_rate(request.guarantee_tier);
    let weeks_num = (days as i128).max(GUARANTEE_WEEK_DAYS);
    let guarantee_cost = (request.gear_value.cents() as i128)
        .checked_mul(tier_rate.bps() as i128)
        .and_then(|n| n.checked_mul(weeks_num))
        .and_then(|n| Money::try_from_ratio(n, BPS_SCALE * GUARANTEE_WEEK_DAYS, schedule.rounding))
        .ok_or_else(|| too_large("guarantee_cost"))?;

    let total = subtotal
        .checked_add(service_fee)
        .and_then(|t| t.checked_add(delivery_fee))
        .and_then(|t| t.checked_add(guarantee_cost))
        .ok_or_else(|| too_large("total"))?;

    Ok(PriceBreakdown {
        days,
        daily_rate: request.daily_rate,
        subtotal,
        service_fee,
        delivery_fee,
        guarantee_tier: request.guarantee_tier,
        guarantee_cost,
        total,
    })
}

fn too_large(field: &str) -> CoreError {
    ValidationError::OutOfRange {
        field: field.to_string(),
        min: 0,
        max: i64::MAX,
    }
    .into()
}

// =============================================================================
// Unit Tests
// =============================================================================
