//! # Money and Rates
//!
//! Amounts are whole cents in an `i64`. Percentages are basis points. A fee
//! that chains several rates (service fee, then loyalty discount) is kept as
//! one exact `i128` fraction and rounded once:
//!
//! ```text
//!   subtotal 13500¢ × 1000 bps × (10000 − 2500) bps
//!   ─────────────────────────────────────────────── = 1012.5¢
//!                   10000 × 10000
//!
//!   Rounding::Cent       → 1013¢
//!   Rounding::WholeUnit  → 1000¢   ($10.125 is below $10.50)
//! ```
//!
//! ```rust
//! use rental_core::money::{Money, Rate, Rounding};
//!
//! let subtotal = Money::from_cents(13_500);
//! let fee = subtotal.apply_rate(Rate::from_bps(1000), Rounding::WholeUnit);
//! assert_eq!(fee.cents(), 1_400);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Mul, Sub};
use ts_rs::TS;

/// Basis points in 100%.
pub const BPS_SCALE: i128 = 10_000;

/// Cents in one dollar.
pub const CENTS_PER_UNIT: i128 = 100;

// =============================================================================
// Money
// =============================================================================

/// An amount in cents. Negative values only appear in intermediate sums.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Whole dollars.
    ///
    /// ```rust
    /// use rental_core::money::Money;
    /// assert_eq!(Money::from_units(45).cents(), 4500);
    /// ```
    #[inline]
    pub const fn from_units(units: i64) -> Self {
        Money(units * CENTS_PER_UNIT as i64)
    }

    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// `self × qty`, e.g. a daily rate times the number of rental days.
    /// `None` on overflow.
    #[inline]
    pub const fn checked_multiply_quantity(&self, qty: i64) -> Option<Self> {
        match self.0.checked_mul(qty) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// `self + other`, `None` on overflow.
    #[inline]
    pub const fn checked_add(&self, other: Money) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// `self × rate`, rounded once. Saturates at the `i64` bounds.
    pub fn apply_rate(&self, rate: Rate, rounding: Rounding) -> Money {
        Money::from_ratio(self.0 as i128 * rate.bps() as i128, BPS_SCALE, rounding)
    }

    /// Rounds `numerator / denominator` cents half-up to the given step,
    /// saturating at the `i64` bounds.
    ///
    /// ```rust
    /// use rental_core::money::{Money, Rounding};
    ///
    /// assert_eq!(Money::from_ratio(10_125, 10, Rounding::Cent).cents(), 1013);
    /// assert_eq!(Money::from_ratio(10_125, 10, Rounding::WholeUnit).cents(), 1000);
    /// ```
    pub fn from_ratio(numerator: i128, denominator: i128, rounding: Rounding) -> Money {
        Money::try_from_ratio(numerator, denominator, rounding).unwrap_or(if numerator < 0 {
            Money(i64::MIN)
        } else {
            Money(i64::MAX)
        })
    }

    /// Like [`Money::from_ratio`], but `None` when the rounded amount does
    /// not fit in `i64` cents.
    pub fn try_from_ratio(numerator: i128, denominator: i128, rounding: Rounding) -> Option<Money> {
        debug_assert!(denominator > 0, "denominator must be positive");
        let step = match rounding {
            Rounding::Cent => 1,
            Rounding::WholeUnit => CENTS_PER_UNIT,
        };
        // floor(n / (step·d) + 1/2), doubled to stay in integers.
        let per_step = step.checked_mul(denominator)?;
        let steps = numerator
            .checked_mul(2)?
            .checked_add(per_step)?
            .div_euclid(per_step.checked_mul(2)?);
        i64::try_from(steps.checked_mul(step)?).ok().map(Money)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}${}.{:02}", sign, abs / 100, abs % 100)
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

// =============================================================================
// Rounding
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Rounding {
    /// Nearest cent, halves up.
    Cent,
    /// Nearest dollar, halves up ($13.50 → $14.00).
    #[default]
    WholeUnit,
}

// =============================================================================
// Rate
// =============================================================================

/// A fraction in basis points; 1000 bps is 10%.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Rate(u32);

impl Rate {
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        Rate(bps)
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn zero() -> Self {
        Rate(0)
    }

    #[inline]
    pub const fn full() -> Self {
        Rate(BPS_SCALE as u32)
    }

    /// `100% − self`, never below zero.
    #[inline]
    pub const fn complement(&self) -> Self {
        Rate((BPS_SCALE as u32).saturating_sub(self.0))
    }
}
