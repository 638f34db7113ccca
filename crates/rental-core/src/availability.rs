//! # Availability
//!
//! Pure overlap detection over inclusive calendar ranges. The storage layer
//! loads the blocking ranges for a listing (inside the write transaction)
//! and hands them to [`has_conflict`].
//!
//! ## Overlap Rule
//! ```text
//! [s1 ─────── e1]
//!           [s2 ─────── e2]        s1 <= e2 && e1 >= s2  → overlap
//!
//! [s1 ── e1]
//!           [s2 ── e2]             e1 == s2 (shared day) → overlap
//!
//! [s1 ── e1]
//!              [s2 ── e2]          e1 <  s2              → free
//! ```
//!
//! Ranges are inclusive on both ends: a booking that ends on the 5th and one
//! that starts on the 5th both need the item on the 5th.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::types::BookingStatus;

/// Statuses whose bookings occupy the calendar.
pub const BLOCKING_STATUSES: [BookingStatus; 2] = [BookingStatus::Confirmed, BookingStatus::Active];

// =============================================================================
// Date Range
// =============================================================================

/// An inclusive `[start, end]` range of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    /// Builds a range, rejecting `end < start`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> CoreResult<Self> {
        if end < start {
            return Err(CoreError::InvalidDateRange { start, end });
        }
        Ok(Self { start, end })
    }

    #[inline]
    pub fn start(&self) -> NaiveDate {
        self.start
    }

    #[inline]
    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Inclusive overlap test.
    #[inline]
    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.start <= other.end && self.end >= other.start
    }
}

/// A booking's claim on the calendar, as loaded by the storage scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookedRange {
    pub booking_id: String,
    pub range: DateRange,
}

/// Returns the first booked range overlapping `candidate`, skipping
/// `exclude` (the booking being confirmed, which must not conflict with
/// itself).
pub fn find_conflict<'a, I>(candidate: &DateRange, booked: I, exclude: Option<&str>) -> Option<&'a BookedRange>
where
    I: IntoIterator<Item = &'a BookedRange>,
{
    booked
        .into_iter()
        .filter(|b| exclude != Some(b.booking_id.as_str()))
        .find(|b| b.range.overlaps(candidate))
}

/// Whether `candidate` collides with any booked range other than `exclude`.
pub fn has_conflict<'a, I>(candidate: &DateRange, booked: I, exclude: Option<&str>) -> bool
where
    I: IntoIterator<Item = &'a BookedRange>,
{
    find_conflict(candidate, booked, exclude).is_some()
}

// =============================================================================
// Unit Tests
// =============================================================================
