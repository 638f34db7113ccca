//! # Domain Errors
//!
//! Rule violations detected before anything touches storage or money. The
//! engine maps each one onto a client-facing error kind:
//!
//! ```text
//! CoreError::InvalidDateRange ─┬─► InvalidDateRange
//! CoreError::StartInPast ──────┘
//! CoreError::Transition ───────► Forbidden | InvalidStateTransition | InvalidState
//! CoreError::Validation ───────► Validation
//! ```

use chrono::NaiveDate;
use thiserror::Error;

use crate::state_machine::TransitionError;

// =============================================================================
// Core Error
// =============================================================================

#[derive(Debug, Error)]
pub enum CoreError {
    /// End date before start date.
    #[error("Invalid date range: {start} to {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    #[error("Start date {start} is before today ({today})")]
    StartInPast { start: NaiveDate, today: NaiveDate },

    /// Status change or field write refused by the state machine, e.g. an
    /// owner cancelling a confirmed booking.
    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Malformed request fields. Reported as `VALIDATION_ERROR`.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: String },

    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Unparseable value, e.g. an unknown status string.
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

pub type CoreResult<T> = Result<T, CoreError>;
