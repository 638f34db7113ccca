//! # Engine Error Types
//!
//! The booking engine's error taxonomy. Every lower-level failure is
//! converted into one of these before it leaves the crate.
//!
//! ## Error Mapping
//! ```text
//! ┌───────────────────────────────────┬───────────────────────────────────┐
//! │ Source                            │ EngineError                       │
//! ├───────────────────────────────────┼───────────────────────────────────┤
//! │ CoreError::InvalidDateRange       │ InvalidDateRange                  │
//! │ CoreError::StartInPast            │ InvalidDateRange                  │
//! │ TransitionError::NotAParty        │ Forbidden                         │
//! │ TransitionError::RoleNotAllowed   │ Forbidden                         │
//! │ TransitionError::FieldNotWritable │ Forbidden                         │
//! │ TransitionError::InvalidTransition│ InvalidStateTransition            │
//! │ TransitionError::BookingClosed    │ InvalidState                      │
//! │ ValidationError                   │ Validation                        │
//! │ DbError::NotFound                 │ NotFound                          │
//! │ DbError::*                        │ Internal                          │
//! │ GatewayError::*                   │ PaymentFailed                     │
//! └───────────────────────────────────┴───────────────────────────────────┘
//! ```

use thiserror::Error;

use crate::gateway::GatewayError;
use rental_core::{CoreError, TransitionError, ValidationError};
use rental_db::DbError;

// =============================================================================
// Error Kind
// =============================================================================

/// Coarse classification used by callers to pick a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidDateRange,
    NotFound,
    Forbidden,
    Conflict,
    InvalidStateTransition,
    InvalidState,
    PaymentFailed,
    RateLimited,
    Validation,
    Internal,
}

impl ErrorKind {
    /// Stable machine-readable code.
    pub const fn code(&self) -> &'static str {
        match self {
            ErrorKind::InvalidDateRange => "INVALID_DATE_RANGE",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Forbidden => "FORBIDDEN",
            ErrorKind::Conflict => "CONFLICT",
            ErrorKind::InvalidStateTransition => "INVALID_STATE_TRANSITION",
            ErrorKind::InvalidState => "INVALID_STATE",
            ErrorKind::PaymentFailed => "PAYMENT_FAILED",
            ErrorKind::RateLimited => "RATE_LIMITED",
            ErrorKind::Validation => "VALIDATION_ERROR",
            ErrorKind::Internal => "INTERNAL_ERROR",
        }
    }
}

// =============================================================================
// Engine Error
// =============================================================================

/// Errors returned by the booking engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Dates are reversed, in the past, or span too long.
    #[error("Invalid date range: {0}")]
    InvalidDateRange(String),

    /// Listing or booking does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Caller is not a party, or their role may not do this.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The dates overlap a confirmed or active booking.
    ///
    /// ## When This Occurs
    /// - Creating a booking over a confirmed reservation
    /// - Confirming a booking after another overlapping one was confirmed
    #[error("Dates overlap booking {conflicting_booking_id}")]
    Conflict { conflicting_booking_id: String },

    /// The requested status change is not allowed from the current status,
    /// or another request changed the status first.
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    /// Listing is not bookable, or the booking is closed.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The payment gateway refused or could not complete a charge.
    #[error("Payment failed: {0}")]
    PaymentFailed(String),

    /// Too many updates from one caller.
    #[error("Rate limited, retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// Malformed input.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Storage or other unexpected failure.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        EngineError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Returns the classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::InvalidDateRange(_) => ErrorKind::InvalidDateRange,
            EngineError::NotFound { .. } => ErrorKind::NotFound,
            EngineError::Forbidden(_) => ErrorKind::Forbidden,
            EngineError::Conflict { .. } => ErrorKind::Conflict,
            EngineError::InvalidStateTransition(_) => ErrorKind::InvalidStateTransition,
            EngineError::InvalidState(_) => ErrorKind::InvalidState,
            EngineError::PaymentFailed(_) => ErrorKind::PaymentFailed,
            EngineError::RateLimited { .. } => ErrorKind::RateLimited,
            EngineError::Validation(_) => ErrorKind::Validation,
            EngineError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        self.kind().code()
    }
}

// =============================================================================
// Conversions
// =============================================================================

impl From<CoreError> for EngineError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidDateRange { .. } | CoreError::StartInPast { .. } => {
                EngineError::InvalidDateRange(err.to_string())
            }
            CoreError::Transition(e) => e.into(),
            CoreError::Validation(e) => e.into(),
        }
    }
}

impl From<TransitionError> for EngineError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::NotAParty
            | TransitionError::RoleNotAllowed { .. }
            | TransitionError::FieldNotWritable { .. } => EngineError::Forbidden(err.to_string()),
            TransitionError::InvalidTransition { .. } => {
                EngineError::InvalidStateTransition(err.to_string())
            }
            TransitionError::BookingClosed { .. } => EngineError::InvalidState(err.to_string()),
        }
    }
}

impl From<ValidationError> for EngineError {
    fn from(err: ValidationError) -> Self {
        EngineError::Validation(err.to_string())
    }
}

impl From<DbError> for EngineError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => EngineError::NotFound { entity, id },
            other => EngineError::Internal(other.to_string()),
        }
    }
}

impl From<GatewayError> for EngineError {
    fn from(err: GatewayError) -> Self {
        EngineError::PaymentFailed(err.to_string())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
