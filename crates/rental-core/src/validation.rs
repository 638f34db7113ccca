//! # Validation Module
//!
//! Input validation utilities for booking requests.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: HTTP extractor (axum Json / Query)                           │
//! │  └── Type validation (deserialization)                                 │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── Identifier and free-text checks                                   │
//! │  └── Date range rules (not in the past, not too long)                  │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK (start_date <= end_date)                                    │
//! │  └── UNIQUE (idempotency_key)                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::NaiveDate;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::MAX_NOTE_LENGTH;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest accepted identifier (uids, listing ids, booking ids).
const MAX_ID_LENGTH: usize = 128;

/// Longest accepted client idempotency key.
const MAX_IDEMPOTENCY_KEY_LENGTH: usize = 255;

/// Upper bound for list page sizes.
pub const MAX_LIST_LIMIT: i64 = 100;

/// Page size when the caller gives none.
pub const DEFAULT_LIST_LIMIT: i64 = 20;

// =============================================================================
// String Validators
// =============================================================================

/// Validates an opaque identifier.
///
/// ## Rules
/// - Must not be empty
/// - At most 128 characters
/// - Letters, digits, `-`, `_` and `:` only
///
/// ## Example
/// ```rust
/// use rental_core::validation::validate_id;
///
/// assert!(validate_id("listing_id", "5f0c2b1e-7a").is_ok());
/// assert!(validate_id("listing_id", "").is_err());
/// assert!(validate_id("listing_id", "a b").is_err());
/// ```
pub fn validate_id(field: &str, value: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.len() > MAX_ID_LENGTH {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_ID_LENGTH,
        });
    }

    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == ':')
    {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "must contain only letters, numbers, '-', '_' and ':'".to_string(),
        });
    }

    Ok(())
}

/// Validates a free-text field and normalizes it.
///
/// ## Returns
/// The trimmed text, or `None` when the input was blank.
pub fn validate_note(field: &str, value: Option<&str>) -> ValidationResult<Option<String>> {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };

    if value.chars().count() > MAX_NOTE_LENGTH {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_NOTE_LENGTH,
        });
    }

    Ok(Some(value.to_string()))
}

/// Validates a client-supplied idempotency key (printable ASCII, ≤ 255).
pub fn validate_idempotency_key(key: &str) -> ValidationResult<()> {
    if key.is_empty() {
        return Err(ValidationError::Required {
            field: "idempotency_key".to_string(),
        });
    }

    if key.len() > MAX_IDEMPOTENCY_KEY_LENGTH {
        return Err(ValidationError::TooLong {
            field: "idempotency_key".to_string(),
            max: MAX_IDEMPOTENCY_KEY_LENGTH,
        });
    }

    if !key.chars().all(|c| c.is_ascii_graphic()) {
        return Err(ValidationError::InvalidFormat {
            field: "idempotency_key".to_string(),
            reason: "must be printable ASCII without spaces".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Date Validators
// =============================================================================

/// Validates a requested rental window against `today`.
///
/// ## Rules
/// - `start_date >= today`
/// - `end_date >= start_date`
///
/// Length is not capped; pricing rejects ranges whose totals overflow.
pub fn validate_booking_dates(start: NaiveDate, end: NaiveDate, today: NaiveDate) -> CoreResult<()> {
    if start < today {
        return Err(CoreError::StartInPast { start, today });
    }

    if end < start {
        return Err(CoreError::InvalidDateRange { start, end });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Normalizes a list page size: default when absent, error when out of range.
pub fn validate_list_limit(limit: Option<i64>) -> ValidationResult<i64> {
    match limit {
        None => Ok(DEFAULT_LIST_LIMIT),
        Some(l) if (1..=MAX_LIST_LIMIT).contains(&l) => Ok(l),
        Some(_) => Err(ValidationError::OutOfRange {
            field: "limit".to_string(),
            min: 1,
            max: MAX_LIST_LIMIT,
        }),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, d).unwrap()
    }

    #[test]
    fn test_validate_id() {
        assert!(validate_id("id", "abc-123_x:y").is_ok());
        assert!(matches!(validate_id("id", "  "), Err(ValidationError::Required { .. })));
        assert!(matches!(
            validate_id("id", &"a".repeat(129)),
            Err(ValidationError::TooLong { .. })
        ));
        assert!(matches!(
            validate_id("id", "drop table"),
            Err(ValidationError::InvalidFormat { .. })
        ));
    }

    #[test]
    fn test_validate_note_trims_and_drops_blank() {
        assert_eq!(validate_note("notes", Some("  hi  ")).unwrap(), Some("hi".to_string()));
        assert_eq!(validate_note("notes", Some("   ")).unwrap(), None);
        assert_eq!(validate_note("notes", None).unwrap(), None);
        assert!(validate_note("notes", Some(&"x".repeat(MAX_NOTE_LENGTH + 1))).is_err());
    }

    #[test]
    fn test_validate_idempotency_key() {
        assert!(validate_idempotency_key("req-8d1f").is_ok());
        assert!(validate_idempotency_key("").is_err());
        assert!(validate_idempotency_key("has space").is_err());
    }

    #[test]
    fn test_booking_dates() {
        let today = date(3, 10);
        assert!(validate_booking_dates(date(3, 10), date(3, 10), today).is_ok());
        assert!(matches!(
            validate_booking_dates(date(3, 9), date(3, 12), today),
            Err(CoreError::StartInPast { .. })
        ));
        assert!(matches!(
            validate_booking_dates(date(3, 12), date(3, 11), today),
            Err(CoreError::InvalidDateRange { .. })
        ));
        // Season-long rentals are fine.
        assert!(validate_booking_dates(date(3, 10), date(7, 10), today).is_ok());
    }

    #[test]
    fn test_list_limit() {
        assert_eq!(validate_list_limit(None).unwrap(), DEFAULT_LIST_LIMIT);
        assert_eq!(validate_list_limit(Some(5)).unwrap(), 5);
        assert!(validate_list_limit(Some(0)).is_err());
        assert!(validate_list_limit(Some(101)).is_err());
    }
}
