//! # Database Error Types
//!
//! ```text
//! ┌───────────────────────────────────────┬────────────────────────────────┐
//! │ sqlx / SQLite                         │ DbError                        │
//! ├───────────────────────────────────────┼────────────────────────────────┤
//! │ RowNotFound                           │ NotFound                       │
//! │ UNIQUE constraint failed: t.col       │ UniqueViolation { "t.col" }    │
//! │ FOREIGN KEY constraint failed         │ ForeignKeyViolation            │
//! │ SQLITE_BUSY after busy_timeout        │ Busy                           │
//! │ PoolTimedOut                          │ PoolExhausted                  │
//! │ PoolClosed                            │ ConnectionFailed               │
//! │ other database message                │ QueryFailed                    │
//! │ anything else                         │ Internal                       │
//! └───────────────────────────────────────┴────────────────────────────────┘
//! ```
//!
//! The engine turns `NotFound` into its own not-found error and everything
//! else into an internal error.

use thiserror::Error;

/// SQLite primary result code for a lock that was not released in time.
const SQLITE_BUSY: &str = "5";

#[derive(Debug, Error)]
pub enum DbError {
    /// A listing or booking row is missing.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A unique index rejected the write.
    ///
    /// ## When This Occurs
    /// - Two requests create a booking with the same creation key
    /// - The same transition key is recorded twice
    #[error("Unique constraint failed on {constraint}")]
    UniqueViolation { constraint: String },

    /// A booking references a listing that does not exist.
    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    /// Another writer held the database lock past `busy_timeout`.
    #[error("Database is busy")]
    Busy,

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// No connection became free within the acquire timeout.
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// A stored row could not be turned back into a domain value.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Whether a unique index on `column` (`"idempotency_key"` or
    /// `"bookings.id"`) rejected the write.
    pub fn is_unique_on(&self, column: &str) -> bool {
        matches!(self, DbError::UniqueViolation { constraint } if constraint.ends_with(column))
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::not_found("Record", "unknown"),
            sqlx::Error::Database(db_err) => {
                let message = db_err.message();

                if db_err.is_unique_violation() {
                    let constraint = message
                        .strip_prefix("UNIQUE constraint failed: ")
                        .unwrap_or(message)
                        .to_string();
                    DbError::UniqueViolation { constraint }
                } else if db_err.is_foreign_key_violation() {
                    DbError::ForeignKeyViolation(message.to_string())
                } else if db_err.code().as_deref() == Some(SQLITE_BUSY) {
                    DbError::Busy
                } else {
                    DbError::QueryFailed(message.to_string())
                }
            }
            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,
            sqlx::Error::PoolClosed => DbError::ConnectionFailed("pool is closed".to_string()),
            other => DbError::Internal(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_unique_on() {
        let err = DbError::UniqueViolation {
            constraint: "bookings.idempotency_key".into(),
        };
        assert!(err.is_unique_on("idempotency_key"));
        assert!(!err.is_unique_on("bookings.id"));
        assert!(!DbError::not_found("Booking", "b").is_unique_on("idempotency_key"));
    }

    #[test]
    fn test_pool_errors() {
        assert!(matches!(DbError::from(sqlx::Error::PoolTimedOut), DbError::PoolExhausted));
        assert!(matches!(
            DbError::from(sqlx::Error::RowNotFound),
            DbError::NotFound { .. }
        ));
    }
}
