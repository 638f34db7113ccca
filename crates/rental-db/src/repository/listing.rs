//! # Listing Repository
//!
//! Read access to listings plus the availability version bump that every
//! calendar-claiming write transaction starts with.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use rental_core::Listing;

const LISTING_COLUMNS: &str = r#"
    id, owner_uid, title, daily_price_cents, status, location,
    gear_value_cents, delivery_fee_cents, owner_loyalty_tier,
    cancellation_policy, availability_version, created_at, updated_at
"#;

/// Repository for listing database operations.
#[derive(Debug, Clone)]
pub struct ListingRepository {
    pool: SqlitePool,
}

impl ListingRepository {
    /// Creates a new ListingRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ListingRepository { pool }
    }

    /// Gets a listing by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Listing>> {
        let listing = sqlx::query_as::<_, Listing>(&format!(
            "SELECT {LISTING_COLUMNS} FROM listings WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(listing)
    }

    /// Inserts a listing. Used by the seed binary and tests; the listing
    /// service owns listing writes in production.
    pub async fn insert(&self, listing: &Listing) -> DbResult<()> {
        debug!(id = %listing.id, owner = %listing.owner_uid, "Inserting listing");

        sqlx::query(
            r#"
            INSERT INTO listings (
                id, owner_uid, title, daily_price_cents, status, location,
                gear_value_cents, delivery_fee_cents, owner_loyalty_tier,
                cancellation_policy, availability_version, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
        )
        .bind(&listing.id)
        .bind(&listing.owner_uid)
        .bind(&listing.title)
        .bind(listing.daily_price_cents)
        .bind(listing.status)
        .bind(&listing.location)
        .bind(listing.gear_value_cents)
        .bind(listing.delivery_fee_cents)
        .bind(listing.owner_loyalty_tier)
        .bind(listing.cancellation_policy)
        .bind(listing.availability_version)
        .bind(listing.created_at)
        .bind(listing.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Counts listings (for the seed binary's duplicate guard).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM listings")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Increments the listing's availability version on `conn`.
    ///
    /// Run as the first statement of a write transaction: the UPDATE takes
    /// SQLite's write lock, so a second transaction for any listing waits
    /// here until the first commits, and its conflict scan then sees the
    /// committed booking.
    pub async fn bump_availability(conn: &mut SqliteConnection, listing_id: &str) -> DbResult<i64> {
        let version: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE listings
            SET availability_version = availability_version + 1,
                updated_at = ?2
            WHERE id = ?1
            RETURNING availability_version
            "#,
        )
        .bind(listing_id)
        .bind(Utc::now())
        .fetch_optional(&mut *conn)
        .await?;

        let version = version.ok_or_else(|| DbError::not_found("Listing", listing_id))?;
        debug!(listing_id = %listing_id, version, "Availability version bumped");
        Ok(version)
    }
}
