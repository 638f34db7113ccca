//! # Booking Repository
//!
//! Database operations for bookings and their transition history.
//!
//! ## Units of Work
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                 Conflict-Check-Then-Write (one transaction)             │
//! │                                                                         │
//! │  BEGIN                                                                  │
//! │   1. UPDATE listings SET availability_version += 1   ← write lock      │
//! │   2. SELECT blocking ranges for the listing           ← sees commits   │
//! │      └── overlap? → ROLLBACK, return Conflict                          │
//! │   3. INSERT booking            (create)                                │
//! │      UPDATE ... WHERE status=? (confirm, compare-and-swap)             │
//! │   4. INSERT booking_transitions                                        │
//! │  COMMIT                                                                 │
//! │                                                                         │
//! │  No payment gateway call ever happens between BEGIN and COMMIT.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Write-Once Columns
//! `upfront_payment_id`, `rental_payment_id` and `refund_id` are only ever
//! written through `COALESCE(column, ?)`, so a retried write cannot replace
//! a reference that is already set.

use chrono::{NaiveDate, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::listing::ListingRepository;
use rental_core::availability::{find_conflict, BookedRange, DateRange, BLOCKING_STATUSES};
use rental_core::{ActorRole, Booking, BookingStatus, BookingTransition, PaymentStage, PaymentStatus};

const BOOKING_COLUMNS: &str = r#"
    id, listing_id, owner_uid, renter_uid,
    start_date, end_date, days,
    daily_price_cents, subtotal_cents, service_fee_cents, delivery_fee_cents,
    guarantee_tier, guarantee_cost_cents, total_price_cents,
    status, payment_stage, payment_status,
    upfront_payment_id, rental_payment_id, refund_id,
    delivery_method, pickup_location, notes, owner_notes, renter_notes,
    checkout_condition, return_condition,
    cancellation_policy, idempotency_key, version, created_at, updated_at
"#;

const TRANSITION_COLUMNS: &str =
    "id, booking_id, from_status, to_status, actor_uid, idempotency_key, created_at";

// =============================================================================
// Outcomes & Inputs
// =============================================================================

/// Result of [`BookingRepository::insert_checked`].
#[derive(Debug, Clone)]
pub enum InsertOutcome {
    /// The booking was written.
    Created(Booking),
    /// A booking with the same idempotency key already exists.
    Duplicate(Booking),
    /// The dates collide with a blocking booking; nothing was written.
    Conflict { conflicting_booking_id: String },
}

/// Payment columns to write together with a status change.
#[derive(Debug, Clone)]
pub struct PaymentUpdate {
    pub stage: PaymentStage,
    pub status: PaymentStatus,
    /// Set once; ignored if already set.
    pub rental_payment_id: Option<String>,
}

/// A compare-and-swap status change.
#[derive(Debug, Clone)]
pub struct StatusChange {
    pub booking_id: String,
    pub listing_id: String,
    pub from: BookingStatus,
    pub to: BookingStatus,
    pub actor_uid: String,
    pub idempotency_key: String,
    pub payment: Option<PaymentUpdate>,
    /// Re-run the conflict scan (excluding this booking) before writing.
    pub check_availability: bool,
}

/// Result of [`BookingRepository::apply_transition`].
#[derive(Debug, Clone)]
pub enum TransitionOutcome {
    /// The status changed; the updated booking.
    Applied(Booking),
    /// The booking was no longer in `from` (lost a race or stale caller).
    StatusChanged,
    /// Confirming would overlap another blocking booking.
    Conflict { conflicting_booking_id: String },
}

/// Descriptive fields to overwrite. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct DetailsPatch {
    pub owner_notes: Option<String>,
    pub renter_notes: Option<String>,
    pub checkout_condition: Option<String>,
    pub return_condition: Option<String>,
}

impl DetailsPatch {
    pub fn is_empty(&self) -> bool {
        self.owner_notes.is_none()
            && self.renter_notes.is_none()
            && self.checkout_condition.is_none()
            && self.return_condition.is_none()
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for booking database operations.
#[derive(Debug, Clone)]
pub struct BookingRepository {
    pool: SqlitePool,
}

impl BookingRepository {
    /// Creates a new BookingRepository.
    pub fn new(pool: SqlitePool) -> Self {
        BookingRepository { pool }
    }

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    /// Gets a booking by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Booking>> {
        Self::fetch(&self.pool, id).await
    }

    /// Gets the booking created with `key`, if any.
    pub async fn get_by_idempotency_key(&self, key: &str) -> DbResult<Option<Booking>> {
        let booking = sqlx::query_as::<_, Booking>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE idempotency_key = ?1"
        ))
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(booking)
    }

    /// Lists a user's bookings on one side, newest first.
    pub async fn list_for_user(
        &self,
        uid: &str,
        role: ActorRole,
        status: Option<BookingStatus>,
        limit: i64,
    ) -> DbResult<Vec<Booking>> {
        let column = match role {
            ActorRole::Owner => "owner_uid",
            ActorRole::Renter => "renter_uid",
        };

        let bookings = sqlx::query_as::<_, Booking>(&format!(
            r#"
            SELECT {BOOKING_COLUMNS} FROM bookings
            WHERE {column} = ?1 AND (?2 IS NULL OR status = ?2)
            ORDER BY created_at DESC, id
            LIMIT ?3
            "#
        ))
        .bind(uid)
        .bind(status)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(bookings)
    }

    /// Transition history of a booking, oldest first.
    pub async fn transitions(&self, booking_id: &str) -> DbResult<Vec<BookingTransition>> {
        let rows = sqlx::query_as::<_, BookingTransition>(&format!(
            "SELECT {TRANSITION_COLUMNS} FROM booking_transitions WHERE booking_id = ?1 ORDER BY created_at, id"
        ))
        .bind(booking_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Looks up a committed transition by its idempotency key.
    pub async fn transition_by_key(&self, key: &str) -> DbResult<Option<BookingTransition>> {
        let row = sqlx::query_as::<_, BookingTransition>(&format!(
            "SELECT {TRANSITION_COLUMNS} FROM booking_transitions WHERE idempotency_key = ?1"
        ))
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    // -------------------------------------------------------------------------
    // Conflict Scan
    // -------------------------------------------------------------------------

    /// Blocking ranges of `listing_id` that end on or after `from`.
    pub async fn blocking_ranges(
        conn: &mut SqliteConnection,
        listing_id: &str,
        from: NaiveDate,
    ) -> DbResult<Vec<BookedRange>> {
        let rows: Vec<(String, NaiveDate, NaiveDate)> = sqlx::query_as(
            r#"
            SELECT id, start_date, end_date FROM bookings
            WHERE listing_id = ?1 AND status IN (?2, ?3) AND end_date >= ?4
            "#,
        )
        .bind(listing_id)
        .bind(BLOCKING_STATUSES[0])
        .bind(BLOCKING_STATUSES[1])
        .bind(from)
        .fetch_all(&mut *conn)
        .await?;

        rows.into_iter()
            .map(|(booking_id, start, end)| {
                let range = DateRange::new(start, end).map_err(|e| DbError::Internal(e.to_string()))?;
                Ok(BookedRange { booking_id, range })
            })
            .collect()
    }

    /// Returns the id of a blocking booking overlapping `range`, if any.
    ///
    /// Works on the pool or inside an open transaction.
    pub async fn find_conflict(
        conn: &mut SqliteConnection,
        listing_id: &str,
        range: &DateRange,
        exclude_booking_id: Option<&str>,
    ) -> DbResult<Option<String>> {
        let booked = Self::blocking_ranges(conn, listing_id, range.start()).await?;
        Ok(find_conflict(range, &booked, exclude_booking_id).map(|b| b.booking_id.clone()))
    }

    /// Non-transactional conflict check (pre-check before payment).
    pub async fn has_conflict(
        &self,
        listing_id: &str,
        range: &DateRange,
        exclude_booking_id: Option<&str>,
    ) -> DbResult<bool> {
        Ok(self
            .conflicting_booking(listing_id, range, exclude_booking_id)
            .await?
            .is_some())
    }

    /// Like [`has_conflict`](Self::has_conflict), returning the id of the
    /// blocking booking.
    pub async fn conflicting_booking(
        &self,
        listing_id: &str,
        range: &DateRange,
        exclude_booking_id: Option<&str>,
    ) -> DbResult<Option<String>> {
        let mut conn = self.pool.acquire().await?;
        Self::find_conflict(&mut conn, listing_id, range, exclude_booking_id).await
    }

    // -------------------------------------------------------------------------
    // Writes
    // -------------------------------------------------------------------------

    /// Inserts a new booking after re-checking availability in the same
    /// transaction.
    pub async fn insert_checked(&self, booking: &Booking) -> DbResult<InsertOutcome> {
        let range = DateRange::new(booking.start_date, booking.end_date)
            .map_err(|e| DbError::Internal(e.to_string()))?;

        let mut tx = self.pool.begin().await?;

        ListingRepository::bump_availability(&mut tx, &booking.listing_id).await?;

        if let Some(conflicting_booking_id) =
            Self::find_conflict(&mut tx, &booking.listing_id, &range, None).await?
        {
            tx.rollback().await?;
            return Ok(InsertOutcome::Conflict { conflicting_booking_id });
        }

        match Self::insert(&mut tx, booking).await {
            Ok(()) => {}
            Err(e) if e.is_unique_on("idempotency_key") || e.is_unique_on("bookings.id") => {
                tx.rollback().await?;
                let existing = self
                    .get_by_idempotency_key(&booking.idempotency_key)
                    .await?
                    .ok_or_else(|| DbError::not_found("Booking", &booking.idempotency_key))?;
                debug!(id = %existing.id, "Duplicate booking insert");
                return Ok(InsertOutcome::Duplicate(existing));
            }
            Err(e) => return Err(e),
        }

        let created = Self::fetch(&mut *tx, &booking.id)
            .await?
            .ok_or_else(|| DbError::not_found("Booking", &booking.id))?;
        tx.commit().await?;

        info!(id = %created.id, listing_id = %created.listing_id, "Booking inserted");
        Ok(InsertOutcome::Created(created))
    }

    /// Applies a status change with compare-and-swap on the current status,
    /// writing the payment fields and the audit row atomically.
    pub async fn apply_transition(&self, change: &StatusChange) -> DbResult<TransitionOutcome> {
        let mut tx = self.pool.begin().await?;

        if change.check_availability {
            ListingRepository::bump_availability(&mut tx, &change.listing_id).await?;

            let current = Self::fetch(&mut *tx, &change.booking_id)
                .await?
                .ok_or_else(|| DbError::not_found("Booking", &change.booking_id))?;
            let range = DateRange::new(current.start_date, current.end_date)
                .map_err(|e| DbError::Internal(e.to_string()))?;

            if let Some(conflicting_booking_id) =
                Self::find_conflict(&mut tx, &change.listing_id, &range, Some(&change.booking_id)).await?
            {
                tx.rollback().await?;
                return Ok(TransitionOutcome::Conflict { conflicting_booking_id });
            }
        }

        let now = Utc::now();
        let (stage, status, rental_payment_id) = match &change.payment {
            Some(p) => (Some(p.stage), Some(p.status), p.rental_payment_id.clone()),
            None => (None, None, None),
        };

        let result = sqlx::query(
            r#"
            UPDATE bookings SET
                status = ?3,
                payment_stage = COALESCE(?4, payment_stage),
                payment_status = COALESCE(?5, payment_status),
                rental_payment_id = COALESCE(rental_payment_id, ?6),
                version = version + 1,
                updated_at = ?7
            WHERE id = ?1 AND status = ?2
            "#,
        )
        .bind(&change.booking_id)
        .bind(change.from)
        .bind(change.to)
        .bind(stage)
        .bind(status)
        .bind(rental_payment_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            debug!(id = %change.booking_id, from = %change.from, "Status CAS missed");
            return Ok(TransitionOutcome::StatusChanged);
        }

        sqlx::query(
            r#"
            INSERT INTO booking_transitions (
                id, booking_id, from_status, to_status, actor_uid, idempotency_key, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&change.booking_id)
        .bind(change.from)
        .bind(change.to)
        .bind(&change.actor_uid)
        .bind(&change.idempotency_key)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let updated = Self::fetch(&mut *tx, &change.booking_id)
            .await?
            .ok_or_else(|| DbError::not_found("Booking", &change.booking_id))?;
        tx.commit().await?;

        info!(
            id = %change.booking_id,
            from = %change.from,
            to = %change.to,
            actor = %change.actor_uid,
            "Booking status changed"
        );
        Ok(TransitionOutcome::Applied(updated))
    }

    /// Records a payment outcome that happened outside a status change
    /// (failed capture, completed refund).
    ///
    /// Only applies while the booking is still in `expected_status`; returns
    /// `None` when a concurrent transition moved it first.
    pub async fn update_payment(
        &self,
        id: &str,
        expected_status: BookingStatus,
        stage: PaymentStage,
        status: PaymentStatus,
        refund_id: Option<&str>,
    ) -> DbResult<Option<Booking>> {
        debug!(id = %id, stage = stage.as_str(), ?status, "Updating payment state");

        let result = sqlx::query(
            r#"
            UPDATE bookings SET
                payment_stage = ?3,
                payment_status = ?4,
                refund_id = COALESCE(refund_id, ?5),
                version = version + 1,
                updated_at = ?6
            WHERE id = ?1 AND status = ?2
            "#,
        )
        .bind(id)
        .bind(expected_status)
        .bind(stage)
        .bind(status)
        .bind(refund_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            debug!(id = %id, expected = %expected_status, "Payment update CAS missed");
            return Ok(None);
        }

        self.get_by_id(id).await
    }

    /// Overwrites descriptive fields, provided the booking is still in
    /// `expected_status`.
    ///
    /// ## Returns
    /// `None` if the status moved underneath the caller.
    pub async fn update_details(
        &self,
        id: &str,
        expected_status: BookingStatus,
        patch: &DetailsPatch,
    ) -> DbResult<Option<Booking>> {
        debug!(id = %id, "Updating booking details");

        let result = sqlx::query(
            r#"
            UPDATE bookings SET
                owner_notes = COALESCE(?3, owner_notes),
                renter_notes = COALESCE(?4, renter_notes),
                checkout_condition = COALESCE(?5, checkout_condition),
                return_condition = COALESCE(?6, return_condition),
                version = version + 1,
                updated_at = ?7
            WHERE id = ?1 AND status = ?2
            "#,
        )
        .bind(id)
        .bind(expected_status)
        .bind(&patch.owner_notes)
        .bind(&patch.renter_notes)
        .bind(&patch.checkout_condition)
        .bind(&patch.return_condition)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        self.get_by_id(id).await
    }

    // -------------------------------------------------------------------------
    // Helpers
    // -------------------------------------------------------------------------

    async fn fetch<'e, E>(executor: E, id: &str) -> DbResult<Option<Booking>>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        let booking = sqlx::query_as::<_, Booking>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(executor)
        .await?;

        Ok(booking)
    }

    async fn insert(conn: &mut SqliteConnection, b: &Booking) -> DbResult<()> {
        debug!(id = %b.id, listing_id = %b.listing_id, "Inserting booking");

        sqlx::query(&format!(
            r#"
            INSERT INTO bookings ({BOOKING_COLUMNS}) VALUES (
                ?1, ?2, ?3, ?4,
                ?5, ?6, ?7,
                ?8, ?9, ?10, ?11,
                ?12, ?13, ?14,
                ?15, ?16, ?17,
                ?18, ?19, ?20,
                ?21, ?22, ?23, ?24, ?25,
                ?26, ?27,
                ?28, ?29, ?30, ?31, ?32
            )
            "#
        ))
        .bind(&b.id)
        .bind(&b.listing_id)
        .bind(&b.owner_uid)
        .bind(&b.renter_uid)
        .bind(b.start_date)
        .bind(b.end_date)
        .bind(b.days)
        .bind(b.daily_price_cents)
        .bind(b.subtotal_cents)
        .bind(b.service_fee_cents)
        .bind(b.delivery_fee_cents)
        .bind(b.guarantee_tier)
        .bind(b.guarantee_cost_cents)
        .bind(b.total_price_cents)
        .bind(b.status)
        .bind(b.payment_stage)
        .bind(b.payment_status)
        .bind(&b.upfront_payment_id)
        .bind(&b.rental_payment_id)
        .bind(&b.refund_id)
        .bind(b.delivery_method)
        .bind(&b.pickup_location)
        .bind(&b.notes)
        .bind(&b.owner_notes)
        .bind(&b.renter_notes)
        .bind(&b.checkout_condition)
        .bind(&b.return_condition)
        .bind(b.cancellation_policy)
        .bind(&b.idempotency_key)
        .bind(b.version)
        .bind(b.created_at)
        .bind(b.updated_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::listing::tests::sample_listing;
    use crate::{Database, DbConfig};
    use rental_core::{CancellationPolicy, DeliveryMethod, GuaranteeTier};

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2030, m, d).unwrap()
    }

    fn booking(id: &str, status: BookingStatus, start: NaiveDate, end: NaiveDate) -> Booking {
        let now = Utc::now();
        Booking {
            id: id.to_string(),
            listing_id: "l-1".into(),
            owner_uid: "owner".into(),
            renter_uid: format!("renter-{id}"),
            start_date: start,
            end_date: end,
            days: (end - start).num_days().max(1),
            daily_price_cents: 4500,
            subtotal_cents: 13_500,
            service_fee_cents: 1400,
            delivery_fee_cents: 0,
            guarantee_tier: GuaranteeTier::None,
            guarantee_cost_cents: 0,
            total_price_cents: 14_900,
            status,
            payment_stage: PaymentStage::Upfront,
            payment_status: PaymentStatus::Paid,
            upfront_payment_id: Some(format!("pay-{id}")),
            rental_payment_id: None,
            refund_id: None,
            delivery_method: DeliveryMethod::Pickup,
            pickup_location: None,
            notes: None,
            owner_notes: None,
            renter_notes: None,
            checkout_condition: None,
            return_condition: None,
            cancellation_policy: CancellationPolicy::Flexible,
            idempotency_key: format!("key-{id}"),
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    async fn setup() -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.listings().insert(&sample_listing("l-1", "owner")).await.unwrap();
        db
    }

    fn confirm(id: &str) -> StatusChange {
        StatusChange {
            booking_id: id.to_string(),
            listing_id: "l-1".into(),
            from: BookingStatus::PendingOwnerApproval,
            to: BookingStatus::Confirmed,
            actor_uid: "owner".into(),
            idempotency_key: format!("transition:{id}:CONFIRMED"),
            payment: Some(PaymentUpdate {
                stage: PaymentStage::Rental,
                status: PaymentStatus::Paid,
                rental_payment_id: Some(format!("rent-{id}")),
            }),
            check_availability: true,
        }
    }

    #[tokio::test]
    async fn test_insert_and_get_round_trip() {
        let db = setup().await;
        let b = booking("b1", BookingStatus::PendingOwnerApproval, date(4, 1), date(4, 5));

        let outcome = db.bookings().insert_checked(&b).await.unwrap();
        let created = match outcome {
            InsertOutcome::Created(b) => b,
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(created.start_date, date(4, 1));
        assert_eq!(created.status, BookingStatus::PendingOwnerApproval);
        assert_eq!(created.guarantee_tier, GuaranteeTier::None);

        let listing = db.listings().get_by_id("l-1").await.unwrap().unwrap();
        assert_eq!(listing.availability_version, 1);
    }

    #[tokio::test]
    async fn test_duplicate_key_returns_existing() {
        let db = setup().await;
        let b = booking("b1", BookingStatus::PendingOwnerApproval, date(4, 1), date(4, 5));
        db.bookings().insert_checked(&b).await.unwrap();

        let outcome = db.bookings().insert_checked(&b).await.unwrap();
        assert!(matches!(outcome, InsertOutcome::Duplicate(existing) if existing.id == "b1"));
    }

    #[tokio::test]
    async fn test_pending_bookings_do_not_block() {
        let db = setup().await;
        let repo = db.bookings();
        repo.insert_checked(&booking("b1", BookingStatus::PendingOwnerApproval, date(4, 1), date(4, 5)))
            .await
            .unwrap();

        let range = DateRange::new(date(4, 3), date(4, 7)).unwrap();
        assert!(!repo.has_conflict("l-1", &range, None).await.unwrap());
    }

    #[tokio::test]
    async fn test_confirm_conflicts_with_confirmed_overlap() {
        let db = setup().await;
        let repo = db.bookings();
        for (id, s, e) in [("b1", 1, 5), ("b2", 3, 7)] {
            repo.insert_checked(&booking(id, BookingStatus::PendingOwnerApproval, date(4, s), date(4, e)))
                .await
                .unwrap();
        }

        let first = repo.apply_transition(&confirm("b1")).await.unwrap();
        assert!(matches!(first, TransitionOutcome::Applied(ref b) if b.status == BookingStatus::Confirmed));

        let second = repo.apply_transition(&confirm("b2")).await.unwrap();
        assert!(matches!(
            second,
            TransitionOutcome::Conflict { ref conflicting_booking_id } if conflicting_booking_id == "b1"
        ));

        let b2 = repo.get_by_id("b2").await.unwrap().unwrap();
        assert_eq!(b2.status, BookingStatus::PendingOwnerApproval);
        assert!(b2.rental_payment_id.is_none());

        let range = DateRange::new(date(4, 3), date(4, 7)).unwrap();
        assert!(repo.has_conflict("l-1", &range, None).await.unwrap());
        assert!(!repo.has_conflict("l-1", &range, Some("b1")).await.unwrap());
    }

    #[tokio::test]
    async fn test_cas_miss_and_audit_trail() {
        let db = setup().await;
        let repo = db.bookings();
        repo.insert_checked(&booking("b1", BookingStatus::PendingOwnerApproval, date(4, 1), date(4, 5)))
            .await
            .unwrap();

        let applied = repo.apply_transition(&confirm("b1")).await.unwrap();
        let confirmed = match applied {
            TransitionOutcome::Applied(b) => b,
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(confirmed.rental_payment_id.as_deref(), Some("rent-b1"));
        assert_eq!(confirmed.payment_stage, PaymentStage::Rental);
        assert_eq!(confirmed.version, 2);

        // Second confirm: status is no longer pending.
        let again = repo.apply_transition(&confirm("b1")).await.unwrap();
        assert!(matches!(again, TransitionOutcome::StatusChanged));

        let history = repo.transitions("b1").await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].to_status, BookingStatus::Confirmed);
        assert!(repo
            .transition_by_key("transition:b1:CONFIRMED")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_update_payment_sets_refund_once() {
        let db = setup().await;
        let repo = db.bookings();
        repo.insert_checked(&booking("b1", BookingStatus::Cancelled, date(4, 1), date(4, 5)))
            .await
            .unwrap();

        let b = repo
            .update_payment("b1", BookingStatus::Cancelled, PaymentStage::Settled, PaymentStatus::Refunded, Some("re-1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(b.refund_id.as_deref(), Some("re-1"));

        let b = repo
            .update_payment("b1", BookingStatus::Cancelled, PaymentStage::Settled, PaymentStatus::Refunded, Some("re-2"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(b.refund_id.as_deref(), Some("re-1"));

        let missing = repo
            .update_payment("nope", BookingStatus::Cancelled, PaymentStage::Settled, PaymentStatus::Refunded, None)
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_update_payment_skips_moved_booking() {
        let db = setup().await;
        let repo = db.bookings();
        repo.insert_checked(&booking("b1", BookingStatus::PendingOwnerApproval, date(4, 1), date(4, 5)))
            .await
            .unwrap();
        let cancel = StatusChange {
            to: BookingStatus::Cancelled,
            actor_uid: "renter".into(),
            idempotency_key: "transition:b1:CANCELLED".into(),
            payment: None,
            check_availability: false,
            ..confirm("b1")
        };
        repo.apply_transition(&cancel).await.unwrap();
        repo.update_payment("b1", BookingStatus::Cancelled, PaymentStage::Settled, PaymentStatus::Refunded, Some("re-1"))
            .await
            .unwrap()
            .unwrap();

        // A capture failure recorded against the old status must not land.
        let stale = repo
            .update_payment("b1", BookingStatus::PendingOwnerApproval, PaymentStage::Rental, PaymentStatus::Failed, None)
            .await
            .unwrap();
        assert!(stale.is_none());

        let b = repo.get_by_id("b1").await.unwrap().unwrap();
        assert_eq!(b.status, BookingStatus::Cancelled);
        assert_eq!(b.payment_stage, PaymentStage::Settled);
        assert_eq!(b.payment_status, PaymentStatus::Refunded);
        assert_eq!(b.refund_id.as_deref(), Some("re-1"));
    }

    #[tokio::test]
    async fn test_update_details_respects_status() {
        let db = setup().await;
        let repo = db.bookings();
        repo.insert_checked(&booking("b1", BookingStatus::PendingOwnerApproval, date(4, 1), date(4, 5)))
            .await
            .unwrap();

        let patch = DetailsPatch {
            owner_notes: Some("Bring ID".into()),
            ..DetailsPatch::default()
        };
        let updated = repo
            .update_details("b1", BookingStatus::PendingOwnerApproval, &patch)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.owner_notes.as_deref(), Some("Bring ID"));
        assert!(updated.renter_notes.is_none());

        let stale = repo
            .update_details("b1", BookingStatus::Confirmed, &patch)
            .await
            .unwrap();
        assert!(stale.is_none());
    }

    #[tokio::test]
    async fn test_list_for_user() {
        let db = setup().await;
        let repo = db.bookings();
        for (id, s, e) in [("b1", 1, 2), ("b2", 10, 12)] {
            repo.insert_checked(&booking(id, BookingStatus::PendingOwnerApproval, date(5, s), date(5, e)))
                .await
                .unwrap();
        }
        repo.apply_transition(&confirm("b2")).await.unwrap();

        let all = repo.list_for_user("owner", ActorRole::Owner, None, 10).await.unwrap();
        assert_eq!(all.len(), 2);

        let confirmed = repo
            .list_for_user("owner", ActorRole::Owner, Some(BookingStatus::Confirmed), 10)
            .await
            .unwrap();
        assert_eq!(confirmed.len(), 1);
        assert_eq!(confirmed[0].id, "b2");

        let renter = repo
            .list_for_user("renter-b1", ActorRole::Renter, None, 10)
            .await
            .unwrap();
        assert_eq!(renter.len(), 1);

        let none = repo.list_for_user("owner", ActorRole::Renter, None, 10).await.unwrap();
        assert!(none.is_empty());
    }
}
