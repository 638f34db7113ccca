//! # Booking Lifecycle Orchestrator
//!
//! The booking use cases: create, transition, update details, and the read
//! side (get, list, quote).
//!
//! ## Create
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  createBooking                                                         │
//! │                                                                         │
//! │   key ──► existing booking with key? ──yes──► return it (no charge)    │
//! │    │                                                                    │
//! │    ▼                                                                    │
//! │   listing active? renter ≠ owner? dates valid? no conflict?            │
//! │    │                                                                    │
//! │    ▼                                                                    │
//! │   price ──► authorize upfront ({id}:upfront) ──fail──► PaymentFailed   │
//! │    │                                                                    │
//! │    ▼                                                                    │
//! │   TX: bump listing version, re-scan, INSERT  ──conflict──► refund,     │
//! │    │                                                        Conflict   │
//! │    ▼                                                                    │
//! │   notify owner (spawned)                                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Transition
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  transition(id, actor, target)                                         │
//! │                                                                         │
//! │   transition:{id}:{TARGET} already committed? ──► replay: finish       │
//! │    │                                               refund, return      │
//! │    ▼                                                                    │
//! │   state machine check (party → role → expected → source)               │
//! │    │                                                                    │
//! │    ├─ CONFIRMED  conflict pre-check, capture {id}:rental,              │
//! │    │             TX re-scan + CAS + audit row                          │
//! │    ├─ REJECTED   CAS + audit row, then refund per policy               │
//! │    ├─ CANCELLED                                                        │
//! │    └─ ACTIVE / COMPLETED   CAS + audit row                             │
//! │    │                                                                    │
//! │    ▼                                                                    │
//! │   notify counterparty (spawned)                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! No gateway call is made while a database transaction is open: charges
//! happen before the write transaction, refunds after it.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::gateway::{InMemoryGateway, PaymentGateway};
use crate::notify::{self, NotificationTemplate, Notifier, TracingNotifier};
use crate::payment::PaymentCoordinator;
use crate::rate_limit::{InMemoryRateLimiter, RateDecision, RateLimiter};
use rental_core::availability::DateRange;
use rental_core::cancellation::plan_refund;
use rental_core::state_machine::{
    authorize_field_write, authorize_transition, available_targets, BookingField,
};
use rental_core::validation::{
    validate_booking_dates, validate_id, validate_idempotency_key, validate_list_limit, validate_note,
};
use rental_core::{
    compute_price, ActorRole, Booking, BookingStatus, DeliveryMethod, FeeSchedule, GuaranteeTier,
    Listing, PaymentStage, PaymentStatus, PriceBreakdown, PriceRequest, TransitionError,
};
use rental_db::{
    Database, DetailsPatch, InsertOutcome, PaymentUpdate, StatusChange, TransitionOutcome,
};

/// Namespace for booking ids derived from creation keys.
const BOOKING_ID_NAMESPACE: Uuid = Uuid::from_u128(0x6b69_7473_6861_7265_626f_6f6b_696e_6731);

// =============================================================================
// Requests & Views
// =============================================================================

/// Input to [`BookingEngine::create_booking`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingRequest {
    pub listing_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub delivery_method: DeliveryMethod,
    #[serde(default)]
    pub guarantee_tier: GuaranteeTier,
    #[serde(default)]
    pub pickup_location: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    /// Client-chosen creation key; derived from renter, listing and dates
    /// when absent.
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

/// Input to [`BookingEngine::quote`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequest {
    pub listing_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub delivery_method: DeliveryMethod,
    #[serde(default)]
    pub guarantee_tier: GuaranteeTier,
}

/// Partial update of a booking. A `status` is applied as a transition
/// before any field is written.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BookingPatch {
    pub status: Option<BookingStatus>,
    pub expected_status: Option<BookingStatus>,
    pub owner_notes: Option<String>,
    pub renter_notes: Option<String>,
    pub checkout_condition: Option<String>,
    pub return_condition: Option<String>,
}

/// A booking as seen by one of its parties.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingView {
    pub booking: Booking,
    pub listing: Listing,
    pub role: ActorRole,
    /// Statuses the caller could move the booking to now.
    pub available_actions: Vec<BookingStatus>,
}

// =============================================================================
// Engine
// =============================================================================

/// External services the engine talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub gateway: Arc<dyn PaymentGateway>,
    pub notifier: Arc<dyn Notifier>,
    pub rate_limiter: Arc<dyn RateLimiter>,
    pub clock: Arc<dyn Clock>,
}

impl Collaborators {
    /// Single-process setup: in-memory gateway and limiter, log notifier,
    /// wall clock.
    pub fn in_memory(config: &EngineConfig) -> Self {
        Collaborators {
            gateway: Arc::new(InMemoryGateway::new()),
            notifier: Arc::new(TracingNotifier),
            rate_limiter: Arc::new(InMemoryRateLimiter::new(&config.rate_limit)),
            clock: Arc::new(SystemClock),
        }
    }
}

/// Runs the booking lifecycle.
///
/// Cheap to clone; clones share the database pool and collaborators.
#[derive(Clone)]
pub struct BookingEngine {
    db: Database,
    fees: FeeSchedule,
    payments: PaymentCoordinator,
    notifier: Arc<dyn Notifier>,
    rate_limiter: Arc<dyn RateLimiter>,
    clock: Arc<dyn Clock>,
}

impl BookingEngine {
    pub fn new(db: Database, config: &EngineConfig, collaborators: Collaborators) -> Self {
        BookingEngine {
            db,
            fees: config.pricing.clone(),
            payments: PaymentCoordinator::new(collaborators.gateway, &config.payments),
            notifier: collaborators.notifier,
            rate_limiter: collaborators.rate_limiter,
            clock: collaborators.clock,
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    // =========================================================================
    // Create
    // =========================================================================

    /// Requests a booking on behalf of `renter_uid`.
    ///
    /// ## Errors
    /// - `NotFound` if the listing does not exist
    /// - `InvalidState` if the listing is not active
    /// - `Forbidden` if the renter owns the listing
    /// - `InvalidDateRange` for past, reversed or overlong ranges
    /// - `Conflict` if a confirmed or active booking overlaps
    /// - `PaymentFailed` if the upfront charge fails (nothing is stored)
    pub async fn create_booking(
        &self,
        renter_uid: &str,
        request: CreateBookingRequest,
    ) -> EngineResult<Booking> {
        validate_id("listingId", &request.listing_id)?;
        let pickup_location = validate_note("pickupLocation", request.pickup_location.as_deref())?;
        let notes = validate_note("notes", request.notes.as_deref())?;

        let idempotency_key = match &request.idempotency_key {
            Some(key) => {
                validate_idempotency_key(key)?;
                format!("{}:{}", renter_uid, key)
            }
            None => format!(
                "{}|{}|{}|{}",
                renter_uid, request.listing_id, request.start_date, request.end_date
            ),
        };
        let booking_id = booking_id_for(&idempotency_key);

        let bookings = self.db.bookings();
        if let Some(existing) = bookings.get_by_idempotency_key(&idempotency_key).await? {
            debug!(id = %existing.id, "Replayed booking creation");
            return Ok(existing);
        }

        let listing = self.bookable_listing(&request.listing_id).await?;
        if listing.owner_uid == renter_uid {
            return Err(EngineError::Forbidden(
                "owners cannot book their own listing".into(),
            ));
        }

        validate_booking_dates(request.start_date, request.end_date, self.clock.today())?;
        let range = DateRange::new(request.start_date, request.end_date)?;

        if let Some(conflicting_booking_id) =
            bookings.conflicting_booking(&listing.id, &range, None).await?
        {
            return Err(EngineError::Conflict { conflicting_booking_id });
        }

        let price = self.price(
            &listing,
            request.start_date,
            request.end_date,
            request.delivery_method,
            request.guarantee_tier,
        )?;

        // A reversed upfront charge stays attached to its key at the gateway.
        if self.payments.refund_recorded(&booking_id).await? {
            return Err(EngineError::InvalidState(
                "this request was already declined; retry with a new idempotency key".into(),
            ));
        }

        let upfront = price.upfront_amount();
        let upfront_payment_id = if upfront.is_positive() {
            Some(self.payments.authorize_upfront(&booking_id, upfront).await?)
        } else {
            None
        };

        let now = Utc::now();
        let booking = Booking {
            id: booking_id,
            listing_id: listing.id.clone(),
            owner_uid: listing.owner_uid.clone(),
            renter_uid: renter_uid.to_string(),
            start_date: request.start_date,
            end_date: request.end_date,
            days: price.days,
            daily_price_cents: price.daily_rate.cents(),
            subtotal_cents: price.subtotal.cents(),
            service_fee_cents: price.service_fee.cents(),
            delivery_fee_cents: price.delivery_fee.cents(),
            guarantee_tier: price.guarantee_tier,
            guarantee_cost_cents: price.guarantee_cost.cents(),
            total_price_cents: price.total.cents(),
            status: BookingStatus::PendingOwnerApproval,
            payment_stage: PaymentStage::Upfront,
            payment_status: PaymentStatus::Paid,
            upfront_payment_id,
            rental_payment_id: None,
            refund_id: None,
            delivery_method: request.delivery_method,
            pickup_location,
            notes,
            owner_notes: None,
            renter_notes: None,
            checkout_condition: None,
            return_condition: None,
            cancellation_policy: listing.cancellation_policy,
            idempotency_key,
            version: 1,
            created_at: now,
            updated_at: now,
        };

        match bookings.insert_checked(&booking).await {
            Ok(InsertOutcome::Created(created)) => {
                info!(
                    id = %created.id,
                    listing_id = %created.listing_id,
                    renter = %created.renter_uid,
                    total = created.total_price_cents,
                    "Booking requested"
                );
                self.notify(&created.owner_uid, NotificationTemplate::BookingRequested, &created);
                Ok(created)
            }
            Ok(InsertOutcome::Duplicate(existing)) => {
                debug!(id = %existing.id, "Concurrent creation with the same key");
                Ok(existing)
            }
            Ok(InsertOutcome::Conflict { conflicting_booking_id }) => {
                warn!(
                    id = %booking.id,
                    conflicting = %conflicting_booking_id,
                    "Dates taken while charging, reversing upfront payment"
                );
                if let Some(payment_id) = &booking.upfront_payment_id {
                    if let Err(e) = self.payments.refund(&booking.id, payment_id, upfront).await {
                        error!(id = %booking.id, payment_id = %payment_id, error = %e, "Upfront payment left unreversed");
                    }
                }
                Err(EngineError::Conflict { conflicting_booking_id })
            }
            Err(e) => {
                // Retrying with the same key reuses the same authorization.
                error!(id = %booking.id, error = %e, "Booking insert failed after authorization");
                Err(e.into())
            }
        }
    }

    // =========================================================================
    // Transition
    // =========================================================================

    /// Moves a booking to `target` on behalf of `actor_uid`.
    ///
    /// `expected` is the status the caller believes the booking is in; a
    /// mismatch is rejected instead of applied.
    pub async fn transition(
        &self,
        booking_id: &str,
        actor_uid: &str,
        target: BookingStatus,
        expected: Option<BookingStatus>,
    ) -> EngineResult<Booking> {
        let booking = self.load_booking(booking_id).await?;
        let role = booking.role_of(actor_uid);
        let key = transition_key(&booking.id, target);

        if let Some(done) = self.db.bookings().transition_by_key(&key).await? {
            // The caller must be allowed to make the recorded move themselves.
            authorize_transition(done.from_status, target, role, None)?;
            debug!(id = %booking.id, to = %target, "Replayed transition");
            if booking.status != done.to_status {
                return Ok(booking);
            }
            let mut before = booking.clone();
            before.status = done.from_status;
            return self
                .settle_refund(&before, booking, done.created_at.date_naive())
                .await;
        }

        authorize_transition(booking.status, target, role, expected)?;
        let role = role.ok_or(TransitionError::NotAParty)?;

        let change = StatusChange {
            booking_id: booking.id.clone(),
            listing_id: booking.listing_id.clone(),
            from: booking.status,
            to: target,
            actor_uid: actor_uid.to_string(),
            idempotency_key: key,
            payment: None,
            check_availability: false,
        };

        let updated = match target {
            BookingStatus::Confirmed => self.confirm(&booking, change).await?,
            BookingStatus::Rejected | BookingStatus::Cancelled | BookingStatus::Completed => {
                let settle = PaymentUpdate {
                    stage: PaymentStage::Settled,
                    status: booking.payment_status,
                    rental_payment_id: None,
                };
                self.apply(StatusChange {
                    payment: Some(settle),
                    ..change
                })
                .await?
            }
            _ => self.apply(change).await?,
        };

        self.notify(
            booking.counterparty(role),
            NotificationTemplate::for_status(target),
            &updated,
        );

        self.settle_refund(&booking, updated, self.clock.today()).await
    }

    /// Confirms a pending booking: conflict pre-check, rental capture, then
    /// the re-checked status change.
    async fn confirm(&self, booking: &Booking, change: StatusChange) -> EngineResult<Booking> {
        if booking.payment_stage == PaymentStage::Rental
            && booking.payment_status == PaymentStatus::Refunded
        {
            return Err(EngineError::InvalidState(
                "rental payment was reversed after a conflict; booking cannot be confirmed".into(),
            ));
        }

        let range = DateRange::new(booking.start_date, booking.end_date)?;
        if let Some(conflicting_booking_id) = self
            .db
            .bookings()
            .conflicting_booking(&booking.listing_id, &range, Some(&booking.id))
            .await?
        {
            return Err(EngineError::Conflict { conflicting_booking_id });
        }

        let rental = booking.rental_amount();
        let rental_payment_id = if rental.is_positive() {
            match self.payments.capture_rental(&booking.id, rental).await {
                Ok(id) => Some(id),
                Err(e) => {
                    warn!(id = %booking.id, error = %e, "Rental capture failed, booking stays pending");
                    let recorded = self
                        .db
                        .bookings()
                        .update_payment(
                            &booking.id,
                            BookingStatus::PendingOwnerApproval,
                            PaymentStage::Rental,
                            PaymentStatus::Failed,
                            None,
                        )
                        .await?;
                    if recorded.is_none() {
                        debug!(id = %booking.id, "Booking moved during capture, failure not recorded");
                    }
                    return Err(e);
                }
            }
        } else {
            None
        };

        let change = StatusChange {
            payment: Some(PaymentUpdate {
                stage: PaymentStage::Rental,
                status: PaymentStatus::Paid,
                rental_payment_id: rental_payment_id.clone(),
            }),
            check_availability: true,
            ..change
        };

        match self.apply(change).await {
            Err(e @ (EngineError::Conflict { .. } | EngineError::InvalidStateTransition(_))) => {
                if let Some(payment_id) = &rental_payment_id {
                    self.reverse_capture(booking, payment_id).await;
                }
                Err(e)
            }
            other => other,
        }
    }

    /// Runs a status change. A lost compare-and-swap is fine when the
    /// winner made this very transition.
    async fn apply(&self, change: StatusChange) -> EngineResult<Booking> {
        let bookings = self.db.bookings();

        match bookings.apply_transition(&change).await? {
            TransitionOutcome::Applied(booking) => Ok(booking),
            TransitionOutcome::Conflict { conflicting_booking_id } => {
                Err(EngineError::Conflict { conflicting_booking_id })
            }
            TransitionOutcome::StatusChanged => {
                if bookings.transition_by_key(&change.idempotency_key).await?.is_some() {
                    return self.load_booking(&change.booking_id).await;
                }
                Err(EngineError::InvalidStateTransition(format!(
                    "booking {} is no longer {}",
                    change.booking_id, change.from
                )))
            }
        }
    }

    /// Issues the refund owed for `before` moving to `after.status`, if it
    /// has not been issued yet.
    async fn settle_refund(
        &self,
        before: &Booking,
        after: Booking,
        as_of: NaiveDate,
    ) -> EngineResult<Booking> {
        if after.refund_id.is_some() {
            return Ok(after);
        }
        let Some(plan) = plan_refund(before, after.status, as_of) else {
            return Ok(after);
        };

        let refund_id = self
            .payments
            .refund(&after.id, &plan.payment_id, plan.amount)
            .await
            .map_err(|e| {
                warn!(id = %after.id, error = %e, "Refund failed; retrying the transition completes it");
                e
            })?;

        let booking = match self
            .db
            .bookings()
            .update_payment(
                &after.id,
                after.status,
                PaymentStage::Settled,
                PaymentStatus::Refunded,
                Some(&refund_id),
            )
            .await?
        {
            Some(booking) => booking,
            None => self.load_booking(&after.id).await?,
        };

        info!(id = %booking.id, refund_id = %refund_id, amount = %plan.amount, "Booking refunded");
        Ok(booking)
    }

    async fn reverse_capture(&self, booking: &Booking, payment_id: &str) {
        let key = format!("{}:rental:reversal", booking.id);
        let amount = booking.rental_amount();

        match self
            .payments
            .refund_with_key(&key, &booking.id, payment_id, amount)
            .await
        {
            Ok(_) => {
                match self
                    .db
                    .bookings()
                    .update_payment(
                        &booking.id,
                        BookingStatus::PendingOwnerApproval,
                        PaymentStage::Rental,
                        PaymentStatus::Refunded,
                        None,
                    )
                    .await
                {
                    Ok(Some(_)) => {}
                    Ok(None) => debug!(id = %booking.id, "Booking moved before reversal was recorded"),
                    Err(e) => error!(id = %booking.id, error = %e, "Failed to record rental reversal"),
                }
            }
            Err(e) => {
                error!(id = %booking.id, payment_id = %payment_id, error = %e, "Rental capture left unreversed");
            }
        }
    }

    // =========================================================================
    // Update Details
    // =========================================================================

    /// Applies a partial update: optional status change, then role-gated
    /// field writes.
    pub async fn update_details(
        &self,
        booking_id: &str,
        actor_uid: &str,
        patch: BookingPatch,
    ) -> EngineResult<Booking> {
        match self.rate_limiter.check(actor_uid).await {
            Ok(RateDecision::Allowed { .. }) => {}
            Ok(RateDecision::Limited { retry_after }) => {
                return Err(EngineError::RateLimited {
                    retry_after_secs: retry_after.as_secs().max(1),
                });
            }
            Err(e) => warn!(actor = %actor_uid, error = %e, "Rate limiter unavailable, allowing update"),
        }

        let details = DetailsPatch {
            owner_notes: validate_note("ownerNotes", patch.owner_notes.as_deref())?,
            renter_notes: validate_note("renterNotes", patch.renter_notes.as_deref())?,
            checkout_condition: validate_note("checkoutCondition", patch.checkout_condition.as_deref())?,
            return_condition: validate_note("returnCondition", patch.return_condition.as_deref())?,
        };

        let booking = self.load_booking(booking_id).await?;
        let role = booking.role_of(actor_uid);

        // Fields are checked against the status they will be written in.
        let write_status = patch.status.unwrap_or(booking.status);
        for field in touched_fields(&details) {
            authorize_field_write(write_status, role, field)?;
        }

        let booking = match patch.status {
            Some(target) => {
                self.transition(booking_id, actor_uid, target, patch.expected_status)
                    .await?
            }
            None => {
                if role.is_none() {
                    return Err(TransitionError::NotAParty.into());
                }
                if let Some(expected) = patch.expected_status.filter(|e| *e != booking.status) {
                    return Err(EngineError::InvalidStateTransition(format!(
                        "booking is {}, not {}",
                        booking.status, expected
                    )));
                }
                booking
            }
        };

        if details.is_empty() {
            return Ok(booking);
        }

        match self
            .db
            .bookings()
            .update_details(&booking.id, booking.status, &details)
            .await?
        {
            Some(updated) => {
                debug!(id = %updated.id, actor = %actor_uid, "Booking details updated");
                Ok(updated)
            }
            None => Err(EngineError::InvalidStateTransition(format!(
                "booking {} changed while updating",
                booking.id
            ))),
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Loads a booking with its listing. Only the two parties may read it.
    pub async fn get_booking(&self, booking_id: &str, actor_uid: &str) -> EngineResult<BookingView> {
        let booking = self.load_booking(booking_id).await?;
        let role = booking
            .role_of(actor_uid)
            .ok_or(TransitionError::NotAParty)?;

        let listing = self
            .db
            .listings()
            .get_by_id(&booking.listing_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Listing", &booking.listing_id))?;

        Ok(BookingView {
            available_actions: available_targets(booking.status, role),
            booking,
            listing,
            role,
        })
    }

    /// The caller's bookings on one side, newest first.
    pub async fn list_bookings(
        &self,
        actor_uid: &str,
        role: ActorRole,
        status: Option<BookingStatus>,
        limit: Option<i64>,
    ) -> EngineResult<Vec<Booking>> {
        let limit = validate_list_limit(limit)?;
        Ok(self
            .db
            .bookings()
            .list_for_user(actor_uid, role, status, limit)
            .await?)
    }

    /// Prices a prospective booking without storing or charging anything.
    pub async fn quote(&self, request: &QuoteRequest) -> EngineResult<PriceBreakdown> {
        validate_id("listingId", &request.listing_id)?;
        let listing = self.bookable_listing(&request.listing_id).await?;
        validate_booking_dates(request.start_date, request.end_date, self.clock.today())?;

        self.price(
            &listing,
            request.start_date,
            request.end_date,
            request.delivery_method,
            request.guarantee_tier,
        )
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn load_booking(&self, booking_id: &str) -> EngineResult<Booking> {
        self.db
            .bookings()
            .get_by_id(booking_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Booking", booking_id))
    }

    async fn bookable_listing(&self, listing_id: &str) -> EngineResult<Listing> {
        let listing = self
            .db
            .listings()
            .get_by_id(listing_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Listing", listing_id))?;

        if !listing.is_bookable() {
            return Err(EngineError::InvalidState(format!(
                "listing {} is not accepting bookings",
                listing.id
            )));
        }
        Ok(listing)
    }

    fn price(
        &self,
        listing: &Listing,
        start_date: NaiveDate,
        end_date: NaiveDate,
        delivery_method: DeliveryMethod,
        guarantee_tier: GuaranteeTier,
    ) -> EngineResult<PriceBreakdown> {
        let request = PriceRequest {
            daily_rate: listing.daily_price(),
            start_date,
            end_date,
            delivery_method,
            delivery_fee: listing.delivery_fee(),
            guarantee_tier,
            gear_value: listing.gear_value(),
            fee_reduction_bps: self.fees.loyalty_reduction(listing.owner_loyalty_tier).bps(),
        };
        Ok(compute_price(&request, &self.fees)?)
    }

    fn notify(&self, user_id: &str, template: NotificationTemplate, booking: &Booking) {
        let data = json!({
            "bookingId": booking.id,
            "listingId": booking.listing_id,
            "status": booking.status,
            "startDate": booking.start_date,
            "endDate": booking.end_date,
        });
        notify::dispatch(self.notifier.clone(), user_id.to_string(), template, data);
    }
}

/// Booking id for a creation key. The same key always yields the same id.
pub fn booking_id_for(idempotency_key: &str) -> String {
    Uuid::new_v5(&BOOKING_ID_NAMESPACE, idempotency_key.as_bytes()).to_string()
}

/// Idempotency key of the transition of `booking_id` to `target`.
pub fn transition_key(booking_id: &str, target: BookingStatus) -> String {
    format!("transition:{}:{}", booking_id, target.as_str())
}

fn touched_fields(patch: &DetailsPatch) -> Vec<BookingField> {
    [
        (patch.owner_notes.is_some(), BookingField::OwnerNotes),
        (patch.renter_notes.is_some(), BookingField::RenterNotes),
        (patch.checkout_condition.is_some(), BookingField::CheckoutCondition),
        (patch.return_condition.is_some(), BookingField::ReturnCondition),
    ]
    .into_iter()
    .filter_map(|(touched, field)| touched.then_some(field))
    .collect()
}
