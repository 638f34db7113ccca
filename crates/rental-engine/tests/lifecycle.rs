//! End-to-end booking lifecycle against in-memory SQLite and in-memory
//! collaborators.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use tokio::task::JoinSet;

use rental_core::{
    ActorRole, Booking, BookingStatus, CancellationPolicy, DeliveryMethod, GuaranteeTier, Listing,
    ListingStatus, LoyaltyTier, PaymentStage, PaymentStatus,
};
use rental_db::{Database, DbConfig};
use rental_engine::config::RateLimitConfig;
use rental_engine::gateway::{Fault, GatewayOp};
use rental_engine::{
    BookingEngine, BookingPatch, Collaborators, CreateBookingRequest, EngineConfig, EngineError,
    ErrorKind, FixedClock, InMemoryGateway, InMemoryRateLimiter, NotificationTemplate,
    QuoteRequest, RecordingNotifier,
};

const OWNER: &str = "owner-1";
const RENTER: &str = "renter-1";

fn date(m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, m, d).unwrap()
}

fn listing(id: &str, policy: CancellationPolicy) -> Listing {
    let now = Utc::now();
    Listing {
        id: id.to_string(),
        owner_uid: OWNER.to_string(),
        title: "Canon EOS R6".to_string(),
        daily_price_cents: 4500,
        status: ListingStatus::Active,
        location: Some("Brooklyn, NY".to_string()),
        gear_value_cents: 100_000,
        delivery_fee_cents: 1500,
        owner_loyalty_tier: LoyaltyTier::None,
        cancellation_policy: policy,
        availability_version: 0,
        created_at: now,
        updated_at: now,
    }
}

fn request(listing_id: &str, start: NaiveDate, end: NaiveDate) -> CreateBookingRequest {
    CreateBookingRequest {
        listing_id: listing_id.to_string(),
        start_date: start,
        end_date: end,
        delivery_method: DeliveryMethod::Pickup,
        guarantee_tier: GuaranteeTier::None,
        pickup_location: None,
        notes: None,
        idempotency_key: None,
    }
}

fn engine_with(
    db: &Database,
    config: &EngineConfig,
    gateway: &Arc<InMemoryGateway>,
    notifier: &Arc<RecordingNotifier>,
    today: NaiveDate,
) -> BookingEngine {
    BookingEngine::new(
        db.clone(),
        config,
        Collaborators {
            gateway: gateway.clone(),
            notifier: notifier.clone(),
            rate_limiter: Arc::new(InMemoryRateLimiter::new(&config.rate_limit)),
            clock: Arc::new(FixedClock::on(today)),
        },
    )
}

struct Harness {
    db: Database,
    config: EngineConfig,
    gateway: Arc<InMemoryGateway>,
    notifier: Arc<RecordingNotifier>,
    engine: BookingEngine,
}

impl Harness {
    async fn new() -> Self {
        Self::with_config(EngineConfig::default()).await
    }

    async fn with_config(config: EngineConfig) -> Self {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        for (id, policy) in [
            ("l-flex", CancellationPolicy::Flexible),
            ("l-mod", CancellationPolicy::Moderate),
            ("l-strict", CancellationPolicy::Strict),
        ] {
            db.listings().insert(&listing(id, policy)).await.unwrap();
        }

        let gateway = Arc::new(InMemoryGateway::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let engine = engine_with(&db, &config, &gateway, &notifier, date(3, 1));
        Harness {
            db,
            config,
            gateway,
            notifier,
            engine,
        }
    }

    /// An engine sharing this harness's storage and collaborators whose
    /// clock reads `today`.
    fn engine_on(&self, today: NaiveDate) -> BookingEngine {
        engine_with(&self.db, &self.config, &self.gateway, &self.notifier, today)
    }

    async fn create(
        &self,
        renter: &str,
        listing_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Booking {
        self.engine
            .create_booking(renter, request(listing_id, start, end))
            .await
            .unwrap()
    }
}

// =============================================================================
// Creation
// =============================================================================

#[tokio::test]
async fn test_create_prices_and_charges_upfront() {
    let h = Harness::new().await;
    let booking = h.create(RENTER, "l-mod", date(3, 15), date(3, 18)).await;

    assert_eq!(booking.status, BookingStatus::PendingOwnerApproval);
    assert_eq!(booking.days, 3);
    assert_eq!(booking.subtotal_cents, 13_500);
    assert_eq!(booking.service_fee_cents, 1400);
    assert_eq!(booking.delivery_fee_cents, 0);
    assert_eq!(booking.total_price_cents, 14_900);
    assert_eq!(booking.owner_uid, OWNER);
    assert_eq!(booking.cancellation_policy, CancellationPolicy::Moderate);
    assert_eq!(booking.payment_stage, PaymentStage::Upfront);
    assert_eq!(booking.payment_status, PaymentStatus::Paid);

    let charge = h.gateway.charge(&format!("{}:upfront", booking.id)).await.unwrap();
    assert_eq!(charge.amount.cents(), 1400);
    assert_eq!(booking.upfront_payment_id.as_deref(), Some(charge.payment_id.as_str()));

    let sent = h.notifier.wait_for(1, Duration::from_secs(2)).await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].user_id, OWNER);
    assert_eq!(sent[0].template, NotificationTemplate::BookingRequested);
    assert_eq!(sent[0].data["bookingId"], booking.id.as_str());
}

#[tokio::test]
async fn test_same_day_rental_is_one_day() {
    let h = Harness::new().await;
    let booking = h.create(RENTER, "l-mod", date(3, 20), date(3, 20)).await;

    assert_eq!(booking.days, 1);
    assert_eq!(booking.subtotal_cents, 4500);
}

#[tokio::test]
async fn test_long_rental_is_accepted() {
    let h = Harness::new().await;
    let booking = h.create(RENTER, "l-mod", date(3, 10), date(7, 10)).await;

    assert_eq!(booking.days, 122);
    assert_eq!(booking.subtotal_cents, 4500 * 122);
    assert_eq!(booking.status, BookingStatus::PendingOwnerApproval);
}

#[tokio::test]
async fn test_guarantee_and_delivery_priced_in() {
    let h = Harness::new().await;
    let mut req = request("l-mod", date(3, 10), date(3, 24));
    req.guarantee_tier = GuaranteeTier::Standard;
    req.delivery_method = DeliveryMethod::Delivery;

    let booking = h.engine.create_booking(RENTER, req).await.unwrap();

    // 1000.00 gear × 12% × 14/7
    assert_eq!(booking.days, 14);
    assert_eq!(booking.guarantee_cost_cents, 24_000);
    assert_eq!(booking.delivery_fee_cents, 1500);
    assert_eq!(
        booking.total_price_cents,
        booking.subtotal_cents
            + booking.service_fee_cents
            + booking.delivery_fee_cents
            + booking.guarantee_cost_cents
    );

    let upfront = h.gateway.charge(&format!("{}:upfront", booking.id)).await.unwrap();
    assert_eq!(upfront.amount.cents(), booking.service_fee_cents + 24_000);
}

#[tokio::test]
async fn test_create_rejects_confirmed_overlap() {
    let h = Harness::new().await;
    let first = h.create(RENTER, "l-mod", date(4, 1), date(4, 5)).await;
    h.engine
        .transition(&first.id, OWNER, BookingStatus::Confirmed, None)
        .await
        .unwrap();

    let err = h
        .engine
        .create_booking("renter-2", request("l-mod", date(4, 3), date(4, 7)))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        EngineError::Conflict { ref conflicting_booking_id } if *conflicting_booking_id == first.id
    ));
    assert_eq!(h.gateway.charge_count(GatewayOp::Authorize).await, 1);
}

#[tokio::test]
async fn test_pending_bookings_do_not_block_each_other() {
    let h = Harness::new().await;
    h.create(RENTER, "l-mod", date(4, 1), date(4, 5)).await;
    let second = h.create("renter-2", "l-mod", date(4, 3), date(4, 7)).await;
    assert_eq!(second.status, BookingStatus::PendingOwnerApproval);
}

#[tokio::test]
async fn test_creation_is_idempotent() {
    let h = Harness::new().await;
    let mut req = request("l-mod", date(3, 15), date(3, 18));
    req.idempotency_key = Some("checkout-7f3a".into());

    let first = h.engine.create_booking(RENTER, req.clone()).await.unwrap();
    let second = h.engine.create_booking(RENTER, req).await.unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(h.gateway.calls(GatewayOp::Authorize).await, 1);

    // Without a key the key is derived from renter, listing and dates.
    let a = h.create(RENTER, "l-flex", date(5, 1), date(5, 2)).await;
    let b = h.create(RENTER, "l-flex", date(5, 1), date(5, 2)).await;
    assert_eq!(a.id, b.id);
    assert_eq!(h.gateway.charge_count(GatewayOp::Authorize).await, 2);
}

#[tokio::test]
async fn test_same_client_key_from_two_renters_creates_two_bookings() {
    let h = Harness::new().await;
    let mut req = request("l-mod", date(3, 15), date(3, 18));
    req.idempotency_key = Some("cart-1".into());

    let a = h.engine.create_booking(RENTER, req.clone()).await.unwrap();
    let b = h.engine.create_booking("renter-2", req).await.unwrap();
    assert_ne!(a.id, b.id);
}

#[tokio::test]
async fn test_create_validation_errors() {
    let h = Harness::new().await;

    let past = h
        .engine
        .create_booking(RENTER, request("l-mod", date(2, 20), date(2, 25)))
        .await
        .unwrap_err();
    assert_eq!(past.kind(), ErrorKind::InvalidDateRange);

    let reversed = h
        .engine
        .create_booking(RENTER, request("l-mod", date(3, 10), date(3, 5)))
        .await
        .unwrap_err();
    assert_eq!(reversed.kind(), ErrorKind::InvalidDateRange);

    let own = h
        .engine
        .create_booking(OWNER, request("l-mod", date(3, 10), date(3, 12)))
        .await
        .unwrap_err();
    assert_eq!(own.kind(), ErrorKind::Forbidden);

    let missing = h
        .engine
        .create_booking(RENTER, request("l-missing", date(3, 10), date(3, 12)))
        .await
        .unwrap_err();
    assert_eq!(missing.kind(), ErrorKind::NotFound);

    let mut paused = listing("l-paused", CancellationPolicy::Flexible);
    paused.status = ListingStatus::Paused;
    h.db.listings().insert(&paused).await.unwrap();
    let inactive = h
        .engine
        .create_booking(RENTER, request("l-paused", date(3, 10), date(3, 12)))
        .await
        .unwrap_err();
    assert_eq!(inactive.kind(), ErrorKind::InvalidState);

    assert_eq!(h.gateway.calls(GatewayOp::Authorize).await, 0);
}

#[tokio::test]
async fn test_declined_upfront_stores_nothing() {
    let h = Harness::new().await;
    h.gateway
        .fail_next(GatewayOp::Authorize, Fault::Decline("card_declined".into()))
        .await;

    let err = h
        .engine
        .create_booking(RENTER, request("l-mod", date(3, 15), date(3, 18)))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PaymentFailed);

    let mine = h
        .engine
        .list_bookings(RENTER, ActorRole::Renter, None, None)
        .await
        .unwrap();
    assert!(mine.is_empty());
}

#[tokio::test]
async fn test_notification_failure_does_not_fail_create() {
    let h = Harness::new().await;
    h.notifier.set_failing(true).await;

    let booking = h.create(RENTER, "l-mod", date(3, 15), date(3, 18)).await;
    assert_eq!(booking.status, BookingStatus::PendingOwnerApproval);
    assert_eq!(h.notifier.wait_for(1, Duration::from_secs(2)).await.len(), 1);
}

// =============================================================================
// Transitions
// =============================================================================

#[tokio::test]
async fn test_confirm_captures_rental_stage() {
    let h = Harness::new().await;
    let booking = h.create(RENTER, "l-mod", date(3, 15), date(3, 18)).await;

    let confirmed = h
        .engine
        .transition(&booking.id, OWNER, BookingStatus::Confirmed, Some(BookingStatus::PendingOwnerApproval))
        .await
        .unwrap();

    assert_eq!(confirmed.status, BookingStatus::Confirmed);
    assert_eq!(confirmed.payment_stage, PaymentStage::Rental);
    assert_eq!(confirmed.payment_status, PaymentStatus::Paid);

    let capture = h.gateway.charge(&format!("{}:rental", booking.id)).await.unwrap();
    assert_eq!(capture.amount.cents(), 13_500);
    assert_eq!(confirmed.rental_payment_id.as_deref(), Some(capture.payment_id.as_str()));

    let sent = h.notifier.wait_for(2, Duration::from_secs(2)).await;
    assert!(sent
        .iter()
        .any(|n| n.user_id == RENTER && n.template == NotificationTemplate::BookingConfirmed));
}

#[tokio::test]
async fn test_owner_cannot_cancel_confirmed_booking() {
    let h = Harness::new().await;
    let booking = h.create(RENTER, "l-mod", date(4, 1), date(4, 5)).await;
    h.engine
        .transition(&booking.id, OWNER, BookingStatus::Confirmed, None)
        .await
        .unwrap();

    let err = h
        .engine
        .transition(&booking.id, OWNER, BookingStatus::Cancelled, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let stranger = h
        .engine
        .transition(&booking.id, "someone-else", BookingStatus::Active, None)
        .await
        .unwrap_err();
    assert_eq!(stranger.kind(), ErrorKind::Forbidden);
}

#[tokio::test]
async fn test_owner_cannot_replay_renter_cancel() {
    let h = Harness::new().await;
    let booking = h.create(RENTER, "l-mod", date(4, 1), date(4, 5)).await;
    h.engine
        .transition(&booking.id, OWNER, BookingStatus::Confirmed, None)
        .await
        .unwrap();
    h.engine
        .transition(&booking.id, RENTER, BookingStatus::Cancelled, None)
        .await
        .unwrap();

    // The cancel key now exists, but the owner may not cancel a confirmed
    // booking, so they get the same answer as before it was recorded.
    let err = h
        .engine
        .transition(&booking.id, OWNER, BookingStatus::Cancelled, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let stranger = h
        .engine
        .transition(&booking.id, "someone-else", BookingStatus::Cancelled, None)
        .await
        .unwrap_err();
    assert_eq!(stranger.kind(), ErrorKind::Forbidden);

    let replay = h
        .engine
        .transition(&booking.id, RENTER, BookingStatus::Cancelled, None)
        .await
        .unwrap();
    assert_eq!(replay.status, BookingStatus::Cancelled);
}

#[tokio::test]
async fn test_invalid_source_and_stale_expected_status() {
    let h = Harness::new().await;
    let booking = h.create(RENTER, "l-mod", date(4, 1), date(4, 5)).await;

    let skip = h
        .engine
        .transition(&booking.id, OWNER, BookingStatus::Completed, None)
        .await
        .unwrap_err();
    assert_eq!(skip.kind(), ErrorKind::InvalidStateTransition);

    let stale = h
        .engine
        .transition(&booking.id, OWNER, BookingStatus::Confirmed, Some(BookingStatus::Confirmed))
        .await
        .unwrap_err();
    assert_eq!(stale.kind(), ErrorKind::InvalidStateTransition);
}

#[tokio::test]
async fn test_first_owner_to_confirm_wins() {
    let h = Harness::new().await;
    let a = h.create(RENTER, "l-mod", date(4, 1), date(4, 5)).await;
    let b = h.create("renter-2", "l-mod", date(4, 3), date(4, 7)).await;

    h.engine
        .transition(&a.id, OWNER, BookingStatus::Confirmed, None)
        .await
        .unwrap();

    let err = h
        .engine
        .transition(&b.id, OWNER, BookingStatus::Confirmed, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Conflict { ref conflicting_booking_id } if *conflicting_booking_id == a.id
    ));

    let b = h.engine.get_booking(&b.id, OWNER).await.unwrap().booking;
    assert_eq!(b.status, BookingStatus::PendingOwnerApproval);
    assert!(h.gateway.charge(&format!("{}:rental", b.id)).await.is_none());

    // The loser can still be rejected, refunding its upfront charge.
    let rejected = h
        .engine
        .transition(&b.id, OWNER, BookingStatus::Rejected, None)
        .await
        .unwrap();
    assert_eq!(rejected.payment_status, PaymentStatus::Refunded);
}

#[tokio::test]
async fn test_concurrent_confirms_admit_exactly_one() {
    let h = Harness::new().await;
    let mut ids = Vec::new();
    for (i, (s, e)) in [(1, 5), (3, 7), (4, 9), (2, 4)].into_iter().enumerate() {
        let b = h
            .create(&format!("renter-{i}"), "l-mod", date(4, s), date(4, e))
            .await;
        ids.push(b.id);
    }

    let mut tasks = JoinSet::new();
    for id in ids.clone() {
        let engine = h.engine.clone();
        tasks.spawn(async move {
            engine
                .transition(&id, OWNER, BookingStatus::Confirmed, None)
                .await
        });
    }

    let mut confirmed = 0;
    while let Some(result) = tasks.join_next().await {
        match result.unwrap() {
            Ok(b) => {
                assert_eq!(b.status, BookingStatus::Confirmed);
                confirmed += 1;
            }
            Err(e) => assert_eq!(e.kind(), ErrorKind::Conflict),
        }
    }
    assert_eq!(confirmed, 1);

    let blocking = h
        .engine
        .list_bookings(OWNER, ActorRole::Owner, Some(BookingStatus::Confirmed), None)
        .await
        .unwrap();
    assert_eq!(blocking.len(), 1);
}

#[tokio::test]
async fn test_failed_capture_keeps_booking_pending_and_can_be_retried() {
    let h = Harness::new().await;
    let booking = h.create(RENTER, "l-mod", date(3, 15), date(3, 18)).await;
    h.gateway
        .fail_next(GatewayOp::Capture, Fault::Decline("insufficient_funds".into()))
        .await;

    let err = h
        .engine
        .transition(&booking.id, OWNER, BookingStatus::Confirmed, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PaymentFailed);

    let failed = h.engine.get_booking(&booking.id, OWNER).await.unwrap().booking;
    assert_eq!(failed.status, BookingStatus::PendingOwnerApproval);
    assert_eq!(failed.payment_status, PaymentStatus::Failed);
    assert!(failed.rental_payment_id.is_none());

    let confirmed = h
        .engine
        .transition(&booking.id, OWNER, BookingStatus::Confirmed, None)
        .await
        .unwrap();
    assert_eq!(confirmed.payment_status, PaymentStatus::Paid);

    // The declined key keeps its decline; the retry charged under a new one.
    let retry = h.gateway.charge(&format!("{}:rental:2", booking.id)).await.unwrap();
    assert_eq!(confirmed.rental_payment_id.as_deref(), Some(retry.payment_id.as_str()));
    assert_eq!(h.gateway.charge_count(GatewayOp::Capture).await, 1);
}

#[tokio::test]
async fn test_cancel_during_declined_capture_stays_refunded() {
    let h = Harness::new().await;
    let booking = h.create(RENTER, "l-mod", date(3, 15), date(3, 18)).await;
    h.gateway
        .fail_next(GatewayOp::Capture, Fault::Delay(Duration::from_millis(300)))
        .await;
    h.gateway
        .fail_next(GatewayOp::Capture, Fault::Decline("insufficient_funds".into()))
        .await;

    let engine = h.engine.clone();
    let id = booking.id.clone();
    let confirm = tokio::spawn(async move {
        engine
            .transition(&id, OWNER, BookingStatus::Confirmed, None)
            .await
    });

    while h.gateway.calls(GatewayOp::Capture).await == 0 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    let cancelled = h
        .engine
        .transition(&booking.id, RENTER, BookingStatus::Cancelled, None)
        .await
        .unwrap();
    assert_eq!(cancelled.payment_status, PaymentStatus::Refunded);

    let err = confirm.await.unwrap().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PaymentFailed);

    // The late capture failure must not overwrite the settled refund.
    let after = h.engine.get_booking(&booking.id, RENTER).await.unwrap().booking;
    assert_eq!(after.status, BookingStatus::Cancelled);
    assert_eq!(after.payment_stage, PaymentStage::Settled);
    assert_eq!(after.payment_status, PaymentStatus::Refunded);
    assert_eq!(after.refund_id, cancelled.refund_id);
    assert!(after.refund_id.is_some());
}

#[tokio::test]
async fn test_full_lifecycle_and_audit_trail() {
    let h = Harness::new().await;
    let booking = h.create(RENTER, "l-mod", date(3, 15), date(3, 18)).await;

    for (actor, target) in [
        (OWNER, BookingStatus::Confirmed),
        (RENTER, BookingStatus::Active),
        (OWNER, BookingStatus::Completed),
    ] {
        h.engine.transition(&booking.id, actor, target, None).await.unwrap();
    }

    let view = h.engine.get_booking(&booking.id, RENTER).await.unwrap();
    assert_eq!(view.booking.status, BookingStatus::Completed);
    assert_eq!(view.booking.payment_stage, PaymentStage::Settled);
    assert!(view.available_actions.is_empty());

    let history = h.db.bookings().transitions(&booking.id).await.unwrap();
    let path: Vec<_> = history.iter().map(|t| t.to_status).collect();
    assert_eq!(
        path,
        vec![BookingStatus::Confirmed, BookingStatus::Active, BookingStatus::Completed]
    );

    let err = h
        .engine
        .update_details(
            &booking.id,
            OWNER,
            BookingPatch {
                owner_notes: Some("thanks!".into()),
                ..BookingPatch::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
}

// =============================================================================
// Refunds
// =============================================================================

#[tokio::test]
async fn test_reject_refunds_full_upfront() {
    let h = Harness::new().await;
    let booking = h.create(RENTER, "l-strict", date(3, 15), date(3, 18)).await;

    let rejected = h
        .engine
        .transition(&booking.id, OWNER, BookingStatus::Rejected, None)
        .await
        .unwrap();

    assert_eq!(rejected.status, BookingStatus::Rejected);
    assert_eq!(rejected.payment_stage, PaymentStage::Settled);
    assert_eq!(rejected.payment_status, PaymentStatus::Refunded);

    let refund = h.gateway.charge(&format!("{}:refund", booking.id)).await.unwrap();
    assert_eq!(refund.amount.cents(), 1400);
    assert_eq!(rejected.refund_id.as_deref(), Some(refund.payment_id.as_str()));
}

#[tokio::test]
async fn test_cancel_confirmed_refunds_per_policy() {
    let h = Harness::new().await;
    let moderate = h.create(RENTER, "l-mod", date(3, 15), date(3, 18)).await;
    let strict = h.create(RENTER, "l-strict", date(3, 15), date(3, 18)).await;
    let flexible = h.create(RENTER, "l-flex", date(3, 15), date(3, 18)).await;
    for b in [&moderate, &strict, &flexible] {
        h.engine
            .transition(&b.id, OWNER, BookingStatus::Confirmed, None)
            .await
            .unwrap();
    }

    // Moderate, 12 days notice: full rental refund.
    let engine = h.engine_on(date(3, 3));
    let cancelled = engine
        .transition(&moderate.id, RENTER, BookingStatus::Cancelled, None)
        .await
        .unwrap();
    assert_eq!(cancelled.payment_status, PaymentStatus::Refunded);
    let refund = h.gateway.charge(&format!("{}:refund", moderate.id)).await.unwrap();
    assert_eq!(refund.amount.cents(), 13_500);

    // Strict, 5 days notice: nothing back.
    let engine = h.engine_on(date(3, 10));
    let cancelled = engine
        .transition(&strict.id, RENTER, BookingStatus::Cancelled, None)
        .await
        .unwrap();
    assert_eq!(cancelled.status, BookingStatus::Cancelled);
    assert_eq!(cancelled.payment_stage, PaymentStage::Settled);
    assert_eq!(cancelled.payment_status, PaymentStatus::Paid);
    assert!(cancelled.refund_id.is_none());

    // Flexible, on the start day: half back.
    let engine = h.engine_on(date(3, 15));
    engine
        .transition(&flexible.id, RENTER, BookingStatus::Cancelled, None)
        .await
        .unwrap();
    let refund = h.gateway.charge(&format!("{}:refund", flexible.id)).await.unwrap();
    assert_eq!(refund.amount.cents(), 6750);

    let sent = h.notifier.wait_for(9, Duration::from_secs(2)).await;
    assert!(sent
        .iter()
        .any(|n| n.user_id == OWNER && n.template == NotificationTemplate::BookingCancelled));
}

#[tokio::test]
async fn test_replayed_cancel_refunds_once() {
    let h = Harness::new().await;
    let booking = h.create(RENTER, "l-mod", date(3, 15), date(3, 18)).await;

    let first = h
        .engine
        .transition(&booking.id, RENTER, BookingStatus::Cancelled, None)
        .await
        .unwrap();
    let again = h
        .engine
        .transition(&booking.id, RENTER, BookingStatus::Cancelled, None)
        .await
        .unwrap();

    assert_eq!(first.refund_id, again.refund_id);
    assert_eq!(h.gateway.calls(GatewayOp::Refund).await, 1);
    assert_eq!(h.db.bookings().transitions(&booking.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_replay_finishes_failed_refund() {
    let h = Harness::new().await;
    let booking = h.create(RENTER, "l-mod", date(3, 15), date(3, 18)).await;
    h.gateway
        .fail_next(GatewayOp::Refund, Fault::Decline("processor_error".into()))
        .await;

    let err = h
        .engine
        .transition(&booking.id, OWNER, BookingStatus::Rejected, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PaymentFailed);

    let closed = h.engine.get_booking(&booking.id, OWNER).await.unwrap().booking;
    assert_eq!(closed.status, BookingStatus::Rejected);
    assert!(closed.refund_id.is_none());

    let finished = h
        .engine
        .transition(&booking.id, OWNER, BookingStatus::Rejected, None)
        .await
        .unwrap();
    assert_eq!(finished.payment_status, PaymentStatus::Refunded);
    let refund = h.gateway.charge(&format!("{}:refund:2", booking.id)).await.unwrap();
    assert_eq!(finished.refund_id.as_deref(), Some(refund.payment_id.as_str()));
}

// =============================================================================
// Updates & Queries
// =============================================================================

#[tokio::test]
async fn test_field_writes_are_role_gated() {
    let h = Harness::new().await;
    let booking = h.create(RENTER, "l-mod", date(3, 15), date(3, 18)).await;

    let err = h
        .engine
        .update_details(
            &booking.id,
            RENTER,
            BookingPatch {
                owner_notes: Some("mine now".into()),
                ..BookingPatch::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let updated = h
        .engine
        .update_details(
            &booking.id,
            OWNER,
            BookingPatch {
                owner_notes: Some("  Pickup at the side door  ".into()),
                checkout_condition: Some("Sensor clean".into()),
                ..BookingPatch::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.owner_notes.as_deref(), Some("Pickup at the side door"));
    assert_eq!(updated.checkout_condition.as_deref(), Some("Sensor clean"));

    let stranger = h
        .engine
        .update_details(&booking.id, "someone-else", BookingPatch::default())
        .await
        .unwrap_err();
    assert_eq!(stranger.kind(), ErrorKind::Forbidden);
}

#[tokio::test]
async fn test_patch_with_status_transitions_then_writes() {
    let h = Harness::new().await;
    let booking = h.create(RENTER, "l-mod", date(3, 15), date(3, 18)).await;

    let updated = h
        .engine
        .update_details(
            &booking.id,
            OWNER,
            BookingPatch {
                status: Some(BookingStatus::Confirmed),
                expected_status: Some(BookingStatus::PendingOwnerApproval),
                owner_notes: Some("See you Friday".into()),
                ..BookingPatch::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.status, BookingStatus::Confirmed);
    assert_eq!(updated.owner_notes.as_deref(), Some("See you Friday"));

    // Notes cannot ride along with a move into a closed status.
    let err = h
        .engine
        .update_details(
            &booking.id,
            RENTER,
            BookingPatch {
                status: Some(BookingStatus::Cancelled),
                renter_notes: Some("plans changed".into()),
                ..BookingPatch::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    let still = h.engine.get_booking(&booking.id, RENTER).await.unwrap().booking;
    assert_eq!(still.status, BookingStatus::Confirmed);
}

#[tokio::test]
async fn test_updates_are_rate_limited() {
    let config = EngineConfig {
        rate_limit: RateLimitConfig {
            max_updates: 2,
            window_secs: 900,
        },
        ..EngineConfig::default()
    };
    let h = Harness::with_config(config).await;
    let booking = h.create(RENTER, "l-mod", date(3, 15), date(3, 18)).await;

    let patch = BookingPatch {
        renter_notes: Some("arriving at 9".into()),
        ..BookingPatch::default()
    };
    for _ in 0..2 {
        h.engine
            .update_details(&booking.id, RENTER, patch.clone())
            .await
            .unwrap();
    }

    let err = h
        .engine
        .update_details(&booking.id, RENTER, patch.clone())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::RateLimited { retry_after_secs } if retry_after_secs > 0));

    // The owner has their own allowance.
    assert!(h
        .engine
        .update_details(&booking.id, OWNER, BookingPatch::default())
        .await
        .is_ok());
}

#[tokio::test]
async fn test_get_booking_is_party_only() {
    let h = Harness::new().await;
    let booking = h.create(RENTER, "l-mod", date(3, 15), date(3, 18)).await;

    let owner_view = h.engine.get_booking(&booking.id, OWNER).await.unwrap();
    assert_eq!(owner_view.role, ActorRole::Owner);
    assert_eq!(owner_view.listing.id, "l-mod");
    assert_eq!(
        owner_view.available_actions,
        vec![BookingStatus::Confirmed, BookingStatus::Rejected]
    );

    let renter_view = h.engine.get_booking(&booking.id, RENTER).await.unwrap();
    assert_eq!(renter_view.available_actions, vec![BookingStatus::Cancelled]);

    let err = h.engine.get_booking(&booking.id, "someone-else").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let missing = h.engine.get_booking("nope", OWNER).await.unwrap_err();
    assert_eq!(missing.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_list_bookings_by_role_and_status() {
    let h = Harness::new().await;
    let a = h.create(RENTER, "l-mod", date(3, 15), date(3, 18)).await;
    h.create("renter-2", "l-flex", date(3, 15), date(3, 18)).await;
    h.engine
        .transition(&a.id, OWNER, BookingStatus::Confirmed, None)
        .await
        .unwrap();

    let owned = h
        .engine
        .list_bookings(OWNER, ActorRole::Owner, None, None)
        .await
        .unwrap();
    assert_eq!(owned.len(), 2);

    let confirmed = h
        .engine
        .list_bookings(OWNER, ActorRole::Owner, Some(BookingStatus::Confirmed), Some(10))
        .await
        .unwrap();
    assert_eq!(confirmed.len(), 1);
    assert_eq!(confirmed[0].id, a.id);

    let rented = h
        .engine
        .list_bookings(RENTER, ActorRole::Renter, None, None)
        .await
        .unwrap();
    assert_eq!(rented.len(), 1);

    let err = h
        .engine
        .list_bookings(OWNER, ActorRole::Owner, None, Some(0))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn test_quote_matches_booking_and_persists_nothing() {
    let h = Harness::new().await;
    let quote = h
        .engine
        .quote(&QuoteRequest {
            listing_id: "l-mod".into(),
            start_date: date(3, 15),
            end_date: date(3, 18),
            delivery_method: DeliveryMethod::Pickup,
            guarantee_tier: GuaranteeTier::None,
        })
        .await
        .unwrap();

    assert_eq!(quote.total.cents(), 14_900);
    assert_eq!(h.gateway.calls(GatewayOp::Authorize).await, 0);
    assert!(h
        .engine
        .list_bookings(RENTER, ActorRole::Renter, None, None)
        .await
        .unwrap()
        .is_empty());

    let booking = h.create(RENTER, "l-mod", date(3, 15), date(3, 18)).await;
    assert_eq!(booking.total_price_cents, quote.total.cents());
}
