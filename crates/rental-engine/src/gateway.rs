//! # Payment Gateway
//!
//! The trait the engine uses to move money, plus an in-memory
//! implementation for development and tests.
//!
//! ## Idempotency
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Every call carries an idempotency key:                                │
//! │                                                                         │
//! │    {bookingId}:upfront   authorize  (platform fee + guarantee)         │
//! │    {bookingId}:rental    capture    (rent + delivery)                  │
//! │    {bookingId}:refund    refund                                        │
//! │                                                                         │
//! │  Repeating a call with a key that already succeeded returns the        │
//! │  original payment id and moves no money. A declined key stays          │
//! │  declined: a new attempt needs a new key ({base}:2, {base}:3, ...).     │
//! │                                                                         │
//! │  lookup(key) reports what the gateway recorded for a key. It is the    │
//! │  source of truth after a timeout.                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use rental_core::Money;

// =============================================================================
// Errors
// =============================================================================

/// Failures reported by a payment gateway.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    /// The gateway refused the charge. Retrying will not help.
    #[error("Payment declined: {0}")]
    Declined(String),

    /// Network or gateway hiccup. The call did not happen.
    #[error("Gateway unavailable: {0}")]
    Transient(String),

    /// No answer in time. The call may or may not have happened.
    #[error("Gateway call timed out")]
    Timeout,
}

impl GatewayError {
    /// Returns true if the same call may be sent again with the same key.
    pub fn is_retryable(&self) -> bool {
        matches!(self, GatewayError::Transient(_))
    }
}

// =============================================================================
// Operations & Records
// =============================================================================

/// The three money movements of a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatewayOp {
    /// Upfront charge at request time.
    Authorize,
    /// Rental charge at confirmation.
    Capture,
    /// Money back to the renter.
    Refund,
}

impl GatewayOp {
    /// Suffix of the idempotency key for this operation.
    pub const fn key_suffix(&self) -> &'static str {
        match self {
            GatewayOp::Authorize => "upfront",
            GatewayOp::Capture => "rental",
            GatewayOp::Refund => "refund",
        }
    }

    /// Idempotency key for this operation on `booking_id`.
    pub fn key_for(&self, booking_id: &str) -> String {
        format!("{}:{}", booking_id, self.key_suffix())
    }
}

/// State of a charge as recorded by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargeStatus {
    Succeeded,
    Processing,
    Failed,
}

/// What the gateway knows about one idempotency key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeRecord {
    pub payment_id: String,
    pub idempotency_key: String,
    pub op: GatewayOp,
    pub amount: Money,
    pub status: ChargeStatus,
}

// =============================================================================
// Gateway Trait
// =============================================================================

/// An external payment processor.
///
/// Implementations must treat `idempotency_key` as the identity of the
/// call: a key that already succeeded returns the same payment id, and a
/// key that was declined answers `Declined` again without charging. Only
/// transient failures and unapplied timeouts leave a key unused.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Charges the renter's upfront amount. Returns the payment id.
    async fn authorize(
        &self,
        idempotency_key: &str,
        booking_id: &str,
        amount: Money,
    ) -> Result<String, GatewayError>;

    /// Charges the rental amount at confirmation. Returns the payment id.
    async fn capture(
        &self,
        idempotency_key: &str,
        booking_id: &str,
        amount: Money,
    ) -> Result<String, GatewayError>;

    /// Returns `amount` of `payment_id` to the renter. Returns the refund id.
    async fn refund(
        &self,
        idempotency_key: &str,
        payment_id: &str,
        amount: Money,
    ) -> Result<String, GatewayError>;

    /// Reports the recorded outcome for `idempotency_key`, if any.
    async fn lookup(&self, idempotency_key: &str) -> Result<Option<ChargeRecord>, GatewayError>;
}

// =============================================================================
// In-Memory Gateway
// =============================================================================

/// A scripted failure for the next call of one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// Refuse the charge.
    Decline(String),
    /// Fail without recording anything.
    Transient,
    /// Report a timeout. With `applied` the charge is recorded first, the
    /// way a slow gateway completes work after the caller gave up.
    Timeout { applied: bool },
    /// Sleep, then answer with the next queued fault for the same
    /// operation, or normally when none is queued.
    Delay(Duration),
}

#[derive(Debug, Default)]
struct GatewayState {
    /// Recorded outcomes by idempotency key, declines included.
    charges: HashMap<String, ChargeRecord>,
    faults: HashMap<GatewayOp, VecDeque<Fault>>,
    /// Calls received per operation, including failed ones.
    calls: HashMap<GatewayOp, usize>,
}

/// Payment gateway that keeps charges in memory.
///
/// Used by the API in development mode and by tests. Declined calls are
/// recorded as [`ChargeStatus::Failed`] and replayed for their key, the way
/// hosted processors cache the first response per idempotency key.
///
/// ## Example
/// ```rust,ignore
/// let gateway = InMemoryGateway::new();
/// gateway.fail_next(GatewayOp::Capture, Fault::Decline("insufficient_funds".into())).await;
/// ```
#[derive(Debug, Default)]
pub struct InMemoryGateway {
    state: Mutex<GatewayState>,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a fault for the next call of `op`.
    pub async fn fail_next(&self, op: GatewayOp, fault: Fault) {
        let mut state = self.state.lock().await;
        state.faults.entry(op).or_default().push_back(fault);
    }

    /// Number of calls received for `op`.
    pub async fn calls(&self, op: GatewayOp) -> usize {
        self.state.lock().await.calls.get(&op).copied().unwrap_or(0)
    }

    /// Distinct succeeded charges for `op`.
    pub async fn charge_count(&self, op: GatewayOp) -> usize {
        self.state
            .lock()
            .await
            .charges
            .values()
            .filter(|c| c.op == op && c.status == ChargeStatus::Succeeded)
            .count()
    }

    /// The outcome recorded for `idempotency_key`.
    pub async fn charge(&self, idempotency_key: &str) -> Option<ChargeRecord> {
        self.state.lock().await.charges.get(idempotency_key).cloned()
    }

    async fn execute(&self, op: GatewayOp, idempotency_key: &str, amount: Money) -> Result<String, GatewayError> {
        let mut fault = {
            let mut state = self.state.lock().await;
            *state.calls.entry(op).or_default() += 1;
            state.faults.get_mut(&op).and_then(|q| q.pop_front())
        };

        while let Some(Fault::Delay(delay)) = fault {
            tokio::time::sleep(delay).await;
            let mut state = self.state.lock().await;
            fault = state.faults.get_mut(&op).and_then(|q| q.pop_front());
        }

        if let Some(existing) = self.charge(idempotency_key).await {
            if existing.status == ChargeStatus::Failed {
                debug!(key = %idempotency_key, "Replaying recorded decline");
                return Err(GatewayError::Declined("idempotency key was declined".to_string()));
            }
        }

        match fault {
            Some(Fault::Decline(reason)) => {
                self.record(op, idempotency_key, amount, ChargeStatus::Failed).await;
                return Err(GatewayError::Declined(reason));
            }
            Some(Fault::Transient) => {
                return Err(GatewayError::Transient("connection reset".to_string()))
            }
            Some(Fault::Timeout { applied }) => {
                if applied {
                    self.record(op, idempotency_key, amount, ChargeStatus::Succeeded).await;
                }
                return Err(GatewayError::Timeout);
            }
            Some(Fault::Delay(_)) | None => {}
        }

        Ok(self
            .record(op, idempotency_key, amount, ChargeStatus::Succeeded)
            .await)
    }

    async fn record(
        &self,
        op: GatewayOp,
        idempotency_key: &str,
        amount: Money,
        status: ChargeStatus,
    ) -> String {
        let mut state = self.state.lock().await;

        if let Some(existing) = state.charges.get(idempotency_key) {
            debug!(key = %idempotency_key, payment_id = %existing.payment_id, "Idempotent replay");
            return existing.payment_id.clone();
        }

        let prefix = match op {
            GatewayOp::Authorize | GatewayOp::Capture => "pay",
            GatewayOp::Refund => "re",
        };
        let payment_id = format!("{}_{}", prefix, Uuid::new_v4().simple());

        state.charges.insert(
            idempotency_key.to_string(),
            ChargeRecord {
                payment_id: payment_id.clone(),
                idempotency_key: idempotency_key.to_string(),
                op,
                amount,
                status,
            },
        );

        debug!(key = %idempotency_key, payment_id = %payment_id, amount = %amount, ?status, "Charge recorded");
        payment_id
    }
}

#[async_trait]
impl PaymentGateway for InMemoryGateway {
    async fn authorize(
        &self,
        idempotency_key: &str,
        _booking_id: &str,
        amount: Money,
    ) -> Result<String, GatewayError> {
        self.execute(GatewayOp::Authorize, idempotency_key, amount).await
    }

    async fn capture(
        &self,
        idempotency_key: &str,
        _booking_id: &str,
        amount: Money,
    ) -> Result<String, GatewayError> {
        self.execute(GatewayOp::Capture, idempotency_key, amount).await
    }

    async fn refund(
        &self,
        idempotency_key: &str,
        _payment_id: &str,
        amount: Money,
    ) -> Result<String, GatewayError> {
        self.execute(GatewayOp::Refund, idempotency_key, amount).await
    }

    async fn lookup(&self, idempotency_key: &str) -> Result<Option<ChargeRecord>, GatewayError> {
        Ok(self.charge(idempotency_key).await)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
