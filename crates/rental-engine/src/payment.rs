//! # Payment Stage Coordinator
//!
//! Runs the three money movements of a booking against the gateway with
//! timeouts, one retry and timeout resolution.
//!
//! ## Call Resolution
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         One Gateway Call                                │
//! │                                                                         │
//! │  call(key) ─── ok ──────────────────────────────────────► payment id   │
//! │     │                                                                   │
//! │     ├── Declined ───────────────────────────────────────► PaymentFailed│
//! │     │                                                                   │
//! │     ├── Transient ──► call(key) again (once) ──► ok / PaymentFailed    │
//! │     │                                                                   │
//! │     └── Timeout ───► lookup(key)                                       │
//! │                        ├── succeeded ──────────────────► adopt its id  │
//! │                        ├── nothing recorded ──► call(key) again (once) │
//! │                        └── anything else ──────────────► PaymentFailed │
//! │                                                                         │
//! │  One call keeps its key across retries, so a charge that landed during │
//! │  a timeout is never taken twice.                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Stage Keys
//!
//! A declined key stays declined at the gateway. Each stage therefore
//! starts from the first key in `{base}`, `{base}:2`, `{base}:3`, ... that
//! has no recorded decline, so retrying a declined stage (another confirm
//! after a failed capture) reaches the processor again.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::PaymentsConfig;
use crate::error::{EngineError, EngineResult};
use crate::gateway::{ChargeRecord, ChargeStatus, GatewayError, GatewayOp, PaymentGateway};
use rental_core::Money;

/// Keys tried per stage before giving up on a payment that keeps declining.
pub const MAX_STAGE_ATTEMPTS: u32 = 5;

/// The idempotency key of attempt `n` (1-based) at a stage.
pub fn attempt_key(base: &str, n: u32) -> String {
    if n <= 1 {
        base.to_string()
    } else {
        format!("{}:{}", base, n)
    }
}

/// Coordinates gateway calls for the upfront, rental and refund stages.
#[derive(Clone)]
pub struct PaymentCoordinator {
    gateway: Arc<dyn PaymentGateway>,
    call_timeout: Duration,
}

impl PaymentCoordinator {
    pub fn new(gateway: Arc<dyn PaymentGateway>, config: &PaymentsConfig) -> Self {
        PaymentCoordinator {
            gateway,
            call_timeout: config.call_timeout(),
        }
    }

    /// Charges the upfront stage (`{booking_id}:upfront`).
    pub async fn authorize_upfront(&self, booking_id: &str, amount: Money) -> EngineResult<String> {
        let key = self.stage_key(&GatewayOp::Authorize.key_for(booking_id)).await?;
        let id = self
            .run(&key, || self.gateway.authorize(&key, booking_id, amount))
            .await?;

        info!(booking_id = %booking_id, payment_id = %id, amount = %amount, "Upfront payment authorized");
        Ok(id)
    }

    /// Captures the rental stage (`{booking_id}:rental`).
    pub async fn capture_rental(&self, booking_id: &str, amount: Money) -> EngineResult<String> {
        let key = self.stage_key(&GatewayOp::Capture.key_for(booking_id)).await?;
        let id = self
            .run(&key, || self.gateway.capture(&key, booking_id, amount))
            .await?;

        info!(booking_id = %booking_id, payment_id = %id, amount = %amount, "Rental payment captured");
        Ok(id)
    }

    /// Refunds `amount` of `payment_id` (`{booking_id}:refund`).
    pub async fn refund(&self, booking_id: &str, payment_id: &str, amount: Money) -> EngineResult<String> {
        let key = GatewayOp::Refund.key_for(booking_id);
        self.refund_with_key(&key, booking_id, payment_id, amount).await
    }

    /// Refund under an explicit base key, for reversals that must not share
    /// the booking's cancellation refund key.
    pub async fn refund_with_key(
        &self,
        base: &str,
        booking_id: &str,
        payment_id: &str,
        amount: Money,
    ) -> EngineResult<String> {
        let key = self.stage_key(base).await?;
        let id = self
            .run(&key, || self.gateway.refund(&key, payment_id, amount))
            .await?;

        info!(booking_id = %booking_id, refund_id = %id, amount = %amount, "Refund issued");
        Ok(id)
    }

    /// True if the gateway holds a successful refund under any of the
    /// `{booking_id}:refund` attempt keys.
    pub async fn refund_recorded(&self, booking_id: &str) -> EngineResult<bool> {
        let base = GatewayOp::Refund.key_for(booking_id);
        for n in 1..=MAX_STAGE_ATTEMPTS {
            match self.lookup(&attempt_key(&base, n)).await? {
                Some(r) if r.status == ChargeStatus::Failed => continue,
                Some(r) => return Ok(r.status == ChargeStatus::Succeeded),
                None => return Ok(false),
            }
        }
        Ok(false)
    }

    /// First key of the `base` attempt chain without a recorded decline.
    async fn stage_key(&self, base: &str) -> EngineResult<String> {
        for n in 1..=MAX_STAGE_ATTEMPTS {
            let key = attempt_key(base, n);
            match self.lookup(&key).await? {
                Some(r) if r.status == ChargeStatus::Failed => {
                    debug!(key = %key, "Key was declined, moving to the next attempt");
                }
                _ => return Ok(key),
            }
        }
        Err(EngineError::PaymentFailed(format!(
            "{} declined {} times",
            base, MAX_STAGE_ATTEMPTS
        )))
    }

    async fn lookup(&self, key: &str) -> EngineResult<Option<ChargeRecord>> {
        self.attempt(self.gateway.lookup(key))
            .await
            .map_err(|e| EngineError::PaymentFailed(format!("gateway lookup failed for {}: {}", key, e)))
    }

    // -------------------------------------------------------------------------
    // Resolution
    // -------------------------------------------------------------------------

    async fn run<F, Fut>(&self, key: &str, call: F) -> EngineResult<String>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<String, GatewayError>>,
    {
        let mut retried = false;

        loop {
            let err = match self.attempt(call()).await {
                Ok(id) => return Ok(id),
                Err(e) => e,
            };

            match err {
                GatewayError::Declined(reason) => {
                    warn!(key = %key, reason = %reason, "Payment declined");
                    return Err(EngineError::PaymentFailed(reason));
                }
                GatewayError::Transient(reason) if !retried => {
                    warn!(key = %key, reason = %reason, "Transient gateway error, retrying");
                    retried = true;
                }
                GatewayError::Timeout => match self.resolve_timeout(key).await? {
                    Some(id) => return Ok(id),
                    None if !retried => {
                        warn!(key = %key, "Gateway has no record after timeout, retrying");
                        retried = true;
                    }
                    None => return Err(GatewayError::Timeout.into()),
                },
                other => return Err(other.into()),
            }
        }
    }

    /// Asks the gateway what happened to `key` after a timeout.
    ///
    /// `Ok(Some(id))` if the charge succeeded, `Ok(None)` if nothing was
    /// recorded.
    async fn resolve_timeout(&self, key: &str) -> EngineResult<Option<String>> {
        match self.lookup(key).await? {
            Some(r) if r.status == ChargeStatus::Succeeded => {
                info!(key = %key, payment_id = %r.payment_id, "Adopted charge found after timeout");
                Ok(Some(r.payment_id))
            }
            Some(r) => Err(EngineError::PaymentFailed(format!(
                "charge {} is {:?}",
                r.payment_id, r.status
            ))),
            None => Ok(None),
        }
    }

    async fn attempt<T>(
        &self,
        fut: impl Future<Output = Result<T, GatewayError>>,
    ) -> Result<T, GatewayError> {
        tokio::time::timeout(self.call_timeout, fut)
            .await
            .unwrap_or(Err(GatewayError::Timeout))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
