//! # Notifications
//!
//! Best-effort messages to the other party of a booking.
//!
//! Notifications are sent after the change they describe has committed, on
//! a spawned task. A failed notification is logged and otherwise ignored;
//! it never fails or rolls back a booking operation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use rental_core::BookingStatus;

// =============================================================================
// Templates
// =============================================================================

/// Which message to send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationTemplate {
    BookingRequested,
    BookingConfirmed,
    BookingRejected,
    BookingCancelled,
    BookingStarted,
    BookingCompleted,
}

impl NotificationTemplate {
    pub const fn as_str(&self) -> &'static str {
        match self {
            NotificationTemplate::BookingRequested => "booking_requested",
            NotificationTemplate::BookingConfirmed => "booking_confirmed",
            NotificationTemplate::BookingRejected => "booking_rejected",
            NotificationTemplate::BookingCancelled => "booking_cancelled",
            NotificationTemplate::BookingStarted => "booking_started",
            NotificationTemplate::BookingCompleted => "booking_completed",
        }
    }

    /// Template announcing that a booking reached `status`.
    pub const fn for_status(status: BookingStatus) -> Self {
        match status {
            BookingStatus::PendingOwnerApproval => NotificationTemplate::BookingRequested,
            BookingStatus::Confirmed => NotificationTemplate::BookingConfirmed,
            BookingStatus::Rejected => NotificationTemplate::BookingRejected,
            BookingStatus::Cancelled => NotificationTemplate::BookingCancelled,
            BookingStatus::Active => NotificationTemplate::BookingStarted,
            BookingStatus::Completed => NotificationTemplate::BookingCompleted,
        }
    }
}

// =============================================================================
// Notifier Trait
// =============================================================================

#[derive(Debug, Clone, Error)]
pub enum NotifyError {
    #[error("Notification delivery failed: {0}")]
    Delivery(String),
}

/// Delivers a templated message to a user.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(
        &self,
        user_id: &str,
        template: NotificationTemplate,
        data: Value,
    ) -> Result<(), NotifyError>;
}

/// Sends a notification on a background task.
///
/// The returned handle may be dropped; the task runs to completion either
/// way.
pub fn dispatch(
    notifier: Arc<dyn Notifier>,
    user_id: String,
    template: NotificationTemplate,
    data: Value,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = notifier.notify(&user_id, template, data).await {
            warn!(user_id = %user_id, template = template.as_str(), error = %e, "Notification dropped");
        }
    })
}

// =============================================================================
// Implementations
// =============================================================================

/// Writes notifications to the log. The default when no delivery channel
/// is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(
        &self,
        user_id: &str,
        template: NotificationTemplate,
        data: Value,
    ) -> Result<(), NotifyError> {
        info!(user_id = %user_id, template = template.as_str(), %data, "Notification");
        Ok(())
    }
}

/// A notification captured by [`RecordingNotifier`].
#[derive(Debug, Clone, PartialEq)]
pub struct SentNotification {
    pub user_id: String,
    pub template: NotificationTemplate,
    pub data: Value,
}

/// Keeps every notification in memory. Can be told to fail.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<SentNotification>>,
    failing: Mutex<bool>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent deliveries fail (after recording them).
    pub async fn set_failing(&self, failing: bool) {
        *self.failing.lock().await = failing;
    }

    pub async fn sent(&self) -> Vec<SentNotification> {
        self.sent.lock().await.clone()
    }

    /// Waits until at least `count` notifications arrived or `timeout`
    /// passed, then returns what was sent.
    pub async fn wait_for(&self, count: usize, timeout: Duration) -> Vec<SentNotification> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let sent = self.sent().await;
            if sent.len() >= count || tokio::time::Instant::now() >= deadline {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(
        &self,
        user_id: &str,
        template: NotificationTemplate,
        data: Value,
    ) -> Result<(), NotifyError> {
        self.sent.lock().await.push(SentNotification {
            user_id: user_id.to_string(),
            template,
            data,
        });

        if *self.failing.lock().await {
            return Err(NotifyError::Delivery("smtp unavailable".into()));
        }
        Ok(())
    }
}
