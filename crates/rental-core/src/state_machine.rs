//! # Booking State Machine
//!
//! Which party may move a booking from which status to which, and which
//! descriptive fields each party may write.
//!
//! ## Transition Table
//! ```text
//! ┌────────────────────────┬────────────┬──────────────────┐
//! │ From                   │ To         │ Allowed actor    │
//! ├────────────────────────┼────────────┼──────────────────┤
//! │ PENDING_OWNER_APPROVAL │ CONFIRMED  │ owner            │
//! │ PENDING_OWNER_APPROVAL │ REJECTED   │ owner            │
//! │ PENDING_OWNER_APPROVAL │ CANCELLED  │ renter           │
//! │ CONFIRMED              │ CANCELLED  │ renter           │
//! │ CONFIRMED              │ ACTIVE     │ owner or renter  │
//! │ ACTIVE                 │ COMPLETED  │ owner or renter  │
//! └────────────────────────┴────────────┴──────────────────┘
//! ```
//!
//! ## Error Precedence
//! ```text
//! caller not owner/renter ...................... NotAParty          (403)
//! no edge into target admits the caller's role . RoleNotAllowed     (403)
//! client's expected status is stale ............ InvalidTransition  (409)
//! edge exists but starts elsewhere ............. InvalidTransition  (409)
//! ```
//! A caller who may never reach the target learns nothing about the
//! booking's current status.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use ts_rs::TS;

use crate::types::BookingStatus;

// =============================================================================
// Actor Role
// =============================================================================

/// The side of a booking a caller is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum ActorRole {
    Owner,
    Renter,
}

impl fmt::Display for ActorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActorRole::Owner => f.write_str("owner"),
            ActorRole::Renter => f.write_str("renter"),
        }
    }
}

// =============================================================================
// Transition Table
// =============================================================================

/// One edge of the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: BookingStatus,
    pub to: BookingStatus,
    pub roles: &'static [ActorRole],
}

impl Transition {
    #[inline]
    pub fn allows(&self, role: ActorRole) -> bool {
        self.roles.contains(&role)
    }
}

const OWNER: &[ActorRole] = &[ActorRole::Owner];
const RENTER: &[ActorRole] = &[ActorRole::Renter];
const EITHER: &[ActorRole] = &[ActorRole::Owner, ActorRole::Renter];

/// Every legal edge.
pub const TRANSITIONS: [Transition; 6] = [
    Transition {
        from: BookingStatus::PendingOwnerApproval,
        to: BookingStatus::Confirmed,
        roles: OWNER,
    },
    Transition {
        from: BookingStatus::PendingOwnerApproval,
        to: BookingStatus::Rejected,
        roles: OWNER,
    },
    Transition {
        from: BookingStatus::PendingOwnerApproval,
        to: BookingStatus::Cancelled,
        roles: RENTER,
    },
    Transition {
        from: BookingStatus::Confirmed,
        to: BookingStatus::Cancelled,
        roles: RENTER,
    },
    Transition {
        from: BookingStatus::Confirmed,
        to: BookingStatus::Active,
        roles: EITHER,
    },
    Transition {
        from: BookingStatus::Active,
        to: BookingStatus::Completed,
        roles: EITHER,
    },
];

// =============================================================================
// Errors
// =============================================================================

/// Why a transition or field write was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    /// The caller is neither the owner nor the renter.
    #[error("Only the owner or renter of a booking may change it")]
    NotAParty,

    /// No edge into the target admits the caller's role.
    #[error("The {role} may not move a booking to {to}")]
    RoleNotAllowed { role: ActorRole, to: BookingStatus },

    /// The edge exists but the booking is not in its source status.
    #[error("Cannot move booking from {from} to {to}")]
    InvalidTransition { from: BookingStatus, to: BookingStatus },

    /// The role may not write this field.
    #[error("The {role} may not edit {field}")]
    FieldNotWritable { role: ActorRole, field: BookingField },

    /// The booking has reached a terminal status.
    #[error("Booking is {status} and can no longer be edited")]
    BookingClosed { status: BookingStatus },
}

// =============================================================================
// Transition Authorization
// =============================================================================

/// Validates `current → target` for a caller with `role`.
///
/// `role` is `None` when the caller is not a party. `expected` is the status
/// the client believes the booking is in, if it sent one.
///
/// ## Example
/// ```rust
/// use rental_core::state_machine::{authorize_transition, ActorRole, TransitionError};
/// use rental_core::types::BookingStatus;
///
/// // Owners cannot cancel a confirmed booking.
/// let err = authorize_transition(
///     BookingStatus::Confirmed,
///     BookingStatus::Cancelled,
///     Some(ActorRole::Owner),
///     None,
/// )
/// .unwrap_err();
/// assert!(matches!(err, TransitionError::RoleNotAllowed { .. }));
/// ```
pub fn authorize_transition(
    current: BookingStatus,
    target: BookingStatus,
    role: Option<ActorRole>,
    expected: Option<BookingStatus>,
) -> Result<Transition, TransitionError> {
    let role = role.ok_or(TransitionError::NotAParty)?;

    let mut admitted = TRANSITIONS
        .iter()
        .filter(|t| t.to == target && t.allows(role))
        .peekable();

    if admitted.peek().is_none() {
        return Err(TransitionError::RoleNotAllowed { role, to: target });
    }

    if expected.is_some_and(|e| e != current) {
        return Err(TransitionError::InvalidTransition {
            from: current,
            to: target,
        });
    }

    admitted
        .find(|t| t.from == current)
        .copied()
        .ok_or(TransitionError::InvalidTransition {
            from: current,
            to: target,
        })
}

/// Statuses `role` could move a booking in `current` to right now.
pub fn available_targets(current: BookingStatus, role: ActorRole) -> Vec<BookingStatus> {
    TRANSITIONS
        .iter()
        .filter(|t| t.from == current && t.allows(role))
        .map(|t| t.to)
        .collect()
}

// =============================================================================
// Field Writes
// =============================================================================

/// Descriptive booking fields that parties may edit after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BookingField {
    OwnerNotes,
    RenterNotes,
    CheckoutCondition,
    ReturnCondition,
}

impl BookingField {
    /// Roles allowed to write this field.
    pub const fn writers(&self) -> &'static [ActorRole] {
        match self {
            BookingField::OwnerNotes => OWNER,
            BookingField::RenterNotes => RENTER,
            BookingField::CheckoutCondition | BookingField::ReturnCondition => EITHER,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            BookingField::OwnerNotes => "ownerNotes",
            BookingField::RenterNotes => "renterNotes",
            BookingField::CheckoutCondition => "checkoutCondition",
            BookingField::ReturnCondition => "returnCondition",
        }
    }
}

impl fmt::Display for BookingField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validates a write of `field` by a caller with `role` on a booking in
/// `status`.
pub fn authorize_field_write(
    status: BookingStatus,
    role: Option<ActorRole>,
    field: BookingField,
) -> Result<(), TransitionError> {
    let role = role.ok_or(TransitionError::NotAParty)?;

    if !field.writers().contains(&role) {
        return Err(TransitionError::FieldNotWritable { role, field });
    }

    if status.is_terminal() {
        return Err(TransitionError::BookingClosed { status });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
