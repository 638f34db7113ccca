//! Route handlers.

pub mod bookings;
pub mod health;
