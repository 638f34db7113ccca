//! Repositories over the shared pool.
//!
//! Reads go straight to the pool. Writes that depend on availability run in
//! one transaction that starts with [`ListingRepository::bump_availability`]:
//!
//! ```text
//! insert_checked      bump ─► scan confirmed overlaps ─► insert booking
//! apply_transition    bump ─► scan (confirm only) ─► CAS status ─► log row
//! ```
//!
//! [`ListingRepository::bump_availability`]: listing::ListingRepository::bump_availability

pub mod booking;
pub mod listing;
