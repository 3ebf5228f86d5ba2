//! # Credit Ledger Store
//!
//! Embedded in-memory implementations of the core store traits:
//!
//! - [`InMemoryLedgerStore`]: append-only entry log with per
//!   user+category optimistic-concurrency versions
//! - [`InMemoryBookingStore`]: booking records with deterministic reads
//! - [`InMemoryOccurrenceDirectory`]: seedable stand-in for the
//!   scheduling subsystem
//! - [`RateTable`]: builder-style rate configuration
//!
//! These back tests and embedded deployments; a durable backend
//! implements the same traits against its database, keeping the atomic
//! batch append and per-pair serialization contract.

pub mod booking;
pub mod ledger;
pub mod rates;
pub mod schedule;

pub use booking::InMemoryBookingStore;
pub use ledger::InMemoryLedgerStore;
pub use rates::RateTable;
pub use schedule::InMemoryOccurrenceDirectory;
