//! Error taxonomy for the ledger and booking stores.
//!
//! Conflict conditions (`InsufficientLotBalance`, `AlreadyReversed`,
//! `DuplicateSource`, `VersionConflict`) are expected, recoverable
//! outcomes surfaced as typed results: they are control flow for the
//! allocator's retry loop and the grant ingestion idempotency guard, never
//! panics.

use crate::ledger::Version;
use crate::types::{BookingId, ConsumptionId, CreditCategory, Credits, LotId, PurchaseRef, UserId};
use thiserror::Error;

/// Errors from ledger store operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// A grant or draw amount was zero.
    #[error("Amount must be greater than zero")]
    InvalidAmount,

    /// The purchase reference already granted a lot. Guards against
    /// double-processing one purchase event.
    #[error("Purchase {source} already granted lot {lot}")]
    DuplicateSource {
        /// The duplicate purchase reference
        source: PurchaseRef,
        /// The lot the earlier grant created
        lot: LotId,
    },

    /// The referenced lot does not exist, or does not belong to the
    /// user+category the operation named.
    #[error("Unknown lot: {0}")]
    UnknownLot(LotId),

    /// The referenced consumption id does not name a draw entry.
    #[error("Unknown consumption: {0}")]
    UnknownConsumption(ConsumptionId),

    /// A draft would draw more than the lot's derived remaining balance.
    #[error("Insufficient balance in lot {lot}: requested {requested}, remaining {remaining}")]
    InsufficientLotBalance {
        /// The over-drawn lot
        lot: LotId,
        /// Credits the draft asked for
        requested: Credits,
        /// Credits actually remaining
        remaining: Credits,
    },

    /// Drafts within one atomic batch named more than one cause. A single
    /// allocation has exactly one cause; mixing them would break the 1:1
    /// correspondence reversal depends on.
    #[error("Consumption batch mixes causes")]
    CauseConflict,

    /// A reversal for this draw already exists. Makes reversal idempotent
    /// under retry.
    #[error("Consumption {0} is already reversed")]
    AlreadyReversed(ConsumptionId),

    /// Optimistic concurrency conflict: the user+category ledger moved
    /// between snapshot and append. The caller re-snapshots and retries.
    #[error("Ledger version conflict for user {user}, category {category}: expected {expected}, found {actual}")]
    VersionConflict {
        /// Owning user
        user: UserId,
        /// Credit category
        category: CreditCategory,
        /// The version the caller planned against
        expected: Version,
        /// The version actually current
        actual: Version,
    },

    /// Backing storage failed.
    #[error("Storage error: {0}")]
    Storage(String),
}

/// Errors from booking store operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BookingError {
    /// No booking with this id exists.
    #[error("Unknown booking: {0}")]
    UnknownBooking(BookingId),

    /// A booking with this id already exists.
    #[error("Booking {0} already exists")]
    DuplicateBooking(BookingId),

    /// Backing storage failed.
    #[error("Storage error: {0}")]
    Storage(String),
}

/// Errors from the scheduling subsystem boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    /// Backing storage failed.
    #[error("Storage error: {0}")]
    Storage(String),
}
