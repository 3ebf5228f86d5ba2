//! Ledger store trait: the durable, append-only record of grants and
//! consumptions.
//!
//! # Design
//!
//! The store is deliberately minimal. It provides exactly what the
//! allocator and the read side need:
//!
//! - Record a grant lot (idempotent per purchase reference)
//! - Atomically append a batch of consumption drafts with optimistic
//!   concurrency
//! - Append a reversal for a prior draw
//! - Snapshot reads for projections and reconciliation
//!
//! There is no update and no delete: the append-only invariant is the
//! property that makes the ledger auditable and concurrent readers safe.
//!
//! # Concurrency
//!
//! Every user+category pair carries a [`Version`] that advances on each
//! append touching that pair. [`LedgerStore::append_consumptions`] takes
//! the version the caller planned against and fails with
//! [`LedgerError::VersionConflict`] when the ledger has moved. That is the
//! compare-and-swap loop that serializes concurrent check-ins and prevents
//! the double-spend race. Implementations must additionally re-validate
//! every draft's lot balance inside the same transaction, so even an
//! unversioned append can never overshoot a lot.
//!
//! # Dyn compatibility
//!
//! Methods return explicit `Pin<Box<dyn Future>>` instead of `async fn`
//! so the store can be shared as `Arc<dyn LedgerStore>` across the
//! allocator, projections and reconciliation.

use crate::entry::{ConsumptionDraft, ConsumptionEntry, GrantRequest, LotLedger};
use crate::error::LedgerError;
use crate::types::{ConsumptionId, CreditCategory, LotId, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::pin::Pin;

/// Monotonic version of one user+category ledger.
///
/// Starts at zero for an untouched pair and advances by one on every
/// append (grant, draw batch, reversal) that touches the pair.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version(u64);

impl Version {
    /// Creates a version from a raw counter value
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// The version of an untouched ledger
    #[must_use]
    pub const fn initial() -> Self {
        Self(0)
    }

    /// The version after one more append
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the raw counter value
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Append-only store for grant lots and consumption entries.
///
/// Implementations must be `Send + Sync`; all mutating operations must be
/// atomic (a failed batch persists nothing) and serialized per
/// user+category.
pub trait LedgerStore: Send + Sync {
    /// Record a grant lot from a completed purchase.
    ///
    /// Returns the new lot's id.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvalidAmount`]: quantity was zero
    /// - [`LedgerError::DuplicateSource`]: the purchase reference already
    ///   granted a lot (the event was delivered twice)
    /// - [`LedgerError::Storage`]: backing storage failed
    fn record_grant(
        &self,
        grant: GrantRequest,
    ) -> Pin<Box<dyn Future<Output = Result<LotId, LedgerError>> + Send + '_>>;

    /// Snapshot one user's lot set in one category.
    ///
    /// Lots come back in grant admission order with derived remaining
    /// balances; the snapshot carries the pair's current [`Version`] as
    /// the optimistic-concurrency token for a subsequent
    /// [`append_consumptions`](LedgerStore::append_consumptions) call.
    /// A pair with no grants yields an empty snapshot at
    /// [`Version::initial`], not an error.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::Storage`]: backing storage failed
    fn lots(
        &self,
        user: UserId,
        category: CreditCategory,
    ) -> Pin<Box<dyn Future<Output = Result<LotLedger, LedgerError>> + Send + '_>>;

    /// Atomically append a batch of consumption draws.
    ///
    /// This is the multi-lot draw-down of one allocation: either every
    /// draft commits or none does. Passing `Some(version)` asserts the
    /// user+category ledger has not moved since the caller's snapshot;
    /// `None` skips the check (single-draft administrative paths).
    ///
    /// Returns the new entries' ids in draft order.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::VersionConflict`]: the ledger moved; re-snapshot
    ///   and retry
    /// - [`LedgerError::InvalidAmount`]: a draft amount was zero, or the
    ///   batch was empty
    /// - [`LedgerError::CauseConflict`]: drafts named more than one cause
    /// - [`LedgerError::UnknownLot`]: a draft referenced a lot that does
    ///   not exist or belongs to a different user+category
    /// - [`LedgerError::InsufficientLotBalance`]: a draft exceeds its
    ///   lot's derived remaining balance
    /// - [`LedgerError::Storage`]: backing storage failed
    fn append_consumptions(
        &self,
        user: UserId,
        category: CreditCategory,
        expected: Option<Version>,
        drafts: Vec<ConsumptionDraft>,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<ConsumptionId>, LedgerError>> + Send + '_>>;

    /// Append the equal-and-opposite reversal of a prior draw.
    ///
    /// Returns the reversal entry's id.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::UnknownConsumption`]: the id does not name a draw
    ///   entry (reversals themselves cannot be reversed)
    /// - [`LedgerError::AlreadyReversed`]: a reversal for this draw
    ///   already exists (idempotency guard against double-reversal)
    /// - [`LedgerError::Storage`]: backing storage failed
    fn reverse_consumption(
        &self,
        id: ConsumptionId,
    ) -> Pin<Box<dyn Future<Output = Result<ConsumptionId, LedgerError>> + Send + '_>>;

    /// All consumption entries referencing one user's lots in one
    /// category, in append order.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::Storage`]: backing storage failed
    fn entries(
        &self,
        user: UserId,
        category: CreditCategory,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<ConsumptionEntry>, LedgerError>> + Send + '_>>;

    /// The full consumption log across all users, in append order.
    ///
    /// Audit read used by the periodic reconciliation check.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::Storage`]: backing storage failed
    fn consumption_log(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<ConsumptionEntry>, LedgerError>> + Send + '_>>;
}
