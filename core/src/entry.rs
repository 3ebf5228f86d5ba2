//! Ledger entry types: grant lots and consumption entries.
//!
//! The ledger is append-only. A lot's remaining balance is never stored;
//! it is derived by folding the consumption entries that reference it
//! (draws subtract, reversals add back). "Deleting" a consumption is only
//! ever expressed as appending an equal-and-opposite reversal entry, which
//! is what keeps the ledger auditable and concurrent readers safe.

use crate::types::{
    AdjustmentRef, BookingId, ConsumptionId, CreditCategory, Credits, LotId, PurchaseRef,
    Timestamp, UserId,
};
use serde::{Deserialize, Serialize};

/// A discrete, expiry-bearing grant of credits from one completed purchase.
///
/// Immutable once recorded: the expiry is set at creation and never
/// mutated, and the granted quantity never changes. `seq` is the store's
/// grant admission order and breaks expiry ties deterministically during
/// allocation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lot {
    /// Lot identifier
    pub id: LotId,
    /// Owning user
    pub user: UserId,
    /// Credit category this lot can be consumed in
    pub category: CreditCategory,
    /// Quantity granted (always positive)
    pub granted: Credits,
    /// When the credits expire
    pub expires_at: Timestamp,
    /// The purchase that granted this lot (idempotency key)
    pub source: PurchaseRef,
    /// When the purchase completed
    pub granted_at: Timestamp,
    /// Store-assigned admission order, used as the deterministic tie-break
    /// when two lots share an expiry
    pub seq: u64,
}

/// The exactly-one cause of a consumption entry.
///
/// A consumption is caused either by a booking attendance or by an
/// administrative adjustment; the enum makes "never both, never neither"
/// structural rather than a runtime check. One allocation batch must not
/// mix causes (see `LedgerError::CauseConflict`).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConsumptionCause {
    /// A booking was marked attended
    Booking(BookingId),
    /// Back-office correction outside the booking flow
    Adjustment(AdjustmentRef),
}

impl ConsumptionCause {
    /// Returns the booking id when this is a booking-attendance cause
    #[must_use]
    pub const fn booking_id(&self) -> Option<BookingId> {
        match self {
            Self::Booking(id) => Some(*id),
            Self::Adjustment(_) => None,
        }
    }
}

/// Whether an entry draws credits down or reverses a prior draw.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryKind {
    /// Reduces the referenced lot's derived remaining balance
    Draw,
    /// Equal-and-opposite entry undoing one prior draw
    Reversal {
        /// The draw entry being reversed
        of: ConsumptionId,
    },
}

/// An immutable ledger record against exactly one lot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumptionEntry {
    /// Entry identifier
    pub id: ConsumptionId,
    /// The lot this entry draws from (or restores to)
    pub lot: LotId,
    /// Credit amount (always positive; direction comes from `kind`)
    pub amount: Credits,
    /// What caused the draw; reversals inherit the cause of the entry
    /// they undo
    pub cause: ConsumptionCause,
    /// Draw or reversal
    pub kind: EntryKind,
    /// When the entry was committed
    pub recorded_at: Timestamp,
}

impl ConsumptionEntry {
    /// Checks whether this is a draw entry
    #[must_use]
    pub const fn is_draw(&self) -> bool {
        matches!(self.kind, EntryKind::Draw)
    }

    /// The draw this entry reverses, if it is a reversal
    #[must_use]
    pub const fn reverses(&self) -> Option<ConsumptionId> {
        match self.kind {
            EntryKind::Draw => None,
            EntryKind::Reversal { of } => Some(of),
        }
    }
}

/// A completed-purchase event from the payment subsystem, requesting a
/// grant lot. Mirrors the boundary event
/// `{user, category, quantity, expiry, purchase_ref}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantRequest {
    /// The purchasing user
    pub user: UserId,
    /// Category the credits are bookable in
    pub category: CreditCategory,
    /// Credits purchased (must be positive)
    pub quantity: Credits,
    /// When the credits expire
    pub expires_at: Timestamp,
    /// Purchase reference (grant idempotency key)
    pub source: PurchaseRef,
    /// When the purchase completed
    pub purchased_at: Timestamp,
}

/// One planned draw against a specific lot, submitted as part of an
/// atomic allocation batch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumptionDraft {
    /// The lot to draw from
    pub lot: LotId,
    /// Credits to draw (must be positive and within the lot's derived
    /// remaining balance at commit time)
    pub amount: Credits,
    /// The cause to record
    pub cause: ConsumptionCause,
}

/// A lot together with its derived remaining balance at snapshot time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotBalance {
    /// The lot
    pub lot: Lot,
    /// `granted − Σ draws + Σ reversals` over entries referencing the lot
    pub remaining: Credits,
}

impl LotBalance {
    /// Checks whether the lot is expired as of `now`
    #[must_use]
    pub fn expired_at(&self, now: Timestamp) -> bool {
        self.lot.expires_at <= now
    }
}

/// Snapshot of one user's lot set in one category, plus the ledger version
/// current when the snapshot was taken (the optimistic-concurrency token
/// for a subsequent atomic draw-down).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotLedger {
    /// Owning user
    pub user: UserId,
    /// Credit category
    pub category: CreditCategory,
    /// Version of this user+category ledger at snapshot time
    pub version: crate::ledger::Version,
    /// Lots in grant admission order, with derived remaining balances
    pub lots: Vec<LotBalance>,
}

impl LotLedger {
    /// Total remaining credits over lots not yet expired at `now`
    #[must_use]
    pub fn available_at(&self, now: Timestamp) -> Credits {
        self.lots
            .iter()
            .filter(|lb| !lb.expired_at(now))
            .map(|lb| lb.remaining)
            .sum()
    }
}
