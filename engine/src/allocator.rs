//! Lot allocation: First-Expiring-First-Out.
//!
//! Turns a single consumption request (user, category, amount) into one
//! atomic draw-down across specific lots:
//!
//! 1. Snapshot the user's lots in the category, excluding lots already
//!    expired at allocation time and lots with nothing remaining.
//! 2. Sort ascending by expiry, ties broken by grant admission order,
//!    so the plan is fully deterministic.
//! 3. Greedily draw until the requested amount is satisfied.
//! 4. Submit the whole plan as one versioned batch append: either every
//!    draft commits or none does.
//!
//! When a concurrent writer moved the ledger between snapshot and append,
//! the store answers `VersionConflict` and the allocator re-snapshots and
//! re-plans: the compare-and-swap loop that serializes allocations per
//! user+category without holding locks across awaits. FEFO minimizes
//! credit expiry waste for the user and mirrors perishable-inventory
//! allocation.

use credit_ledger_core::entry::{ConsumptionCause, ConsumptionDraft};
use credit_ledger_core::environment::Clock;
use credit_ledger_core::error::LedgerError;
use credit_ledger_core::ledger::LedgerStore;
use credit_ledger_core::types::{ConsumptionId, CreditCategory, Credits, LotId, UserId};
use smallvec::SmallVec;
use std::sync::Arc;
use thiserror::Error;

/// Errors from allocation and release.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AllocationError {
    /// Total available balance across all eligible lots is less than the
    /// requested amount. Nothing was written.
    #[error("Insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance {
        /// Credits requested
        requested: Credits,
        /// Credits available across eligible lots at snapshot time
        available: Credits,
    },

    /// Concurrent writers kept moving the ledger; retries exhausted.
    #[error("Allocation contended after {attempts} attempts")]
    Contended {
        /// How many snapshot/append rounds were tried
        attempts: u32,
    },

    /// The ledger store refused the operation.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Configuration for the allocator's compare-and-swap retry loop.
#[derive(Clone, Copy, Debug)]
pub struct AllocatorConfig {
    /// Snapshot/append rounds before giving up with
    /// [`AllocationError::Contended`]
    pub max_attempts: u32,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self { max_attempts: 5 }
    }
}

/// One committed draw against one lot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LotDraw {
    /// The lot drawn from
    pub lot: LotId,
    /// Credits drawn
    pub amount: Credits,
}

/// The result of one successful allocation.
///
/// `consumption_ids` is the full list of entries the allocation produced,
/// recorded so a later reversal undoes *exactly* these entries,
/// order-independently.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AllocationOutcome {
    /// Ids of the committed consumption entries, in draw order
    pub consumption_ids: Vec<ConsumptionId>,
    /// Which lots were drawn and by how much
    pub draws: SmallVec<[LotDraw; 2]>,
}

/// FEFO allocator over a shared ledger store.
#[derive(Clone)]
pub struct LotAllocator {
    ledger: Arc<dyn LedgerStore>,
    clock: Arc<dyn Clock>,
    config: AllocatorConfig,
}

impl LotAllocator {
    /// Creates an allocator with the default retry configuration
    #[must_use]
    pub fn new(ledger: Arc<dyn LedgerStore>, clock: Arc<dyn Clock>) -> Self {
        Self::with_config(ledger, clock, AllocatorConfig::default())
    }

    /// Creates an allocator with an explicit retry configuration
    #[must_use]
    pub fn with_config(
        ledger: Arc<dyn LedgerStore>,
        clock: Arc<dyn Clock>,
        config: AllocatorConfig,
    ) -> Self {
        Self {
            ledger,
            clock,
            config,
        }
    }

    /// Allocates `amount` credits from the user's eligible lots,
    /// soonest-expiring first, as one all-or-nothing draw-down.
    ///
    /// # Errors
    ///
    /// - [`AllocationError::InsufficientBalance`]: eligible lots cannot
    ///   cover the request; no consumption entries were written
    /// - [`AllocationError::Contended`]: concurrent writers exhausted the
    ///   retry attempts
    /// - [`AllocationError::Ledger`]: the store refused the batch
    pub async fn allocate(
        &self,
        user: UserId,
        category: CreditCategory,
        amount: Credits,
        cause: ConsumptionCause,
    ) -> Result<AllocationOutcome, AllocationError> {
        if amount.is_zero() {
            return Err(AllocationError::Ledger(LedgerError::InvalidAmount));
        }

        let mut attempts = 0;
        loop {
            attempts += 1;
            let snapshot = self.ledger.lots(user, category.clone()).await?;
            let now = self.clock.now();

            let mut eligible: Vec<_> = snapshot
                .lots
                .iter()
                .filter(|lb| !lb.remaining.is_zero() && !lb.expired_at(now))
                .collect();
            eligible.sort_by_key(|lb| (lb.lot.expires_at, lb.lot.seq));

            let available: Credits = eligible.iter().map(|lb| lb.remaining).sum();
            if available < amount {
                return Err(AllocationError::InsufficientBalance {
                    requested: amount,
                    available,
                });
            }

            let mut draws: SmallVec<[LotDraw; 2]> = SmallVec::new();
            let mut outstanding = amount;
            for lb in eligible {
                if outstanding.is_zero() {
                    break;
                }
                let draw = outstanding.min(lb.remaining);
                draws.push(LotDraw {
                    lot: lb.lot.id,
                    amount: draw,
                });
                outstanding = outstanding.saturating_sub(draw);
            }

            let drafts: Vec<ConsumptionDraft> = draws
                .iter()
                .map(|draw| ConsumptionDraft {
                    lot: draw.lot,
                    amount: draw.amount,
                    cause: cause.clone(),
                })
                .collect();

            match self
                .ledger
                .append_consumptions(user, category.clone(), Some(snapshot.version), drafts)
                .await
            {
                Ok(consumption_ids) => {
                    tracing::debug!(
                        user = %user,
                        %category,
                        %amount,
                        lots = draws.len(),
                        attempts,
                        "allocation committed"
                    );
                    return Ok(AllocationOutcome {
                        consumption_ids,
                        draws,
                    });
                }
                Err(LedgerError::VersionConflict { .. }) if attempts < self.config.max_attempts => {
                    tracing::debug!(user = %user, %category, attempts, "allocation raced, retrying");
                }
                Err(LedgerError::VersionConflict { .. }) => {
                    return Err(AllocationError::Contended { attempts });
                }
                Err(other) => return Err(other.into()),
            }
        }
    }

    /// Reverses exactly the entries a prior allocation produced.
    ///
    /// Idempotent: entries already reversed (a retried cancellation) are
    /// skipped. Returns the reversal entries appended by this call.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError::Ledger`] on the first entry whose
    /// reversal the store refuses for any reason other than
    /// [`LedgerError::AlreadyReversed`].
    pub async fn release(
        &self,
        consumption_ids: &[ConsumptionId],
    ) -> Result<Vec<ConsumptionId>, AllocationError> {
        let mut reversals = Vec::with_capacity(consumption_ids.len());
        for &id in consumption_ids {
            match self.ledger.reverse_consumption(id).await {
                Ok(reversal) => reversals.push(reversal),
                Err(LedgerError::AlreadyReversed(_)) => {
                    tracing::debug!(consumption = %id, "already reversed, skipping");
                }
                Err(other) => return Err(other.into()),
            }
        }
        Ok(reversals)
    }
}
