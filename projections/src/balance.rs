//! Balance projection.
//!
//! Pure read path over the ledger: derives one user's available balance
//! in one category and the lots about to expire. Never mutates state and
//! never takes a write lock, so it is safe to call concurrently with any
//! writer; reporting lag behind an in-flight allocation is acceptable by
//! design.

use chrono::Duration;
use credit_ledger_core::entry::LotLedger;
use credit_ledger_core::environment::Clock;
use credit_ledger_core::error::LedgerError;
use credit_ledger_core::ledger::LedgerStore;
use credit_ledger_core::types::{CreditCategory, Credits, LotId, Timestamp, UserId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Configuration for the balance projection.
#[derive(Clone, Copy, Debug)]
pub struct BalanceConfig {
    /// Lots expiring within this horizon are reported in
    /// [`Balance::expiring_soon`]
    pub expiring_horizon: Duration,
}

impl Default for BalanceConfig {
    fn default() -> Self {
        Self {
            expiring_horizon: Duration::days(14),
        }
    }
}

/// A lot that still holds credits but expires within the warning horizon.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpiringLot {
    /// The lot
    pub lot: LotId,
    /// Credits that will be lost if unused
    pub remaining: Credits,
    /// When they expire
    pub expires_at: Timestamp,
}

/// One user's derived balance in one category.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    /// Total remaining credits over non-expired lots
    pub available: Credits,
    /// Non-expired lots running out within the configured horizon,
    /// soonest first
    pub expiring_soon: Vec<ExpiringLot>,
}

/// Derives balances from the ledger store.
#[derive(Clone)]
pub struct BalanceProjector {
    ledger: Arc<dyn LedgerStore>,
    clock: Arc<dyn Clock>,
    config: BalanceConfig,
}

impl BalanceProjector {
    /// Creates a projector over `ledger`
    #[must_use]
    pub fn new(ledger: Arc<dyn LedgerStore>, clock: Arc<dyn Clock>, config: BalanceConfig) -> Self {
        Self {
            ledger,
            clock,
            config,
        }
    }

    /// Derives the current balance for one user and category.
    ///
    /// Expired lots are excluded from `available` as of query time;
    /// imminently-expiring lots are still reported for user-facing
    /// warnings.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] when the ledger read fails.
    pub async fn balance(
        &self,
        user: UserId,
        category: CreditCategory,
    ) -> Result<Balance, LedgerError> {
        let snapshot = self.ledger.lots(user, category).await?;
        let now = self.clock.now();
        Ok(Self::project(&snapshot, now, self.config.expiring_horizon))
    }

    fn project(snapshot: &LotLedger, now: Timestamp, horizon: Duration) -> Balance {
        let cutoff = now + horizon;
        let mut expiring_soon: Vec<ExpiringLot> = snapshot
            .lots
            .iter()
            .filter(|lb| !lb.remaining.is_zero() && !lb.expired_at(now))
            .filter(|lb| lb.lot.expires_at <= cutoff)
            .map(|lb| ExpiringLot {
                lot: lb.lot.id,
                remaining: lb.remaining,
                expires_at: lb.lot.expires_at,
            })
            .collect();
        expiring_soon.sort_by_key(|e| (e.expires_at, e.lot));

        Balance {
            available: snapshot.available_at(now),
            expiring_soon,
        }
    }
}
