//! In-memory ledger store.
//!
//! The embedded implementation of [`LedgerStore`]: an append-only entry
//! log behind one `RwLock`, with a version counter per user+category pair.
//! Every mutating call validates and appends under a single write-lock
//! acquisition, so a failed batch persists nothing and writers to the same
//! pair serialize, which is exactly the isolation the allocator's
//! double-spend guarantee relies on. Readers take the read lock only.

use chrono::{DateTime, Utc};
use credit_ledger_core::entry::{
    ConsumptionDraft, ConsumptionEntry, EntryKind, GrantRequest, Lot, LotBalance, LotLedger,
};
use credit_ledger_core::environment::Clock;
use credit_ledger_core::error::LedgerError;
use credit_ledger_core::ledger::{LedgerStore, Version};
use credit_ledger_core::types::{
    ConsumptionId, CreditCategory, Credits, LotId, PurchaseRef, UserId,
};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::RwLock;

type OwnerKey = (UserId, CreditCategory);

#[derive(Default)]
struct LedgerLog {
    lots: HashMap<LotId, Lot>,
    owners: HashMap<OwnerKey, Vec<LotId>>,
    sources: HashMap<PurchaseRef, LotId>,
    entries: Vec<ConsumptionEntry>,
    entries_by_lot: HashMap<LotId, Vec<usize>>,
    index: HashMap<ConsumptionId, usize>,
    reversed: HashSet<ConsumptionId>,
    versions: HashMap<OwnerKey, Version>,
    next_seq: u64,
}

impl LedgerLog {
    /// `granted − Σ draws + Σ reversals` over entries referencing the lot.
    fn remaining(&self, lot: &Lot) -> Credits {
        let mut drawn = 0u32;
        let mut restored = 0u32;
        if let Some(indices) = self.entries_by_lot.get(&lot.id) {
            for &i in indices {
                let entry = &self.entries[i];
                if entry.is_draw() {
                    drawn += entry.amount.count();
                } else {
                    restored += entry.amount.count();
                }
            }
        }
        // Draws are validated against the derived remaining balance at
        // append time, so this never underflows.
        Credits::new(lot.granted.count() + restored - drawn)
    }

    fn version(&self, key: &OwnerKey) -> Version {
        self.versions.get(key).copied().unwrap_or_default()
    }

    fn bump_version(&mut self, key: OwnerKey) {
        let next = self.version(&key).next();
        self.versions.insert(key, next);
    }

    fn push_entry(&mut self, entry: ConsumptionEntry) {
        let idx = self.entries.len();
        self.index.insert(entry.id, idx);
        self.entries_by_lot.entry(entry.lot).or_default().push(idx);
        self.entries.push(entry);
    }

    fn validate_batch(
        &self,
        user: UserId,
        category: &CreditCategory,
        drafts: &[ConsumptionDraft],
    ) -> Result<(), LedgerError> {
        let Some(first) = drafts.first() else {
            return Err(LedgerError::InvalidAmount);
        };

        let mut totals: HashMap<LotId, Credits> = HashMap::new();
        for draft in drafts {
            if draft.amount.is_zero() {
                return Err(LedgerError::InvalidAmount);
            }
            if draft.cause != first.cause {
                return Err(LedgerError::CauseConflict);
            }
            let lot = self
                .lots
                .get(&draft.lot)
                .filter(|lot| lot.user == user && lot.category == *category)
                .ok_or(LedgerError::UnknownLot(draft.lot))?;

            let total = totals.entry(lot.id).or_default();
            *total = total
                .checked_add(draft.amount)
                .ok_or(LedgerError::InvalidAmount)?;
        }

        for (lot_id, requested) in totals {
            // Lot presence was checked above.
            if let Some(lot) = self.lots.get(&lot_id) {
                let remaining = self.remaining(lot);
                if requested > remaining {
                    return Err(LedgerError::InsufficientLotBalance {
                        lot: lot_id,
                        requested,
                        remaining,
                    });
                }
            }
        }

        Ok(())
    }
}

/// Append-only in-memory [`LedgerStore`].
///
/// Clones share the same log (the inner state is behind an `Arc`), so a
/// single store can be handed to the allocator, projections and
/// reconciliation at once.
#[derive(Clone)]
pub struct InMemoryLedgerStore {
    clock: Arc<dyn Clock>,
    log: Arc<RwLock<LedgerLog>>,
}

impl InMemoryLedgerStore {
    /// Creates an empty store stamping entries with `clock`
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            log: Arc::new(RwLock::new(LedgerLog::default())),
        }
    }

    fn record_entries(
        log: &mut LedgerLog,
        drafts: Vec<ConsumptionDraft>,
        now: DateTime<Utc>,
    ) -> Vec<ConsumptionId> {
        let mut ids = Vec::with_capacity(drafts.len());
        for draft in drafts {
            let id = ConsumptionId::new();
            log.push_entry(ConsumptionEntry {
                id,
                lot: draft.lot,
                amount: draft.amount,
                cause: draft.cause,
                kind: EntryKind::Draw,
                recorded_at: now,
            });
            ids.push(id);
        }
        ids
    }
}

impl LedgerStore for InMemoryLedgerStore {
    fn record_grant(
        &self,
        grant: GrantRequest,
    ) -> Pin<Box<dyn Future<Output = Result<LotId, LedgerError>> + Send + '_>> {
        Box::pin(async move {
            if grant.quantity.is_zero() {
                return Err(LedgerError::InvalidAmount);
            }

            let mut log = self.log.write().await;
            if let Some(&lot) = log.sources.get(&grant.source) {
                return Err(LedgerError::DuplicateSource {
                    source: grant.source,
                    lot,
                });
            }

            let id = LotId::new();
            let seq = log.next_seq;
            log.next_seq += 1;

            let key = (grant.user, grant.category.clone());
            log.sources.insert(grant.source.clone(), id);
            log.owners.entry(key.clone()).or_default().push(id);
            log.lots.insert(
                id,
                Lot {
                    id,
                    user: grant.user,
                    category: grant.category,
                    granted: grant.quantity,
                    expires_at: grant.expires_at,
                    source: grant.source,
                    granted_at: grant.purchased_at,
                    seq,
                },
            );
            log.bump_version(key);

            tracing::debug!(lot = %id, seq, "recorded grant lot");
            Ok(id)
        })
    }

    fn lots(
        &self,
        user: UserId,
        category: CreditCategory,
    ) -> Pin<Box<dyn Future<Output = Result<LotLedger, LedgerError>> + Send + '_>> {
        Box::pin(async move {
            let log = self.log.read().await;
            let key = (user, category.clone());
            let lots = log
                .owners
                .get(&key)
                .map(Vec::as_slice)
                .unwrap_or_default()
                .iter()
                .filter_map(|id| log.lots.get(id))
                .map(|lot| LotBalance {
                    lot: lot.clone(),
                    remaining: log.remaining(lot),
                })
                .collect();

            Ok(LotLedger {
                user,
                category,
                version: log.version(&key),
                lots,
            })
        })
    }

    fn append_consumptions(
        &self,
        user: UserId,
        category: CreditCategory,
        expected: Option<Version>,
        drafts: Vec<ConsumptionDraft>,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<ConsumptionId>, LedgerError>> + Send + '_>> {
        Box::pin(async move {
            let mut log = self.log.write().await;
            let key = (user, category.clone());

            let actual = log.version(&key);
            if let Some(expected) = expected {
                if expected != actual {
                    return Err(LedgerError::VersionConflict {
                        user,
                        category,
                        expected,
                        actual,
                    });
                }
            }

            log.validate_batch(user, &category, &drafts)?;

            let now = self.clock.now();
            let ids = Self::record_entries(&mut log, drafts, now);
            log.bump_version(key);

            tracing::debug!(user = %user, %category, count = ids.len(), "appended consumption batch");
            Ok(ids)
        })
    }

    fn reverse_consumption(
        &self,
        id: ConsumptionId,
    ) -> Pin<Box<dyn Future<Output = Result<ConsumptionId, LedgerError>> + Send + '_>> {
        Box::pin(async move {
            let mut log = self.log.write().await;

            let entry = log
                .index
                .get(&id)
                .map(|&idx| log.entries[idx].clone())
                .filter(ConsumptionEntry::is_draw)
                .ok_or(LedgerError::UnknownConsumption(id))?;

            if log.reversed.contains(&id) {
                return Err(LedgerError::AlreadyReversed(id));
            }

            let owner_key = log
                .lots
                .get(&entry.lot)
                .map(|lot| (lot.user, lot.category.clone()))
                .ok_or(LedgerError::UnknownLot(entry.lot))?;

            let reversal_id = ConsumptionId::new();
            log.push_entry(ConsumptionEntry {
                id: reversal_id,
                lot: entry.lot,
                amount: entry.amount,
                cause: entry.cause,
                kind: EntryKind::Reversal { of: id },
                recorded_at: self.clock.now(),
            });
            log.reversed.insert(id);
            log.bump_version(owner_key);

            tracing::debug!(draw = %id, reversal = %reversal_id, "reversed consumption");
            Ok(reversal_id)
        })
    }

    fn entries(
        &self,
        user: UserId,
        category: CreditCategory,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<ConsumptionEntry>, LedgerError>> + Send + '_>> {
        Box::pin(async move {
            let log = self.log.read().await;
            Ok(log
                .entries
                .iter()
                .filter(|entry| {
                    log.lots
                        .get(&entry.lot)
                        .is_some_and(|lot| lot.user == user && lot.category == category)
                })
                .cloned()
                .collect())
        })
    }

    fn consumption_log(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<ConsumptionEntry>, LedgerError>> + Send + '_>> {
        Box::pin(async move {
            let log = self.log.read().await;
            Ok(log.entries.clone())
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Duration;
    use credit_ledger_core::entry::ConsumptionCause;
    use credit_ledger_core::environment::SystemClock;
    use credit_ledger_core::types::{AdjustmentRef, BookingId};

    fn store() -> InMemoryLedgerStore {
        InMemoryLedgerStore::new(Arc::new(SystemClock))
    }

    fn grant(user: UserId, quantity: u32, source: &str) -> GrantRequest {
        let now = Utc::now();
        GrantRequest {
            user,
            category: CreditCategory::new("group"),
            quantity: Credits::new(quantity),
            expires_at: now + Duration::days(30),
            source: PurchaseRef::new(source),
            purchased_at: now,
        }
    }

    fn draw(lot: LotId, amount: u32) -> ConsumptionDraft {
        ConsumptionDraft {
            lot,
            amount: Credits::new(amount),
            cause: ConsumptionCause::Booking(BookingId::new()),
        }
    }

    #[tokio::test]
    async fn grant_rejects_zero_quantity() {
        let store = store();
        let result = store.record_grant(grant(UserId::new(), 0, "p-0")).await;
        assert_eq!(result, Err(LedgerError::InvalidAmount));
    }

    #[tokio::test]
    async fn grant_is_idempotent_per_source() {
        let store = store();
        let user = UserId::new();
        let lot = store.record_grant(grant(user, 5, "p-1")).await.unwrap();

        let result = store.record_grant(grant(user, 5, "p-1")).await;
        assert_eq!(
            result,
            Err(LedgerError::DuplicateSource {
                source: PurchaseRef::new("p-1"),
                lot,
            })
        );
    }

    #[tokio::test]
    async fn remaining_is_derived_from_entries() {
        let store = store();
        let user = UserId::new();
        let category = CreditCategory::new("group");
        let lot = store.record_grant(grant(user, 5, "p-1")).await.unwrap();

        store
            .append_consumptions(user, category.clone(), None, vec![draw(lot, 2)])
            .await
            .unwrap();

        let snapshot = store.lots(user, category).await.unwrap();
        assert_eq!(snapshot.lots.len(), 1);
        assert_eq!(snapshot.lots[0].remaining, Credits::new(3));
    }

    #[tokio::test]
    async fn overdraw_fails_whole_batch() {
        let store = store();
        let user = UserId::new();
        let category = CreditCategory::new("group");
        let a = store.record_grant(grant(user, 2, "p-1")).await.unwrap();
        let b = store.record_grant(grant(user, 2, "p-2")).await.unwrap();

        // Second draft overdraws lot b; the valid first draft must not
        // persist either.
        let cause = ConsumptionCause::Booking(BookingId::new());
        let result = store
            .append_consumptions(
                user,
                category.clone(),
                None,
                vec![
                    ConsumptionDraft {
                        lot: a,
                        amount: Credits::new(1),
                        cause: cause.clone(),
                    },
                    ConsumptionDraft {
                        lot: b,
                        amount: Credits::new(3),
                        cause,
                    },
                ],
            )
            .await;

        assert!(matches!(
            result,
            Err(LedgerError::InsufficientLotBalance { requested, remaining, .. })
                if requested == Credits::new(3) && remaining == Credits::new(2)
        ));

        let snapshot = store.lots(user, category).await.unwrap();
        assert_eq!(snapshot.lots[0].remaining, Credits::new(2));
        assert_eq!(snapshot.lots[1].remaining, Credits::new(2));
    }

    #[tokio::test]
    async fn batch_rejects_mixed_causes() {
        let store = store();
        let user = UserId::new();
        let category = CreditCategory::new("group");
        let lot = store.record_grant(grant(user, 5, "p-1")).await.unwrap();

        let result = store
            .append_consumptions(
                user,
                category,
                None,
                vec![
                    ConsumptionDraft {
                        lot,
                        amount: Credits::ONE,
                        cause: ConsumptionCause::Booking(BookingId::new()),
                    },
                    ConsumptionDraft {
                        lot,
                        amount: Credits::ONE,
                        cause: ConsumptionCause::Adjustment(AdjustmentRef::new("adj-1")),
                    },
                ],
            )
            .await;
        assert_eq!(result, Err(LedgerError::CauseConflict));
    }

    #[tokio::test]
    async fn stale_version_conflicts() {
        let store = store();
        let user = UserId::new();
        let category = CreditCategory::new("group");
        let lot = store.record_grant(grant(user, 5, "p-1")).await.unwrap();

        let snapshot = store.lots(user, category.clone()).await.unwrap();

        // A concurrent writer lands first.
        store
            .append_consumptions(user, category.clone(), None, vec![draw(lot, 1)])
            .await
            .unwrap();

        let result = store
            .append_consumptions(
                user,
                category.clone(),
                Some(snapshot.version),
                vec![draw(lot, 1)],
            )
            .await;
        assert!(matches!(result, Err(LedgerError::VersionConflict { .. })));

        // Nothing was appended by the losing writer.
        let after = store.lots(user, category).await.unwrap();
        assert_eq!(after.lots[0].remaining, Credits::new(4));
    }

    #[tokio::test]
    async fn reversal_restores_balance_and_is_idempotent() {
        let store = store();
        let user = UserId::new();
        let category = CreditCategory::new("group");
        let lot = store.record_grant(grant(user, 5, "p-1")).await.unwrap();

        let ids = store
            .append_consumptions(user, category.clone(), None, vec![draw(lot, 2)])
            .await
            .unwrap();

        store.reverse_consumption(ids[0]).await.unwrap();
        let snapshot = store.lots(user, category).await.unwrap();
        assert_eq!(snapshot.lots[0].remaining, Credits::new(5));

        assert_eq!(
            store.reverse_consumption(ids[0]).await,
            Err(LedgerError::AlreadyReversed(ids[0]))
        );
    }

    #[tokio::test]
    async fn reversals_cannot_be_reversed() {
        let store = store();
        let user = UserId::new();
        let category = CreditCategory::new("group");
        let lot = store.record_grant(grant(user, 5, "p-1")).await.unwrap();

        let ids = store
            .append_consumptions(user, category, None, vec![draw(lot, 2)])
            .await
            .unwrap();
        let reversal = store.reverse_consumption(ids[0]).await.unwrap();

        assert_eq!(
            store.reverse_consumption(reversal).await,
            Err(LedgerError::UnknownConsumption(reversal))
        );
    }

    #[tokio::test]
    async fn unknown_lot_covers_foreign_owners() {
        let store = store();
        let owner = UserId::new();
        let other = UserId::new();
        let category = CreditCategory::new("group");
        let lot = store.record_grant(grant(owner, 5, "p-1")).await.unwrap();

        let result = store
            .append_consumptions(other, category, None, vec![draw(lot, 1)])
            .await;
        assert_eq!(result, Err(LedgerError::UnknownLot(lot)));
    }
}
