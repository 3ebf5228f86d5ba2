//! End-to-end check-in flow over the embedded stores.
//!
//! Walks the canonical two-lot scenario: a 5-credit lot expiring in 10
//! days and a 3-credit lot expiring in 40 days, with check-ins drawing
//! soonest-expiring-first and a correction restoring exactly what its
//! check-in consumed.

#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]

use credit_ledger_core::booking::BookingStatus;
use credit_ledger_core::environment::Clock;
use credit_ledger_core::ledger::LedgerStore;
use credit_ledger_core::types::{CreditCategory, Credits, LotId, OccurrenceId, UserId};
use credit_ledger_engine::{BookingService, LotAllocator};
use credit_ledger_store::{InMemoryBookingStore, InMemoryLedgerStore};
use credit_ledger_testing::{fixtures, test_clock};
use std::sync::Arc;

struct Harness {
    ledger: Arc<InMemoryLedgerStore>,
    service: BookingService,
    user: UserId,
    category: CreditCategory,
}

impl Harness {
    fn new() -> Self {
        let clock = Arc::new(test_clock());
        let ledger = Arc::new(InMemoryLedgerStore::new(clock.clone()));
        let service = BookingService::new(
            Arc::new(InMemoryBookingStore::new()),
            LotAllocator::new(ledger.clone(), clock),
        );
        Self {
            ledger,
            service,
            user: UserId::new(),
            category: CreditCategory::new("group"),
        }
    }

    async fn grant(&self, quantity: u32, expires_in_days: i64, source: &str) -> LotId {
        self.ledger
            .record_grant(fixtures::grant_request(
                self.user,
                &self.category,
                quantity,
                expires_in_days,
                source,
            ))
            .await
            .expect("grant should succeed")
    }

    async fn check_in(&self) -> credit_ledger_core::booking::Booking {
        let booking = self
            .service
            .register(self.user, OccurrenceId::new(), self.category.clone())
            .await
            .expect("register should succeed");
        self.service
            .transition(booking.id, BookingStatus::CheckedIn)
            .await
            .expect("check-in should succeed")
    }

    async fn remaining(&self, lot: LotId) -> Credits {
        let snapshot = self
            .ledger
            .lots(self.user, self.category.clone())
            .await
            .expect("snapshot should succeed");
        snapshot
            .lots
            .iter()
            .find(|lb| lb.lot.id == lot)
            .expect("lot should exist")
            .remaining
    }
}

#[tokio::test]
async fn two_lot_scenario_traces_exactly() {
    let harness = Harness::new();
    let soon = harness.grant(5, 10, "p-soon").await;
    let late = harness.grant(3, 40, "p-late").await;

    // Three check-ins: all drawn from the 10-day lot.
    let _first = harness.check_in().await;
    let _second = harness.check_in().await;
    let third = harness.check_in().await;
    assert_eq!(harness.remaining(soon).await, Credits::new(2));
    assert_eq!(harness.remaining(late).await, Credits::new(3));

    // Fourth check-in still fits in the 10-day lot's remaining 2.
    let fourth = harness.check_in().await;
    assert_eq!(harness.remaining(soon).await, Credits::new(1));
    assert_eq!(harness.remaining(late).await, Credits::new(3));

    // Cancelling the third reverses exactly its entry from the 10-day
    // lot; the fourth check-in's consumption stands.
    harness
        .service
        .transition(third.id, BookingStatus::Cancelled)
        .await
        .expect("cancellation should succeed");
    assert_eq!(harness.remaining(soon).await, Credits::new(2));
    assert_eq!(harness.remaining(late).await, Credits::new(3));

    // The fourth booking's entry list is untouched by the reversal.
    let snapshot = harness
        .ledger
        .lots(harness.user, harness.category.clone())
        .await
        .expect("snapshot should succeed");
    assert_eq!(
        snapshot.available_at(test_clock().now()),
        Credits::new(5),
        "5 credits remain bookable across both lots"
    );
    assert_eq!(fourth.consumptions.len(), 1);
}

#[tokio::test]
async fn round_trip_restores_the_pre_check_in_balance() {
    let harness = Harness::new();
    harness.grant(2, 10, "p-a").await;
    harness.grant(3, 40, "p-b").await;

    let before = harness
        .ledger
        .lots(harness.user, harness.category.clone())
        .await
        .expect("snapshot should succeed")
        .available_at(test_clock().now());

    let booking = harness.check_in().await;
    harness
        .service
        .transition(booking.id, BookingStatus::NoShow)
        .await
        .expect("no-show correction should succeed");

    let after = harness
        .ledger
        .lots(harness.user, harness.category.clone())
        .await
        .expect("snapshot should succeed")
        .available_at(test_clock().now());
    assert_eq!(before, after);
}

#[tokio::test]
async fn fifth_check_in_spans_into_the_later_lot() {
    let harness = Harness::new();
    let soon = harness.grant(2, 10, "p-soon").await;
    let late = harness.grant(3, 40, "p-late").await;

    harness.check_in().await;
    harness.check_in().await;
    let spanning = harness.check_in().await;

    assert_eq!(harness.remaining(soon).await, Credits::new(0));
    assert_eq!(harness.remaining(late).await, Credits::new(2));
    assert_eq!(spanning.consumptions.len(), 1);
}
