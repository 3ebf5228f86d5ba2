//! Concurrency tests: the double-spend race.
//!
//! N concurrent check-ins against a balance of exactly N credits must all
//! succeed exactly once each; N+1 concurrent check-ins against N credits
//! must produce exactly one failure. Prevention lives in the store's
//! isolation (versioned atomic batch appends), not in best-effort
//! application checks, so these tests run real tasks against one shared
//! store.

#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]

use credit_ledger_core::booking::BookingStatus;
use credit_ledger_core::environment::Clock;
use credit_ledger_core::ledger::LedgerStore;
use credit_ledger_core::types::{CreditCategory, OccurrenceId, UserId};
use credit_ledger_engine::{AllocatorConfig, BookingService, LotAllocator, TransitionError};
use credit_ledger_store::{InMemoryBookingStore, InMemoryLedgerStore};
use credit_ledger_testing::{fixtures, test_clock};
use std::sync::Arc;

async fn service_with_credits(credits: u32) -> (BookingService, Arc<InMemoryLedgerStore>, UserId) {
    let clock = Arc::new(test_clock());
    let ledger = Arc::new(InMemoryLedgerStore::new(clock.clone()));
    let user = UserId::new();
    let category = CreditCategory::new("group");

    // Contention here is far above production levels; give the
    // compare-and-swap loop room so only genuine insufficiency fails.
    let allocator = LotAllocator::with_config(
        ledger.clone(),
        clock,
        AllocatorConfig { max_attempts: 64 },
    );
    let service = BookingService::new(Arc::new(InMemoryBookingStore::new()), allocator);

    let request = fixtures::grant_request(user, &category, credits, 30, "p-race");
    ledger
        .record_grant(request)
        .await
        .expect("grant should succeed");

    (service, ledger, user)
}

async fn spawn_check_ins(
    service: &BookingService,
    user: UserId,
    count: u32,
) -> (u32, Vec<TransitionError>) {
    let category = CreditCategory::new("group");
    let mut handles = Vec::new();
    for _ in 0..count {
        let service = service.clone();
        let category = category.clone();
        handles.push(tokio::spawn(async move {
            let booking = service
                .register(user, OccurrenceId::new(), category)
                .await
                .expect("register should succeed");
            service.transition(booking.id, BookingStatus::CheckedIn).await
        }));
    }

    let mut successes = 0;
    let mut failures = Vec::new();
    for handle in handles {
        match handle.await.expect("task should not panic") {
            Ok(_) => successes += 1,
            Err(error) => failures.push(error),
        }
    }
    (successes, failures)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn n_concurrent_check_ins_against_n_credits_all_succeed() {
    let (service, ledger, user) = service_with_credits(5).await;

    let (successes, failures) = spawn_check_ins(&service, user, 5).await;
    assert_eq!(successes, 5, "unexpected failures: {failures:?}");

    let snapshot = ledger
        .lots(user, CreditCategory::new("group"))
        .await
        .expect("snapshot should succeed");
    assert!(snapshot.available_at(test_clock().now()).is_zero());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn one_more_check_in_than_credits_fails_exactly_once() {
    let (service, ledger, user) = service_with_credits(5).await;

    let (successes, failures) = spawn_check_ins(&service, user, 6).await;
    assert_eq!(successes, 5);
    assert_eq!(failures.len(), 1);
    assert!(
        matches!(
            failures[0],
            TransitionError::InsufficientBalance { .. }
        ),
        "the loser must see a balance conflict, got {:?}",
        failures[0]
    );

    // Exactly five live draws: no lot was overshot.
    let entries = ledger
        .entries(user, CreditCategory::new("group"))
        .await
        .expect("entries should succeed");
    assert_eq!(entries.iter().filter(|e| e.is_draw()).count(), 5);
}
