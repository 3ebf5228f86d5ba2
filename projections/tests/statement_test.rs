//! Statement aggregation over the embedded stores.

#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]

use chrono::Duration;
use credit_ledger_core::booking::{Booking, BookingStatus, BookingStore};
use credit_ledger_core::environment::Clock;
use credit_ledger_core::types::{
    BookingId, CoachId, CreditCategory, LocationId, Money, OccurrenceId, UserId,
};
use credit_ledger_projections::{
    ExpenseLine, RateWarning, StatementAggregator, StatementPeriod,
};
use credit_ledger_store::{InMemoryBookingStore, InMemoryOccurrenceDirectory, RateTable};
use credit_ledger_testing::{fixtures, test_clock};
use std::sync::Arc;

struct Setup {
    bookings: Arc<InMemoryBookingStore>,
    schedule: Arc<InMemoryOccurrenceDirectory>,
    aggregator: StatementAggregator,
    location: LocationId,
}

fn setup() -> Setup {
    let bookings = Arc::new(InMemoryBookingStore::new());
    let schedule = Arc::new(InMemoryOccurrenceDirectory::new());
    let aggregator = StatementAggregator::new(bookings.clone(), schedule.clone());
    Setup {
        bookings,
        schedule,
        aggregator,
        location: LocationId::new(),
    }
}

async fn attended(setup: &Setup, occurrence: OccurrenceId, category: &CreditCategory) {
    let mut booking = Booking::new(BookingId::new(), UserId::new(), occurrence, category.clone());
    booking.status = BookingStatus::CheckedIn;
    setup.bookings.insert(booking).await.expect("insert");
}

#[tokio::test]
async fn groups_income_and_payout_with_one_lookup_per_group() {
    let setup = setup();
    let group = CreditCategory::new("group");
    let coach = CoachId::new();
    let in_period = test_clock().now() + Duration::days(3);

    let morning = fixtures::occurrence(setup.location, coach, &group, in_period);
    let evening =
        fixtures::occurrence(setup.location, coach, &group, in_period + Duration::hours(8));
    setup.schedule.insert(morning.clone()).await;
    setup.schedule.insert(evening.clone()).await;

    // Three attendees in the morning, one in the evening.
    for _ in 0..3 {
        attended(&setup, morning.id, &group).await;
    }
    attended(&setup, evening.id, &group).await;

    let rates = RateTable::new()
        .with_income_rate(group.clone(), Money::from_major(25))
        .with_coach_rate(coach, group.clone(), Money::from_major(15))
        .with_transport_rate(Money::from_major(4));

    let period = StatementPeriod::new(setup.location, 2026, 3).unwrap();
    let statement = setup
        .aggregator
        .statement(
            period,
            &rates,
            vec![ExpenseLine {
                label: "mat replacement".to_string(),
                amount: Money::from_major(40),
            }],
        )
        .await
        .unwrap();

    assert_eq!(statement.income.len(), 1);
    assert_eq!(statement.income[0].attended, 4);
    assert_eq!(statement.income_total, Money::from_major(100));

    assert_eq!(statement.coach_sessions.len(), 1);
    assert_eq!(statement.coach_sessions[0].attended, 4);
    assert_eq!(statement.transport.len(), 1);
    assert_eq!(statement.transport[0].occurrences, 2);
    // 4 × $15 sessions + 2 × $4 transport.
    assert_eq!(statement.coach_total, Money::from_major(68));

    assert_eq!(statement.custom_total, Money::from_major(40));
    assert_eq!(
        statement.net,
        Money::from_major(100) - (Money::from_major(68) + Money::from_major(40))
    );
    assert!(statement.warnings.is_empty());
}

#[tokio::test]
async fn bookings_outside_the_period_or_location_are_ignored() {
    let setup = setup();
    let group = CreditCategory::new("group");
    let coach = CoachId::new();

    let inside = fixtures::occurrence(
        setup.location,
        coach,
        &group,
        test_clock().now() + Duration::days(3),
    );
    let next_month = fixtures::occurrence(
        setup.location,
        coach,
        &group,
        test_clock().now() + Duration::days(45),
    );
    let elsewhere = fixtures::occurrence(
        LocationId::new(),
        coach,
        &group,
        test_clock().now() + Duration::days(3),
    );
    for occurrence in [&inside, &next_month, &elsewhere] {
        setup.schedule.insert((*occurrence).clone()).await;
        attended(&setup, occurrence.id, &group).await;
    }

    let rates = RateTable::new()
        .with_income_rate(group.clone(), Money::from_major(25))
        .with_coach_rate(coach, group, Money::from_major(15))
        .with_transport_rate(Money::from_major(4));

    let period = StatementPeriod::new(setup.location, 2026, 3).unwrap();
    let statement = setup
        .aggregator
        .statement(period, &rates, Vec::new())
        .await
        .unwrap();

    assert_eq!(statement.income[0].attended, 1);
    assert_eq!(statement.transport[0].occurrences, 1);
}

#[tokio::test]
async fn missing_rates_warn_per_group_instead_of_failing() {
    let setup = setup();
    let group = CreditCategory::new("group");
    let private = CreditCategory::new("private");
    let coach = CoachId::new();
    let in_period = test_clock().now() + Duration::days(3);

    let group_class = fixtures::occurrence(setup.location, coach, &group, in_period);
    let private_class = fixtures::occurrence(setup.location, coach, &private, in_period);
    setup.schedule.insert(group_class.clone()).await;
    setup.schedule.insert(private_class.clone()).await;
    attended(&setup, group_class.id, &group).await;
    attended(&setup, private_class.id, &private).await;

    // Only the group income rate is configured.
    let rates = RateTable::new().with_income_rate(group.clone(), Money::from_major(25));

    let period = StatementPeriod::new(setup.location, 2026, 3).unwrap();
    let statement = setup
        .aggregator
        .statement(period, &rates, Vec::new())
        .await
        .unwrap();

    // Both categories appear; the unconfigured one contributes nothing
    // but is flagged.
    assert_eq!(statement.income.len(), 2);
    assert_eq!(statement.income_total, Money::from_major(25));
    assert!(statement
        .warnings
        .contains(&RateWarning::MissingIncomeRate { category: private }));
    assert!(statement.warnings.contains(&RateWarning::MissingCoachRate {
        coach,
        category: group
    }));
    assert!(statement.warnings.contains(&RateWarning::MissingTransportRate));
}

#[tokio::test]
async fn repeated_runs_are_byte_identical() {
    let setup = setup();
    let group = CreditCategory::new("group");
    let in_period = test_clock().now() + Duration::days(3);

    // Several coaches and occurrences to give the grouping something to
    // keep stable.
    for i in 0..4 {
        let occurrence = fixtures::occurrence(
            setup.location,
            CoachId::new(),
            &group,
            in_period + Duration::hours(i),
        );
        setup.schedule.insert(occurrence.clone()).await;
        attended(&setup, occurrence.id, &group).await;
        attended(&setup, occurrence.id, &group).await;
    }

    let rates = RateTable::new().with_income_rate(group.clone(), Money::from_major(25));
    let period = StatementPeriod::new(setup.location, 2026, 3).unwrap();

    let first = setup
        .aggregator
        .statement(period, &rates, Vec::new())
        .await
        .unwrap();
    let second = setup
        .aggregator
        .statement(period, &rates, Vec::new())
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_vec(&first).unwrap(),
        serde_json::to_vec(&second).unwrap()
    );
}

#[tokio::test]
async fn empty_period_yields_an_empty_statement() {
    let setup = setup();
    let rates = RateTable::new();
    let period = StatementPeriod::new(setup.location, 2026, 3).unwrap();

    let statement = setup
        .aggregator
        .statement(period, &rates, Vec::new())
        .await
        .unwrap();
    assert!(statement.income.is_empty());
    assert!(statement.coach_sessions.is_empty());
    assert!(statement.transport.is_empty());
    assert!(statement.warnings.is_empty());
    assert_eq!(statement.net, Money::ZERO);
}
