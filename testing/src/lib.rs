//! # Credit Ledger Testing
//!
//! Testing utilities for the credit ledger workspace:
//!
//! - [`mocks`]: deterministic clock
//! - [`fixtures`]: builders for grants and schedule entries
//! - [`TransitionTest`]: fluent Given-When-Then helper for the booking
//!   state machine
//! - [`init_test_tracing`]: opt-in log capture for debugging tests

use chrono::{DateTime, Utc};
use credit_ledger_core::environment::Clock;

/// Mock implementations for testing.
pub mod mocks {
    use super::{Clock, DateTime, Utc};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making expiry cutoffs and statement
    /// months reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use credit_ledger_testing::mocks::FixedClock;
    /// use credit_ledger_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2026-03-01 09:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to
    /// parse, which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2026-03-01T09:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

/// Builders for common test data.
pub mod fixtures {
    use super::mocks::test_clock;
    use super::Clock;
    use chrono::Duration;
    use credit_ledger_core::entry::GrantRequest;
    use credit_ledger_core::schedule::ClassOccurrence;
    use credit_ledger_core::types::{
        CoachId, CreditCategory, Credits, LocationId, OccurrenceId, PurchaseRef, Timestamp, UserId,
    };

    /// A grant request expiring `expires_in_days` after the test clock
    /// epoch, keyed by `source`
    #[must_use]
    pub fn grant_request(
        user: UserId,
        category: &CreditCategory,
        quantity: u32,
        expires_in_days: i64,
        source: &str,
    ) -> GrantRequest {
        let now = test_clock().now();
        GrantRequest {
            user,
            category: category.clone(),
            quantity: Credits::new(quantity),
            expires_at: now + Duration::days(expires_in_days),
            source: PurchaseRef::new(source),
            purchased_at: now,
        }
    }

    /// A class occurrence at `location`, starting at `starts_at`
    #[must_use]
    pub fn occurrence(
        location: LocationId,
        coach: CoachId,
        category: &CreditCategory,
        starts_at: Timestamp,
    ) -> ClassOccurrence {
        ClassOccurrence {
            id: OccurrenceId::new(),
            location,
            coach,
            category: category.clone(),
            starts_at,
        }
    }
}

/// Fluent Given-When-Then helper for the booking state machine.
///
/// # Example
///
/// ```
/// use credit_ledger_testing::TransitionTest;
/// use credit_ledger_core::booking::{BookingStatus, TransitionPlan};
///
/// TransitionTest::new()
///     .given_status(BookingStatus::Booked)
///     .when_requested(BookingStatus::CheckedIn)
///     .then_plan(TransitionPlan::ConsumeCredit)
///     .run();
/// ```
#[derive(Debug, Default)]
pub struct TransitionTest {
    from: Option<credit_ledger_core::booking::BookingStatus>,
    to: Option<credit_ledger_core::booking::BookingStatus>,
    expect_plan: Option<credit_ledger_core::booking::TransitionPlan>,
    expect_illegal: bool,
}

impl TransitionTest {
    /// Create an empty transition test
    #[must_use]
    pub const fn new() -> Self {
        Self {
            from: None,
            to: None,
            expect_plan: None,
            expect_illegal: false,
        }
    }

    /// Set the booking's current status (Given)
    #[must_use]
    pub const fn given_status(mut self, from: credit_ledger_core::booking::BookingStatus) -> Self {
        self.from = Some(from);
        self
    }

    /// Set the requested status (When)
    #[must_use]
    pub const fn when_requested(mut self, to: credit_ledger_core::booking::BookingStatus) -> Self {
        self.to = Some(to);
        self
    }

    /// Expect the machine to plan this ledger work (Then)
    #[must_use]
    pub const fn then_plan(mut self, plan: credit_ledger_core::booking::TransitionPlan) -> Self {
        self.expect_plan = Some(plan);
        self
    }

    /// Expect the machine to refuse the transition (Then)
    #[must_use]
    pub const fn then_illegal(mut self) -> Self {
        self.expect_illegal = true;
        self
    }

    /// Run the test and execute the assertion
    ///
    /// # Panics
    ///
    /// Panics if the statuses or expectation are not set, or if the
    /// machine's answer does not match the expectation.
    #[allow(clippy::panic)] // Test code can panic
    #[allow(clippy::expect_used)] // Test code can use expect
    pub fn run(self) {
        let from = self.from.expect("current status must be set with given_status()");
        let to = self.to.expect("requested status must be set with when_requested()");

        let result = from.plan_transition(to);
        match (self.expect_plan, self.expect_illegal) {
            (Some(plan), false) => assert_eq!(
                result,
                Ok(plan),
                "expected {from} -> {to} to plan {plan:?}"
            ),
            (None, true) => assert!(
                result.is_err(),
                "expected {from} -> {to} to be illegal, got {result:?}"
            ),
            _ => panic!("set exactly one expectation with then_plan() or then_illegal()"),
        }
    }
}

/// Installs a `tracing` subscriber honouring `RUST_LOG` for the current
/// test binary. Safe to call from multiple tests; only the first call
/// installs.
pub fn init_test_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// Re-export commonly used items
pub use mocks::{test_clock, FixedClock};
