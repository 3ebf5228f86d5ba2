//! In-memory rate table.

use credit_ledger_core::rates::RateProvider;
use credit_ledger_core::types::{CoachId, CreditCategory, Money};
use std::collections::HashMap;

/// Builder-style [`RateProvider`] backed by maps.
///
/// Unconfigured lookups return `None`, which the statement aggregator
/// reports as warnings.
#[derive(Clone, Debug, Default)]
pub struct RateTable {
    income: HashMap<CreditCategory, Money>,
    coach: HashMap<(CoachId, CreditCategory), Money>,
    transport: Option<Money>,
}

impl RateTable {
    /// Creates an empty table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the per-session income rate for a category
    #[must_use]
    pub fn with_income_rate(mut self, category: CreditCategory, rate: Money) -> Self {
        self.income.insert(category, rate);
        self
    }

    /// Sets a coach's per-session payout rate for a category
    #[must_use]
    pub fn with_coach_rate(mut self, coach: CoachId, category: CreditCategory, rate: Money) -> Self {
        self.coach.insert((coach, category), rate);
        self
    }

    /// Sets the flat per-occurrence transport rate
    #[must_use]
    pub const fn with_transport_rate(mut self, rate: Money) -> Self {
        self.transport = Some(rate);
        self
    }
}

impl RateProvider for RateTable {
    fn income_rate(&self, category: &CreditCategory) -> Option<Money> {
        self.income.get(category).copied()
    }

    fn coach_rate(&self, coach: CoachId, category: &CreditCategory) -> Option<Money> {
        self.coach.get(&(coach, category.clone())).copied()
    }

    fn transport_rate(&self) -> Option<Money> {
        self.transport
    }
}
