//! Monthly income/outcome statement.
//!
//! Reconstructs, for one location and calendar month, the studio's income
//! and the coach payouts from the attended bookings, the same stream the
//! ledger consumed credits for. The aggregator is a pure function of its
//! inputs: grouping uses ordered maps and every line vector is sorted, so
//! repeated calls over identical inputs are byte-identical. Nothing is
//! persisted; the statement is recomputed on demand.

use chrono::{TimeZone, Utc};
use credit_ledger_core::booking::BookingStore;
use credit_ledger_core::error::{BookingError, ScheduleError};
use credit_ledger_core::rates::RateProvider;
use credit_ledger_core::schedule::OccurrenceDirectory;
use credit_ledger_core::types::{CoachId, CreditCategory, LocationId, Money, OccurrenceId, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use thiserror::Error;

/// Errors from statement aggregation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StatementError {
    /// The month number was outside 1..=12.
    #[error("Invalid statement month: {0}")]
    InvalidMonth(u32),

    /// The scheduling subsystem read failed.
    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    /// The booking store read failed.
    #[error(transparent)]
    Booking(#[from] BookingError),
}

/// A (location, calendar month) pair identifying one statement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatementPeriod {
    /// The studio location
    pub location: LocationId,
    /// Calendar year
    pub year: i32,
    /// Calendar month, 1..=12
    pub month: u32,
}

impl StatementPeriod {
    /// Creates a period.
    ///
    /// # Errors
    ///
    /// Returns [`StatementError::InvalidMonth`] when `month` is outside
    /// `1..=12`.
    pub fn new(location: LocationId, year: i32, month: u32) -> Result<Self, StatementError> {
        if !(1..=12).contains(&month) {
            return Err(StatementError::InvalidMonth(month));
        }
        Ok(Self {
            location,
            year,
            month,
        })
    }

    /// The half-open UTC time range `[start of month, start of next month)`
    #[must_use]
    pub fn range(&self) -> (Timestamp, Timestamp) {
        // Month is validated at construction, so `single()` only fails for
        // years outside chrono's representable range.
        let start = Utc
            .with_ymd_and_hms(self.year, self.month, 1, 0, 0, 0)
            .single()
            .unwrap_or(chrono::DateTime::UNIX_EPOCH);
        let (next_year, next_month) = if self.month == 12 {
            (self.year + 1, 1)
        } else {
            (self.year, self.month + 1)
        };
        let end = Utc
            .with_ymd_and_hms(next_year, next_month, 1, 0, 0, 0)
            .single()
            .unwrap_or(chrono::DateTime::UNIX_EPOCH);
        (start, end)
    }
}

/// A rate the operator has not configured.
///
/// Surfaced per group so a statement can still be produced with explicit
/// gaps flagged instead of failing whole.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RateWarning {
    /// No income rate configured for a category with attendance
    MissingIncomeRate {
        /// The unconfigured category
        category: CreditCategory,
    },
    /// No payout rate configured for a coach+category with attendance
    MissingCoachRate {
        /// The coach
        coach: CoachId,
        /// The unconfigured category
        category: CreditCategory,
    },
    /// No flat transport rate configured
    MissingTransportRate,
}

/// Income booked for one category.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomeLine {
    /// Credit category
    pub category: CreditCategory,
    /// Attended bookings in the period
    pub attended: u32,
    /// Configured per-session rate, if any
    pub rate: Option<Money>,
    /// `attended × rate` (zero when the rate is missing)
    pub amount: Money,
}

/// Session payout for one coach in one category.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoachLine {
    /// The coach
    pub coach: CoachId,
    /// Credit category
    pub category: CreditCategory,
    /// Attended bookings the coach taught in the period
    pub attended: u32,
    /// Configured per-session rate, if any
    pub rate: Option<Money>,
    /// `attended × rate` (zero when the rate is missing)
    pub amount: Money,
}

/// Transport payout for one coach.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportLine {
    /// The coach
    pub coach: CoachId,
    /// Distinct occurrences the coach taught in the period
    pub occurrences: u32,
    /// `occurrences × flat transport rate` (zero when unconfigured)
    pub amount: Money,
}

/// Operator-entered ad hoc expense for the period. External input, not
/// ledger-derived.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseLine {
    /// Free-form label
    pub label: String,
    /// Expense amount
    pub amount: Money,
}

/// Computed income/outcome statement for one location and month.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statement {
    /// The period this statement covers
    pub period: StatementPeriod,
    /// Income per category, ordered by category
    pub income: Vec<IncomeLine>,
    /// Session payouts per coach and category, ordered by coach then
    /// category
    pub coach_sessions: Vec<CoachLine>,
    /// Transport payouts per coach, ordered by coach
    pub transport: Vec<TransportLine>,
    /// Operator-entered expenses, in input order
    pub custom: Vec<ExpenseLine>,
    /// Σ income lines
    pub income_total: Money,
    /// Σ coach session and transport lines
    pub coach_total: Money,
    /// Σ custom expenses
    pub custom_total: Money,
    /// `income_total − (coach_total + custom_total)`
    pub net: Money,
    /// Unconfigured rates encountered, deduplicated and ordered
    pub warnings: Vec<RateWarning>,
}

/// Replays attended bookings into a [`Statement`].
#[derive(Clone)]
pub struct StatementAggregator {
    bookings: Arc<dyn BookingStore>,
    schedule: Arc<dyn OccurrenceDirectory>,
}

impl StatementAggregator {
    /// Creates an aggregator over the booking store and schedule
    #[must_use]
    pub fn new(bookings: Arc<dyn BookingStore>, schedule: Arc<dyn OccurrenceDirectory>) -> Self {
        Self { bookings, schedule }
    }

    /// Computes the statement for one period.
    ///
    /// Single pass over the period's attended bookings; rate lookups
    /// happen once per group, not per booking. Missing rates become
    /// [`RateWarning`]s, never failures.
    ///
    /// # Errors
    ///
    /// Returns [`StatementError`] when a store read fails.
    pub async fn statement(
        &self,
        period: StatementPeriod,
        rates: &dyn RateProvider,
        custom: Vec<ExpenseLine>,
    ) -> Result<Statement, StatementError> {
        let (from, to) = period.range();
        let occurrences = self
            .schedule
            .occurrences_at(period.location, from, to)
            .await?;
        let occurrence_index: HashMap<OccurrenceId, (CoachId, CreditCategory)> = occurrences
            .iter()
            .map(|occ| (occ.id, (occ.coach, occ.category.clone())))
            .collect();

        let attended = self
            .bookings
            .attended_for_occurrences(occurrences.iter().map(|occ| occ.id).collect())
            .await?;

        // One pass: group by category, by coach+category, and collect the
        // distinct occurrences each coach taught.
        let mut by_category: BTreeMap<CreditCategory, u32> = BTreeMap::new();
        let mut by_coach: BTreeMap<(CoachId, CreditCategory), u32> = BTreeMap::new();
        let mut taught: BTreeMap<CoachId, BTreeSet<OccurrenceId>> = BTreeMap::new();
        for booking in &attended {
            let Some((coach, category)) = occurrence_index.get(&booking.occurrence) else {
                continue;
            };
            *by_category.entry(category.clone()).or_default() += 1;
            *by_coach.entry((*coach, category.clone())).or_default() += 1;
            taught.entry(*coach).or_default().insert(booking.occurrence);
        }

        let mut warnings: BTreeSet<RateWarning> = BTreeSet::new();

        let income: Vec<IncomeLine> = by_category
            .into_iter()
            .map(|(category, attended)| {
                let rate = rates.income_rate(&category);
                if rate.is_none() {
                    warnings.insert(RateWarning::MissingIncomeRate {
                        category: category.clone(),
                    });
                }
                IncomeLine {
                    category,
                    attended,
                    rate,
                    amount: rate.unwrap_or(Money::ZERO).times(attended),
                }
            })
            .collect();

        let coach_sessions: Vec<CoachLine> = by_coach
            .into_iter()
            .map(|((coach, category), attended)| {
                let rate = rates.coach_rate(coach, &category);
                if rate.is_none() {
                    warnings.insert(RateWarning::MissingCoachRate {
                        coach,
                        category: category.clone(),
                    });
                }
                CoachLine {
                    coach,
                    category,
                    attended,
                    rate,
                    amount: rate.unwrap_or(Money::ZERO).times(attended),
                }
            })
            .collect();

        let transport_rate = rates.transport_rate();
        if transport_rate.is_none() && !taught.is_empty() {
            warnings.insert(RateWarning::MissingTransportRate);
        }
        let transport: Vec<TransportLine> = taught
            .into_iter()
            .map(|(coach, occurrences)| {
                #[allow(clippy::cast_possible_truncation)]
                let count = occurrences.len() as u32;
                TransportLine {
                    coach,
                    occurrences: count,
                    amount: transport_rate.unwrap_or(Money::ZERO).times(count),
                }
            })
            .collect();

        let income_total: Money = income.iter().map(|line| line.amount).sum();
        let coach_total: Money = coach_sessions
            .iter()
            .map(|line| line.amount)
            .chain(transport.iter().map(|line| line.amount))
            .sum();
        let custom_total: Money = custom.iter().map(|line| line.amount).sum();
        let net = income_total - (coach_total + custom_total);

        if !warnings.is_empty() {
            tracing::warn!(
                year = period.year,
                month = period.month,
                missing = warnings.len(),
                "statement computed with missing rate configuration"
            );
        }

        Ok(Statement {
            period,
            income,
            coach_sessions,
            transport,
            custom,
            income_total,
            coach_total,
            custom_total,
            net,
            warnings: warnings.into_iter().collect(),
        })
    }
}
