//! Rate configuration boundary.
//!
//! Income, coach payout and transport rates are operator configuration
//! owned outside this core; the statement aggregator looks them up once
//! per group through this trait. Lookups are synchronous: rates are
//! small tables, not I/O.

use crate::types::{CoachId, CreditCategory, Money};

/// External lookup table for statement rates.
///
/// Every method returns `None` when the operator has not configured the
/// rate; the aggregator turns that into a per-group warning rather than
/// failing the whole statement.
pub trait RateProvider: Send + Sync {
    /// Income the studio books per attended session in a category
    fn income_rate(&self, category: &CreditCategory) -> Option<Money>;

    /// Payout a coach earns per attended session in a category
    fn coach_rate(&self, coach: CoachId, category: &CreditCategory) -> Option<Money>;

    /// Flat payout per distinct occurrence a coach taught
    fn transport_rate(&self) -> Option<Money>;
}
