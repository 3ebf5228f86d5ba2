//! # Credit Ledger Projections
//!
//! The query side of the credit ledger: read models derived on demand
//! from the append-only stores, never persisted and always rebuildable.
//!
//! - [`balance`]: per-user, per-category available credits and
//!   expiring-soon warnings
//! - [`statement`]: monthly income/outcome statements per location,
//!   reconciling exactly with the booking stream the ledger consumed
//!   credits for
//!
//! Both projections are pure functions of their inputs and may run
//! concurrently with any writer under snapshot reads; eventual
//! consistency of reporting is acceptable, whereas allocation itself
//! (in `credit-ledger-engine`) requires strict serialization.

pub mod balance;
pub mod statement;

pub use balance::{Balance, BalanceConfig, BalanceProjector, ExpiringLot};
pub use statement::{
    CoachLine, ExpenseLine, IncomeLine, RateWarning, Statement, StatementAggregator,
    StatementError, StatementPeriod, TransportLine,
};
