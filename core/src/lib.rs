//! # Credit Ledger Core
//!
//! Domain types, store traits and the booking state machine for the
//! class-credit ledger.
//!
//! ## Model
//!
//! Credits are purchased in discrete **lots**, each with its own expiry.
//! The ledger is append-only: a lot's remaining balance is always derived
//! from the grant and the immutable consumption entries referencing it,
//! never stored. Attending a class consumes one credit from the
//! soonest-to-expire lot; cancelling an attended booking appends an
//! equal-and-opposite reversal instead of deleting anything.
//!
//! ## Crate layout
//!
//! - [`types`]: identifier newtypes, [`types::Credits`], [`types::Money`]
//! - [`entry`]: grant lots and consumption entries
//! - [`ledger`]: the append-only [`ledger::LedgerStore`] trait and its
//!   optimistic-concurrency [`ledger::Version`]
//! - [`booking`]: the booking status machine and
//!   [`booking::BookingStore`] trait
//! - [`schedule`], [`rates`]: boundaries to the scheduling subsystem and
//!   the operator's rate configuration
//! - [`environment`]: the injected [`environment::Clock`]
//!
//! The write side (allocation, booking transitions) lives in
//! `credit-ledger-engine`; the read side (balances, statements) in
//! `credit-ledger-projections`; embedded store implementations in
//! `credit-ledger-store`.

pub mod booking;
pub mod entry;
pub mod environment;
pub mod error;
pub mod ledger;
pub mod rates;
pub mod schedule;
pub mod types;

pub use chrono::{DateTime, Utc};
