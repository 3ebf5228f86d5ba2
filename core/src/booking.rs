//! Booking lifecycle: status enumeration, the pure transition table and
//! the booking store trait.
//!
//! The state machine itself is a pure function
//! ([`BookingStatus::plan_transition`]) that classifies a requested
//! transition into the ledger work it implies; executing that work against
//! the allocator and the stores is the engine crate's job. Keeping the
//! table pure makes every legal and illegal edge unit-testable without
//! any store.

use crate::error::BookingError;
use crate::types::{BookingId, ConsumptionId, CreditCategory, OccurrenceId, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Status of one scheduled-class booking.
///
/// `Booked` is the only non-terminal state. `CheckedIn` is terminal except
/// for the two staff-correction edges to `Cancelled` and `NoShow`, which
/// reverse the check-in's consumption.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BookingStatus {
    /// Registered for the class; no credit consumed yet
    Booked,
    /// Attendance recorded; one credit consumed
    CheckedIn,
    /// Cancelled before or after attendance
    Cancelled,
    /// Did not attend
    NoShow,
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Booked => "booked",
            Self::CheckedIn => "checked-in",
            Self::Cancelled => "cancelled",
            Self::NoShow => "no-show",
        };
        write!(f, "{name}")
    }
}

/// A transition the state machine refused.
///
/// Surfaced distinctly from conflict errors so operator UIs can present
/// "this action is not allowed" rather than a generic failure.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Illegal booking transition: {from} -> {to}")]
pub struct IllegalTransition {
    /// Status the booking is in
    pub from: BookingStatus,
    /// Status that was requested
    pub to: BookingStatus,
}

/// The ledger work a legal transition implies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransitionPlan {
    /// Draw one credit with the booking as cause (`Booked -> CheckedIn`)
    ConsumeCredit,
    /// Reverse every consumption entry the booking caused
    /// (`CheckedIn -> Cancelled | NoShow`)
    ReverseConsumption,
    /// Update the status only (`Booked -> Cancelled | NoShow`)
    StatusOnly,
}

impl BookingStatus {
    /// Classifies a requested transition.
    ///
    /// # Errors
    ///
    /// Returns [`IllegalTransition`] for every edge outside the machine:
    /// transitions out of `Cancelled` or `NoShow`, transitions into
    /// `Booked`, and self-transitions.
    pub const fn plan_transition(self, to: Self) -> Result<TransitionPlan, IllegalTransition> {
        match (self, to) {
            (Self::Booked, Self::CheckedIn) => Ok(TransitionPlan::ConsumeCredit),
            (Self::Booked, Self::Cancelled | Self::NoShow) => Ok(TransitionPlan::StatusOnly),
            // Staff mis-marked attendance: permitted corrections.
            (Self::CheckedIn, Self::Cancelled | Self::NoShow) => {
                Ok(TransitionPlan::ReverseConsumption)
            }
            (from, to) => Err(IllegalTransition { from, to }),
        }
    }

    /// Checks whether no further transition out of this status is legal
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Cancelled | Self::NoShow)
    }
}

/// One user's registration for one scheduled class occurrence.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    /// Booking identifier
    pub id: BookingId,
    /// Registered user
    pub user: UserId,
    /// The scheduled occurrence
    pub occurrence: OccurrenceId,
    /// Category the check-in will consume from
    pub category: CreditCategory,
    /// Lifecycle status
    pub status: BookingStatus,
    /// Consumption entries this booking caused at check-in. A weak,
    /// non-owning back-reference used only for exact reversal; kept after
    /// reversal for audit.
    pub consumptions: Vec<ConsumptionId>,
}

impl Booking {
    /// Creates a new booking in `Booked` status
    #[must_use]
    pub const fn new(
        id: BookingId,
        user: UserId,
        occurrence: OccurrenceId,
        category: CreditCategory,
    ) -> Self {
        Self {
            id,
            user,
            occurrence,
            category,
            status: BookingStatus::Booked,
            consumptions: Vec::new(),
        }
    }
}

/// Store for bookings.
///
/// Owned by the booking subsystem; the ledger never reaches into it.
/// Returns explicit `Pin<Box<dyn Future>>` for `Arc<dyn BookingStore>`
/// sharing.
pub trait BookingStore: Send + Sync {
    /// Insert a new booking.
    ///
    /// # Errors
    ///
    /// - [`BookingError::DuplicateBooking`]: the id already exists
    /// - [`BookingError::Storage`]: backing storage failed
    fn insert(
        &self,
        booking: Booking,
    ) -> Pin<Box<dyn Future<Output = Result<(), BookingError>> + Send + '_>>;

    /// Fetch a booking by id. Missing bookings yield `Ok(None)`.
    ///
    /// # Errors
    ///
    /// - [`BookingError::Storage`]: backing storage failed
    fn get(
        &self,
        id: BookingId,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Booking>, BookingError>> + Send + '_>>;

    /// Replace a booking (matched by id).
    ///
    /// # Errors
    ///
    /// - [`BookingError::UnknownBooking`]: no booking with this id
    /// - [`BookingError::Storage`]: backing storage failed
    fn update(
        &self,
        booking: Booking,
    ) -> Pin<Box<dyn Future<Output = Result<(), BookingError>> + Send + '_>>;

    /// All `CheckedIn` bookings whose occurrence is in the given set.
    ///
    /// Read path for the statement aggregator.
    ///
    /// # Errors
    ///
    /// - [`BookingError::Storage`]: backing storage failed
    fn attended_for_occurrences(
        &self,
        occurrences: Vec<OccurrenceId>,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Booking>, BookingError>> + Send + '_>>;

    /// Every booking in the store.
    ///
    /// Audit read used by the periodic reconciliation check.
    ///
    /// # Errors
    ///
    /// - [`BookingError::Storage`]: backing storage failed
    fn all(&self) -> Pin<Box<dyn Future<Output = Result<Vec<Booking>, BookingError>> + Send + '_>>;
}
