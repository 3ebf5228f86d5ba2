//! Booking transitions and their ledger side effects.
//!
//! [`BookingService`] is the **only** writer path that produces
//! booking-caused consumption and reversal entries. No other component
//! may call the allocator with a booking cause: that exclusivity is what
//! keeps the 1:1 correspondence between a check-in and its recorded entry
//! list, which exact reversal depends on.

use crate::allocator::{AllocationError, LotAllocator};
use credit_ledger_core::booking::{
    Booking, BookingStatus, BookingStore, IllegalTransition, TransitionPlan,
};
use credit_ledger_core::entry::ConsumptionCause;
use credit_ledger_core::error::BookingError;
use credit_ledger_core::types::{BookingId, CreditCategory, Credits, OccurrenceId, UserId};
use std::sync::Arc;
use thiserror::Error;

/// Errors from booking registration and transitions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    /// The state machine refused the transition. The booking is
    /// unchanged.
    #[error(transparent)]
    Illegal(#[from] IllegalTransition),

    /// Check-in could not be covered by the user's eligible lots. The
    /// booking stays `Booked`; the caller surfaces this to the operator
    /// (no silent partial check-in).
    #[error("Cannot check in: requested {requested} credit(s), available {available}")]
    InsufficientBalance {
        /// Credits the check-in needed
        requested: Credits,
        /// Credits available at allocation time
        available: Credits,
    },

    /// Allocation failed for a reason other than balance.
    #[error("Allocation failed: {0}")]
    Allocation(AllocationError),

    /// A correction could not reverse the booking's consumption. The
    /// booking stays `CheckedIn`; retrying the cancellation is safe
    /// (reversal is idempotent).
    #[error("Reversal failed for booking {booking}: {source}")]
    ReversalFailed {
        /// The booking being corrected
        booking: BookingId,
        /// What the ledger refused
        source: AllocationError,
    },

    /// The booking store refused the operation.
    #[error(transparent)]
    Store(#[from] BookingError),
}

/// Drives the booking state machine and its ledger side effects.
#[derive(Clone)]
pub struct BookingService {
    bookings: Arc<dyn BookingStore>,
    allocator: LotAllocator,
}

impl BookingService {
    /// Creates a service over the booking store and allocator
    #[must_use]
    pub fn new(bookings: Arc<dyn BookingStore>, allocator: LotAllocator) -> Self {
        Self {
            bookings,
            allocator,
        }
    }

    /// The underlying booking store (read access for reconciliation)
    #[must_use]
    pub fn store(&self) -> &dyn BookingStore {
        self.bookings.as_ref()
    }

    /// Admits a new booking in `Booked` status.
    ///
    /// No credit is consumed until check-in.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError::Store`] when the booking store refuses
    /// the insert.
    pub async fn register(
        &self,
        user: UserId,
        occurrence: OccurrenceId,
        category: CreditCategory,
    ) -> Result<Booking, TransitionError> {
        let booking = Booking::new(BookingId::new(), user, occurrence, category);
        self.bookings.insert(booking.clone()).await?;
        tracing::debug!(booking = %booking.id, user = %user, "booking registered");
        Ok(booking)
    }

    /// Requests a status transition, executing whatever ledger work the
    /// state machine plans for it.
    ///
    /// - `Booked -> CheckedIn` allocates one credit with this booking as
    ///   cause and records the produced entry ids on the booking.
    /// - `CheckedIn -> Cancelled | NoShow` reverses exactly those entries
    ///   before the status write; a reversal failure aborts the whole
    ///   correction.
    /// - `Booked -> Cancelled | NoShow` touches no ledger state.
    ///
    /// # Errors
    ///
    /// - [`TransitionError::Store`] with
    ///   [`BookingError::UnknownBooking`]: no such booking
    /// - [`TransitionError::Illegal`]: the edge is outside the machine
    /// - [`TransitionError::InsufficientBalance`]: check-in failed; the
    ///   booking remains `Booked`
    /// - [`TransitionError::ReversalFailed`]: correction failed; the
    ///   booking remains `CheckedIn`
    pub async fn transition(
        &self,
        id: BookingId,
        requested: BookingStatus,
    ) -> Result<Booking, TransitionError> {
        let booking = self
            .bookings
            .get(id)
            .await?
            .ok_or(BookingError::UnknownBooking(id))?;

        let plan = booking.status.plan_transition(requested)?;
        match plan {
            TransitionPlan::ConsumeCredit => self.check_in(booking).await,
            TransitionPlan::ReverseConsumption => self.correct(booking, requested).await,
            TransitionPlan::StatusOnly => self.update_status(booking, requested).await,
        }
    }

    async fn check_in(&self, mut booking: Booking) -> Result<Booking, TransitionError> {
        let outcome = self
            .allocator
            .allocate(
                booking.user,
                booking.category.clone(),
                Credits::ONE,
                ConsumptionCause::Booking(booking.id),
            )
            .await
            .map_err(|error| match error {
                AllocationError::InsufficientBalance {
                    requested,
                    available,
                } => TransitionError::InsufficientBalance {
                    requested,
                    available,
                },
                other => TransitionError::Allocation(other),
            })?;

        booking.status = BookingStatus::CheckedIn;
        booking.consumptions = outcome.consumption_ids.clone();

        if let Err(error) = self.bookings.update(booking.clone()).await {
            // The consumption must not outlive a failed status write:
            // compensate, then surface the failure. If even the
            // compensation fails, reconciliation will find the orphan.
            tracing::error!(
                booking = %booking.id,
                %error,
                "status write failed after allocation, reversing consumption"
            );
            if let Err(reversal_error) = self.allocator.release(&outcome.consumption_ids).await {
                tracing::error!(
                    booking = %booking.id,
                    error = %reversal_error,
                    "compensating reversal failed, manual reconciliation required"
                );
            }
            return Err(error.into());
        }

        tracing::debug!(
            booking = %booking.id,
            entries = booking.consumptions.len(),
            "checked in"
        );
        Ok(booking)
    }

    async fn correct(
        &self,
        mut booking: Booking,
        requested: BookingStatus,
    ) -> Result<Booking, TransitionError> {
        self.allocator
            .release(&booking.consumptions)
            .await
            .map_err(|source| TransitionError::ReversalFailed {
                booking: booking.id,
                source,
            })?;

        booking.status = requested;
        self.bookings.update(booking.clone()).await?;
        tracing::debug!(booking = %booking.id, status = %requested, "check-in corrected");
        Ok(booking)
    }

    async fn update_status(
        &self,
        mut booking: Booking,
        requested: BookingStatus,
    ) -> Result<Booking, TransitionError> {
        booking.status = requested;
        self.bookings.update(booking.clone()).await?;
        Ok(booking)
    }
}
