//! The boundary object hosts integrate against.
//!
//! [`StudioLedger`] wires grant ingestion, booking transitions, balances
//! and statements over explicitly injected stores; every dependency is a
//! constructor parameter, no global container anywhere. The host
//! application maps its own encodings onto these structured values.

use crate::adjustment::AdjustmentService;
use crate::allocator::{AllocationError, AllocationOutcome, LotAllocator};
use crate::booking::{BookingService, TransitionError};
use crate::reconcile::{self, Discrepancy, ReconcileError};
use credit_ledger_core::booking::{Booking, BookingStatus, BookingStore};
use credit_ledger_core::entry::GrantRequest;
use credit_ledger_core::environment::Clock;
use credit_ledger_core::error::LedgerError;
use credit_ledger_core::ledger::LedgerStore;
use credit_ledger_core::rates::RateProvider;
use credit_ledger_core::schedule::OccurrenceDirectory;
use credit_ledger_core::types::{
    AdjustmentRef, BookingId, ConsumptionId, CreditCategory, Credits, LotId, OccurrenceId, UserId,
};
use credit_ledger_projections::{
    Balance, BalanceConfig, BalanceProjector, ExpenseLine, Statement, StatementAggregator,
    StatementError, StatementPeriod,
};
use std::sync::Arc;

/// Facade over the credit ledger for host applications.
///
/// - The package/payment subsystem feeds completed purchases into
///   [`Self::record_purchase`].
/// - The scheduling subsystem registers bookings and requests status
///   changes through [`Self::register_booking`] /
///   [`Self::transition_booking`].
/// - Admin reporting reads [`Self::statement`] and [`Self::balance`];
///   the customer UI reads [`Self::balance`] only.
#[derive(Clone)]
pub struct StudioLedger {
    ledger: Arc<dyn LedgerStore>,
    bookings: BookingService,
    adjustments: AdjustmentService,
    balances: BalanceProjector,
    statements: StatementAggregator,
}

impl StudioLedger {
    /// Wires the facade over the injected stores.
    #[must_use]
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        booking_store: Arc<dyn BookingStore>,
        schedule: Arc<dyn OccurrenceDirectory>,
        clock: Arc<dyn Clock>,
        balance_config: BalanceConfig,
    ) -> Self {
        let allocator = LotAllocator::new(ledger.clone(), clock.clone());
        Self {
            ledger: ledger.clone(),
            bookings: BookingService::new(booking_store.clone(), allocator.clone()),
            adjustments: AdjustmentService::new(allocator),
            balances: BalanceProjector::new(ledger, clock, balance_config),
            statements: StatementAggregator::new(booking_store, schedule),
        }
    }

    /// Ingests a completed-purchase event as a grant lot.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::DuplicateSource`] when the event was
    /// already processed, and other [`LedgerError`]s as the store
    /// reports them.
    pub async fn record_purchase(&self, grant: GrantRequest) -> Result<LotId, LedgerError> {
        self.ledger.record_grant(grant).await
    }

    /// Registers a new booking in `Booked` status.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] when the booking store refuses the
    /// insert.
    pub async fn register_booking(
        &self,
        user: UserId,
        occurrence: OccurrenceId,
        category: CreditCategory,
    ) -> Result<Booking, TransitionError> {
        self.bookings.register(user, occurrence, category).await
    }

    /// Requests a booking status change.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] as the booking service reports it; a
    /// failed transition never leaves partial ledger state behind.
    pub async fn transition_booking(
        &self,
        id: BookingId,
        requested: BookingStatus,
    ) -> Result<Booking, TransitionError> {
        self.bookings.transition(id, requested).await
    }

    /// Applies an administrative adjustment.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError`] exactly as a check-in allocation
    /// would.
    pub async fn apply_adjustment(
        &self,
        user: UserId,
        category: CreditCategory,
        amount: Credits,
        reference: AdjustmentRef,
    ) -> Result<AllocationOutcome, AllocationError> {
        self.adjustments
            .apply(user, category, amount, reference)
            .await
    }

    /// Reverses a prior adjustment's entries.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError`] when the ledger refuses a reversal.
    pub async fn reverse_adjustment(
        &self,
        consumption_ids: &[ConsumptionId],
    ) -> Result<Vec<ConsumptionId>, AllocationError> {
        self.adjustments.reverse(consumption_ids).await
    }

    /// Derives one user's balance in one category.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] when the ledger read fails.
    pub async fn balance(
        &self,
        user: UserId,
        category: CreditCategory,
    ) -> Result<Balance, LedgerError> {
        self.balances.balance(user, category).await
    }

    /// Computes the income/outcome statement for one location and month.
    ///
    /// # Errors
    ///
    /// Returns [`StatementError`] when a store read fails; missing rate
    /// configuration is reported inside the statement, not here.
    pub async fn statement(
        &self,
        period: StatementPeriod,
        rates: &dyn RateProvider,
        custom: Vec<ExpenseLine>,
    ) -> Result<Statement, StatementError> {
        self.statements.statement(period, rates, custom).await
    }

    /// Runs the ledger/booking reconciliation check.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError`] when either store read fails.
    pub async fn reconcile(&self) -> Result<Vec<Discrepancy>, ReconcileError> {
        reconcile::reconcile(self.ledger.as_ref(), self.bookings.store()).await
    }
}
