//! Administrative draw-downs.
//!
//! Back-office corrections outside the booking flow: compensating a
//! mistaken grant, settling a manually-handled class, and similar. These
//! use the same FEFO allocation and the same append-only entries as
//! check-ins, with [`ConsumptionCause::Adjustment`] as the cause, never
//! a booking cause, which belongs exclusively to the booking service.

use crate::allocator::{AllocationError, AllocationOutcome, LotAllocator};
use credit_ledger_core::entry::ConsumptionCause;
use credit_ledger_core::types::{AdjustmentRef, ConsumptionId, CreditCategory, Credits, UserId};

/// Applies and reverses administrative adjustments.
#[derive(Clone)]
pub struct AdjustmentService {
    allocator: LotAllocator,
}

impl AdjustmentService {
    /// Creates a service over the allocator
    #[must_use]
    pub const fn new(allocator: LotAllocator) -> Self {
        Self { allocator }
    }

    /// Draws `amount` credits from the user's lots as an administrative
    /// adjustment.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError`] exactly as a check-in allocation
    /// would; nothing is written on failure.
    pub async fn apply(
        &self,
        user: UserId,
        category: CreditCategory,
        amount: Credits,
        reference: AdjustmentRef,
    ) -> Result<AllocationOutcome, AllocationError> {
        tracing::debug!(user = %user, %category, %amount, reference = %reference, "applying adjustment");
        self.allocator
            .allocate(user, category, amount, ConsumptionCause::Adjustment(reference))
            .await
    }

    /// Reverses the entries a prior adjustment produced.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError`] when the ledger refuses a reversal for
    /// any reason other than it already existing.
    pub async fn reverse(
        &self,
        consumption_ids: &[ConsumptionId],
    ) -> Result<Vec<ConsumptionId>, AllocationError> {
        self.allocator.release(consumption_ids).await
    }
}
