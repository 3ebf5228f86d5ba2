//! # Credit Ledger Engine
//!
//! The write side of the class-credit ledger:
//!
//! - [`allocator`]: First-Expiring-First-Out lot allocation as one atomic
//!   draw-down, serialized per user+category by an optimistic
//!   compare-and-swap loop
//! - [`booking`]: the booking state-machine driver, the only writer path
//!   producing booking-caused consumption and reversal entries
//! - [`adjustment`]: administrative draw-downs with the same guarantees
//! - [`reconcile`]: the periodic orphan/mismatch check
//! - [`service`]: the [`service::StudioLedger`] facade hosts integrate
//!   against
//!
//! ## Example
//!
//! ```ignore
//! use credit_ledger_engine::service::StudioLedger;
//!
//! let ledger = StudioLedger::new(ledger_store, booking_store, schedule, clock, config);
//! ledger.record_purchase(purchase_event).await?;
//! let booking = ledger.register_booking(user, occurrence, category).await?;
//! ledger.transition_booking(booking.id, BookingStatus::CheckedIn).await?;
//! ```

pub mod adjustment;
pub mod allocator;
pub mod booking;
pub mod reconcile;
pub mod service;

pub use adjustment::AdjustmentService;
pub use allocator::{AllocationError, AllocationOutcome, AllocatorConfig, LotAllocator, LotDraw};
pub use booking::{BookingService, TransitionError};
pub use reconcile::{reconcile, Discrepancy, ReconcileError};
pub use service::StudioLedger;
