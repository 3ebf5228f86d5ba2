//! Periodic ledger/booking reconciliation.
//!
//! A check-in that commits its consumption but loses its status write
//! (crash, timeout) leaves an orphaned entry the normal flow can no
//! longer see. This check replays the full consumption log against the
//! booking store and reports every divergence. Findings are logged and
//! returned for manual repair, never auto-corrected, since silently
//! patching a financial ledger would mask real bugs.

use credit_ledger_core::booking::{BookingStatus, BookingStore};
use credit_ledger_core::error::{BookingError, LedgerError};
use credit_ledger_core::ledger::LedgerStore;
use credit_ledger_core::types::{BookingId, ConsumptionId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;

/// Errors from the reconciliation scan itself (not findings).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReconcileError {
    /// The ledger read failed.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// The booking store read failed.
    #[error(transparent)]
    Booking(#[from] BookingError),
}

/// One divergence between the ledger and the booking store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Discrepancy {
    /// A live booking-caused draw whose booking is missing or not
    /// `CheckedIn`.
    OrphanedConsumption {
        /// The dangling entry
        consumption: ConsumptionId,
        /// The booking the entry names as its cause
        booking: BookingId,
    },
    /// A `CheckedIn` booking with no live consumption backing it.
    MissingConsumption {
        /// The unbacked booking
        booking: BookingId,
    },
    /// A `CheckedIn` booking whose recorded entry list does not match the
    /// live entries the ledger attributes to it.
    MismatchedRecord {
        /// The booking
        booking: BookingId,
        /// Entry ids the booking recorded at check-in
        recorded: Vec<ConsumptionId>,
        /// Live entry ids the ledger attributes to the booking
        found: Vec<ConsumptionId>,
    },
}

/// Replays the consumption log against the booking store.
///
/// Returns every divergence found; an empty vector means the 1:1
/// correspondence between check-ins and their entries holds.
///
/// # Errors
///
/// Returns [`ReconcileError`] when either store read fails.
pub async fn reconcile(
    ledger: &dyn LedgerStore,
    bookings: &dyn BookingStore,
) -> Result<Vec<Discrepancy>, ReconcileError> {
    let log = ledger.consumption_log().await?;
    let reversed: HashSet<ConsumptionId> = log.iter().filter_map(|e| e.reverses()).collect();

    // Live booking-caused draws, grouped by the booking they name.
    let mut live: BTreeMap<BookingId, Vec<ConsumptionId>> = BTreeMap::new();
    for entry in &log {
        if entry.is_draw() && !reversed.contains(&entry.id) {
            if let Some(booking) = entry.cause.booking_id() {
                live.entry(booking).or_default().push(entry.id);
            }
        }
    }

    let all = bookings.all().await?;
    let by_id: BTreeMap<BookingId, _> = all.iter().map(|b| (b.id, b)).collect();

    let mut findings = Vec::new();

    for (booking_id, found) in &live {
        match by_id.get(booking_id) {
            Some(booking) if booking.status == BookingStatus::CheckedIn => {
                let mut recorded: Vec<ConsumptionId> = booking
                    .consumptions
                    .iter()
                    .copied()
                    .filter(|id| !reversed.contains(id))
                    .collect();
                recorded.sort_unstable();
                let mut found = found.clone();
                found.sort_unstable();
                if recorded != found {
                    findings.push(Discrepancy::MismatchedRecord {
                        booking: *booking_id,
                        recorded,
                        found,
                    });
                }
            }
            // Booking missing entirely, or not checked in: every live
            // entry it caused is orphaned.
            _ => {
                for &consumption in found {
                    findings.push(Discrepancy::OrphanedConsumption {
                        consumption,
                        booking: *booking_id,
                    });
                }
            }
        }
    }

    for booking in &all {
        if booking.status == BookingStatus::CheckedIn && !live.contains_key(&booking.id) {
            findings.push(Discrepancy::MissingConsumption {
                booking: booking.id,
            });
        }
    }

    for finding in &findings {
        tracing::error!(?finding, "ledger/booking reconciliation discrepancy");
    }

    Ok(findings)
}
