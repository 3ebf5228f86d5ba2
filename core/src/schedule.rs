//! Boundary to the scheduling subsystem.
//!
//! The ledger never owns class occurrences; it consumes them through
//! [`OccurrenceDirectory`] when the statement aggregator needs to know
//! which classes ran at a location, who coached them and when.

use crate::error::ScheduleError;
use crate::types::{CoachId, CreditCategory, LocationId, OccurrenceId, Timestamp};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;

/// One scheduled class occurrence, as published by the scheduling
/// subsystem.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassOccurrence {
    /// Occurrence identifier
    pub id: OccurrenceId,
    /// Where the class runs
    pub location: LocationId,
    /// Who coaches it
    pub coach: CoachId,
    /// Credit category the class belongs to
    pub category: CreditCategory,
    /// Scheduled start time
    pub starts_at: Timestamp,
}

/// Read-only view of the schedule owned by the scheduling subsystem.
pub trait OccurrenceDirectory: Send + Sync {
    /// Occurrences at a location with `starts_at` in `[from, to)`.
    ///
    /// # Errors
    ///
    /// - [`ScheduleError::Storage`]: backing storage failed
    fn occurrences_at(
        &self,
        location: LocationId,
        from: Timestamp,
        to: Timestamp,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<ClassOccurrence>, ScheduleError>> + Send + '_>>;
}
