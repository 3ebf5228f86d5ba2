//! In-memory occurrence directory.
//!
//! Stands in for the scheduling subsystem in tests and embedded
//! deployments.

use credit_ledger_core::error::ScheduleError;
use credit_ledger_core::schedule::{ClassOccurrence, OccurrenceDirectory};
use credit_ledger_core::types::{LocationId, Timestamp};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Embedded [`OccurrenceDirectory`] seeded through [`Self::insert`].
#[derive(Clone, Default)]
pub struct InMemoryOccurrenceDirectory {
    occurrences: Arc<RwLock<Vec<ClassOccurrence>>>,
}

impl InMemoryOccurrenceDirectory {
    /// Creates an empty directory
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds one occurrence
    pub async fn insert(&self, occurrence: ClassOccurrence) {
        self.occurrences.write().await.push(occurrence);
    }
}

impl OccurrenceDirectory for InMemoryOccurrenceDirectory {
    fn occurrences_at(
        &self,
        location: LocationId,
        from: Timestamp,
        to: Timestamp,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<ClassOccurrence>, ScheduleError>> + Send + '_>>
    {
        Box::pin(async move {
            let occurrences = self.occurrences.read().await;
            let mut found: Vec<ClassOccurrence> = occurrences
                .iter()
                .filter(|occ| {
                    occ.location == location && occ.starts_at >= from && occ.starts_at < to
                })
                .cloned()
                .collect();
            found.sort_by_key(|occ| (occ.starts_at, occ.id));
            Ok(found)
        })
    }
}
