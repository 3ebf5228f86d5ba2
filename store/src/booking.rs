//! In-memory booking store.

use credit_ledger_core::booking::{Booking, BookingStatus, BookingStore};
use credit_ledger_core::error::BookingError;
use credit_ledger_core::types::{BookingId, OccurrenceId};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Embedded [`BookingStore`] backed by a map.
///
/// Query results are sorted by booking id so reads are deterministic
/// regardless of map iteration order.
#[derive(Clone, Default)]
pub struct InMemoryBookingStore {
    bookings: Arc<RwLock<HashMap<BookingId, Booking>>>,
}

impl InMemoryBookingStore {
    /// Creates an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl BookingStore for InMemoryBookingStore {
    fn insert(
        &self,
        booking: Booking,
    ) -> Pin<Box<dyn Future<Output = Result<(), BookingError>> + Send + '_>> {
        Box::pin(async move {
            let mut bookings = self.bookings.write().await;
            if bookings.contains_key(&booking.id) {
                return Err(BookingError::DuplicateBooking(booking.id));
            }
            bookings.insert(booking.id, booking);
            Ok(())
        })
    }

    fn get(
        &self,
        id: BookingId,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Booking>, BookingError>> + Send + '_>> {
        Box::pin(async move { Ok(self.bookings.read().await.get(&id).cloned()) })
    }

    fn update(
        &self,
        booking: Booking,
    ) -> Pin<Box<dyn Future<Output = Result<(), BookingError>> + Send + '_>> {
        Box::pin(async move {
            let mut bookings = self.bookings.write().await;
            if !bookings.contains_key(&booking.id) {
                return Err(BookingError::UnknownBooking(booking.id));
            }
            bookings.insert(booking.id, booking);
            Ok(())
        })
    }

    fn attended_for_occurrences(
        &self,
        occurrences: Vec<OccurrenceId>,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Booking>, BookingError>> + Send + '_>> {
        Box::pin(async move {
            let wanted: HashSet<OccurrenceId> = occurrences.into_iter().collect();
            let bookings = self.bookings.read().await;
            let mut attended: Vec<Booking> = bookings
                .values()
                .filter(|b| b.status == BookingStatus::CheckedIn && wanted.contains(&b.occurrence))
                .cloned()
                .collect();
            attended.sort_by_key(|b| b.id);
            Ok(attended)
        })
    }

    fn all(&self) -> Pin<Box<dyn Future<Output = Result<Vec<Booking>, BookingError>> + Send + '_>> {
        Box::pin(async move {
            let bookings = self.bookings.read().await;
            let mut all: Vec<Booking> = bookings.values().cloned().collect();
            all.sort_by_key(|b| b.id);
            Ok(all)
        })
    }
}
