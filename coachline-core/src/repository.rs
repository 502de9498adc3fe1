use crate::booking::{Booking, BookingGuard};
use crate::search::TripSearchQuery;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use coachline_catalog::{InventoryError, SeatTransition, Trip};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Trip not found: {0}")]
    TripNotFound(Uuid),

    #[error(transparent)]
    Inventory(#[from] InventoryError),

    #[error("Booking already exists: {0}")]
    DuplicateBooking(Uuid),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Corrupt record: {0}")]
    Decode(String),
}

impl StoreError {
    /// True when a seat transition was rejected because a seat was not in the
    /// expected status (a lost race, not a fault).
    pub fn is_precondition_failure(&self) -> bool {
        matches!(self, StoreError::Inventory(InventoryError::PreconditionFailed { .. }))
    }
}

/// Trip records and the per-trip seat inventory.
#[async_trait]
pub trait TripRepository: Send + Sync {
    async fn insert_trip(&self, trip: &Trip) -> Result<(), StoreError>;

    async fn get_trip(&self, id: Uuid) -> Result<Option<Trip>, StoreError>;

    /// Scheduled trips matching the query, with their current seats.
    async fn search_trips(&self, query: &TripSearchQuery) -> Result<Vec<Trip>, StoreError>;

    /// The single seat mutation primitive.
    ///
    /// Evaluated atomically against the authoritative seat state of one trip:
    /// either every seat satisfies the transition's precondition and all move,
    /// or nothing changes and `InventoryError::UnknownSeat` /
    /// `InventoryError::PreconditionFailed` is returned. Bumps the trip's
    /// `updated_at` on success.
    async fn apply_seat_transition(
        &self,
        trip_id: Uuid,
        transition: &SeatTransition,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError>;
}

/// Booking records. Rows are never deleted.
#[async_trait]
pub trait BookingRepository: Send + Sync {
    async fn insert_booking(&self, booking: &Booking) -> Result<(), StoreError>;

    async fn get_booking(&self, id: Uuid) -> Result<Option<Booking>, StoreError>;

    async fn list_customer_bookings(&self, customer_id: &str) -> Result<Vec<Booking>, StoreError>;

    /// Held bookings whose `held_until` is at or before `now`, oldest first.
    async fn list_expired_holds(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<Booking>, StoreError>;

    /// Overwrite the booking only if it still matches `guard`.
    ///
    /// Returns `Ok(false)` when another writer got there first.
    async fn replace_if(&self, guard: &BookingGuard, next: &Booking) -> Result<bool, StoreError>;
}
