use async_trait::async_trait;
use chrono::{DateTime, Utc};
use coachline_catalog::{SeatTransition, Trip};
use coachline_core::booking::{Booking, BookingGuard, BookingStatus};
use coachline_core::repository::{BookingRepository, StoreError, TripRepository};
use coachline_core::search::TripSearchQuery;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Single-process storage engine.
///
/// Each trip sits behind its own mutex, so seat transitions on different
/// trips never contend. The trip table itself is only touched long enough to
/// clone the trip's `Arc`.
#[derive(Default)]
pub struct MemoryStore {
    trips: DashMap<Uuid, Arc<Mutex<Trip>>>,
    bookings: DashMap<Uuid, Booking>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn trip_cell(&self, id: Uuid) -> Option<Arc<Mutex<Trip>>> {
        self.trips.get(&id).map(|entry| Arc::clone(entry.value()))
    }
}

#[async_trait]
impl TripRepository for MemoryStore {
    async fn insert_trip(&self, trip: &Trip) -> Result<(), StoreError> {
        self.trips.insert(trip.id, Arc::new(Mutex::new(trip.clone())));
        Ok(())
    }

    async fn get_trip(&self, id: Uuid) -> Result<Option<Trip>, StoreError> {
        Ok(self.trip_cell(id).map(|cell| cell.lock().clone()))
    }

    async fn search_trips(&self, query: &TripSearchQuery) -> Result<Vec<Trip>, StoreError> {
        let cells: Vec<Arc<Mutex<Trip>>> = self.trips.iter().map(|e| Arc::clone(e.value())).collect();

        let mut trips: Vec<Trip> = cells
            .iter()
            .filter_map(|cell| {
                let trip = cell.lock();
                query.matches(&trip).then(|| trip.clone())
            })
            .collect();
        trips.sort_by_key(|t| t.departure_time);
        Ok(trips)
    }

    async fn apply_seat_transition(
        &self,
        trip_id: Uuid,
        transition: &SeatTransition,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let cell = self.trip_cell(trip_id).ok_or(StoreError::TripNotFound(trip_id))?;
        let mut trip = cell.lock();
        trip.apply_transition(transition, now)?;
        debug!(
            "Trip {}: seats {:?} {} -> {}",
            trip_id, transition.seat_numbers, transition.expected, transition.target
        );
        Ok(())
    }
}

#[async_trait]
impl BookingRepository for MemoryStore {
    async fn insert_booking(&self, booking: &Booking) -> Result<(), StoreError> {
        match self.bookings.entry(booking.id) {
            Entry::Occupied(_) => Err(StoreError::DuplicateBooking(booking.id)),
            Entry::Vacant(slot) => {
                slot.insert(booking.clone());
                Ok(())
            }
        }
    }

    async fn get_booking(&self, id: Uuid) -> Result<Option<Booking>, StoreError> {
        Ok(self.bookings.get(&id).map(|b| b.value().clone()))
    }

    async fn list_customer_bookings(&self, customer_id: &str) -> Result<Vec<Booking>, StoreError> {
        let mut bookings: Vec<Booking> = self
            .bookings
            .iter()
            .filter(|b| b.customer_id == customer_id)
            .map(|b| b.value().clone())
            .collect();
        bookings.sort_by_key(|b| b.created_at);
        Ok(bookings)
    }

    async fn list_expired_holds(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<Booking>, StoreError> {
        let mut expired: Vec<Booking> = self
            .bookings
            .iter()
            .filter(|b| b.status == BookingStatus::Held && b.held_until.is_some_and(|t| t <= now))
            .map(|b| b.value().clone())
            .collect();
        expired.sort_by_key(|b| b.held_until);
        expired.truncate(limit);
        Ok(expired)
    }

    async fn replace_if(&self, guard: &BookingGuard, next: &Booking) -> Result<bool, StoreError> {
        // get_mut holds the shard write lock for the compare and the swap
        let Some(mut current) = self.bookings.get_mut(&guard.booking_id) else {
            return Ok(false);
        };
        if current.status != guard.status || current.held_until != guard.held_until {
            return Ok(false);
        }
        *current = next.clone();
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use coachline_catalog::{InventoryError, NewTrip, SeatMapDefinition, SeatStatus};
    use coachline_core::booking::Passenger;

    fn sample_trip() -> Trip {
        let departure = Utc::now() + Duration::days(3);
        Trip::provision(
            NewTrip {
                origin: "Sai Gon".to_string(),
                destination: "Da Lat".to_string(),
                departure_time: departure,
                expected_arrival_time: departure + Duration::hours(7),
                price_amount: 320_000,
                currency: "VND".to_string(),
                company_id: None,
                vehicle_id: None,
                seat_map: SeatMapDefinition::with_total_seats(6),
            },
            Utc::now(),
        )
        .unwrap()
    }

    fn held_booking(trip_id: Uuid, held_until: DateTime<Utc>) -> Booking {
        let now = Utc::now();
        let mut booking = Booking::pending(
            Uuid::new_v4(),
            "customer-1".to_string(),
            trip_id,
            vec![Passenger::new("Le Van C", "0903000003", "S1")],
            320_000,
            "VND".to_string(),
            now,
        );
        booking.place_on_hold(held_until, now).unwrap();
        booking
    }

    #[tokio::test]
    async fn test_seat_transition_round_trip() {
        let store = MemoryStore::new();
        let trip = sample_trip();
        store.insert_trip(&trip).await.unwrap();

        let booking_id = Uuid::new_v4();
        let hold = SeatTransition::hold(vec!["S1".to_string(), "S2".to_string()], booking_id);
        store.apply_seat_transition(trip.id, &hold, Utc::now()).await.unwrap();

        let stored = store.get_trip(trip.id).await.unwrap().unwrap();
        assert_eq!(stored.seat("S1").unwrap().status, SeatStatus::Held);
        assert_eq!(stored.available_seat_count(), 4);

        let again = store.apply_seat_transition(trip.id, &hold, Utc::now()).await.unwrap_err();
        assert!(again.is_precondition_failure());
    }

    #[tokio::test]
    async fn test_unknown_trip_and_seat() {
        let store = MemoryStore::new();
        let trip = sample_trip();
        store.insert_trip(&trip).await.unwrap();

        let hold = SeatTransition::hold(vec!["S99".to_string()], Uuid::new_v4());
        let err = store.apply_seat_transition(trip.id, &hold, Utc::now()).await.unwrap_err();
        assert!(matches!(err, StoreError::Inventory(InventoryError::UnknownSeat(_))));

        let missing = Uuid::new_v4();
        let err = store.apply_seat_transition(missing, &hold, Utc::now()).await.unwrap_err();
        assert!(matches!(err, StoreError::TripNotFound(id) if id == missing));
    }

    #[tokio::test]
    async fn test_replace_if_is_conditional() {
        let store = MemoryStore::new();
        let booking = held_booking(Uuid::new_v4(), Utc::now() + Duration::minutes(5));
        store.insert_booking(&booking).await.unwrap();
        assert!(matches!(store.insert_booking(&booking).await, Err(StoreError::DuplicateBooking(_))));

        let guard = booking.guard();
        let mut expired = booking.clone();
        expired.expire(Utc::now()).unwrap();

        assert!(store.replace_if(&guard, &expired).await.unwrap());
        // second writer with the same stale guard loses
        assert!(!store.replace_if(&guard, &expired).await.unwrap());

        let stored = store.get_booking(booking.id).await.unwrap().unwrap();
        assert_eq!(stored.status, BookingStatus::Expired);
    }

    #[tokio::test]
    async fn test_list_expired_holds() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let overdue = held_booking(Uuid::new_v4(), now - Duration::seconds(10));
        let due_now = held_booking(Uuid::new_v4(), now);
        let later = held_booking(Uuid::new_v4(), now + Duration::minutes(1));
        for b in [&later, &due_now, &overdue] {
            store.insert_booking(b).await.unwrap();
        }

        let expired = store.list_expired_holds(now, 10).await.unwrap();
        let ids: Vec<Uuid> = expired.iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![overdue.id, due_now.id]);

        assert_eq!(store.list_expired_holds(now, 1).await.unwrap().len(), 1);
    }
}
