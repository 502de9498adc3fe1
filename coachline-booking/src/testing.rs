use crate::hold::HoldRequest;
use crate::{BookingContext, EventBus};
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use coachline_catalog::{NewTrip, SeatMapDefinition, Trip};
use coachline_core::booking::{Booking, BookingGuard, Passenger};
use coachline_core::clock::ManualClock;
use coachline_core::repository::{BookingRepository, StoreError, TripRepository};
use coachline_store::MemoryStore;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub(crate) fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 11, 2, 7, 0, 0).unwrap()
}

pub(crate) struct Harness {
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
    pub ctx: BookingContext,
}

impl Harness {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(start()));
        let ctx = BookingContext::new(store.clone(), store.clone(), clock.clone(), EventBus::default());
        Self { store, clock, ctx }
    }

    /// Same store, but booking writes go through a [`ScriptedBookings`].
    pub fn with_scripted_bookings() -> (Self, Arc<ScriptedBookings>) {
        let mut harness = Self::new();
        let bookings = Arc::new(ScriptedBookings::new(harness.store.clone()));
        harness.ctx.bookings = bookings.clone() as Arc<dyn BookingRepository>;
        (harness, bookings)
    }

    pub async fn trip(&self, seats: u32) -> Trip {
        let departure = start() + Duration::days(2);
        let trip = Trip::provision(
            NewTrip {
                origin: "Ben xe Mien Dong".to_string(),
                destination: "Nha Trang".to_string(),
                departure_time: departure,
                expected_arrival_time: departure + Duration::hours(9),
                price_amount: 280_000,
                currency: "VND".to_string(),
                company_id: None,
                vehicle_id: None,
                seat_map: SeatMapDefinition::with_total_seats(seats),
            },
            start(),
        )
        .unwrap();
        self.store.insert_trip(&trip).await.unwrap();
        trip
    }
}

pub(crate) fn hold_request(trip: &Trip, customer: &str, seats: &[&str]) -> HoldRequest {
    HoldRequest {
        trip_id: trip.id,
        customer_id: customer.to_string(),
        seat_numbers: seats.iter().map(|s| s.to_string()).collect(),
        passengers: seats
            .iter()
            .enumerate()
            .map(|(i, seat)| Passenger::new(format!("Passenger {}", i + 1), format!("09120000{:02}", i), *seat))
            .collect(),
        hold_duration: Duration::minutes(15),
    }
}

/// Booking storage whose next conditional writes can fail, or be beaten by
/// another writer.
pub(crate) struct ScriptedBookings {
    inner: Arc<MemoryStore>,
    failures: AtomicUsize,
    overtake: Mutex<Option<Booking>>,
}

impl ScriptedBookings {
    fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            failures: AtomicUsize::new(0),
            overtake: Mutex::new(None),
        }
    }

    pub fn fail_next(&self, writes: usize) {
        self.failures.store(writes, Ordering::SeqCst);
    }

    /// Store `booking` just before the next conditional write is evaluated.
    pub fn overtake_with(&self, booking: Booking) {
        *self.overtake.lock().unwrap() = Some(booking);
    }
}

#[async_trait]
impl BookingRepository for ScriptedBookings {
    async fn insert_booking(&self, booking: &Booking) -> Result<(), StoreError> {
        self.inner.insert_booking(booking).await
    }

    async fn get_booking(&self, id: uuid::Uuid) -> Result<Option<Booking>, StoreError> {
        self.inner.get_booking(id).await
    }

    async fn list_customer_bookings(&self, customer_id: &str) -> Result<Vec<Booking>, StoreError> {
        self.inner.list_customer_bookings(customer_id).await
    }

    async fn list_expired_holds(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<Booking>, StoreError> {
        self.inner.list_expired_holds(now, limit).await
    }

    async fn replace_if(&self, guard: &BookingGuard, next: &Booking) -> Result<bool, StoreError> {
        let failed = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(StoreError::Unavailable("connection reset by peer".to_string()));
        }

        let overtaking = self.overtake.lock().unwrap().take();
        if let Some(other) = overtaking {
            self.inner.replace_if(guard, &other).await?;
        }
        self.inner.replace_if(guard, next).await
    }
}
