pub mod state;

use chrono::Duration;
use coachline_booking::{
    BookingContext, BookingLifecycle, EventBus, ExpirySweeper, HoldManager, HoldReceipt, HoldRequest,
    PaymentConfirmation, TicketIssuer, TripReader,
};
use coachline_catalog::{NewTrip, Trip};
use coachline_core::booking::{Booking, CancellationReason, Passenger};
use coachline_core::clock::{Clock, SystemClock};
use coachline_core::identity::{Capability, Principal};
use coachline_core::search::{TripAvailability, TripSearchQuery, TripSummary};
use coachline_core::{CoreResult, ReservationError};
use coachline_shared::BookingEvent;
use coachline_store::{Config, ReservationRules};
use serde::{Deserialize, Serialize};
use state::{StartupError, Storage};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;
use uuid::Uuid;

pub use coachline_booking::SweepReport;

/// Seats and passengers a principal wants to hold on one trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceHold {
    pub trip_id: Uuid,
    pub seat_numbers: Vec<String>,
    pub passengers: Vec<Passenger>,
    /// Falls back to the configured hold duration.
    #[serde(default)]
    pub hold_seconds: Option<i64>,
}

/// Operations exposed to the outer API layer.
///
/// Every mutating call takes the `Principal` resolved by the authentication
/// collaborator and checks its capabilities before touching the core.
pub struct ReservationService {
    ctx: BookingContext,
    rules: ReservationRules,
    holds: HoldManager,
    lifecycle: BookingLifecycle,
    reader: TripReader,
    sweeper: Arc<ExpirySweeper>,
}

impl ReservationService {
    pub fn new(storage: Storage, clock: Arc<dyn Clock>, rules: ReservationRules) -> Self {
        let ctx = BookingContext::new(storage.trips, storage.bookings, clock, EventBus::default());
        Self {
            holds: HoldManager::new(ctx.clone()),
            lifecycle: BookingLifecycle::new(ctx.clone(), TicketIssuer::new(rules.ticket_prefix.clone())),
            reader: TripReader::new(ctx.trips.clone()),
            sweeper: Arc::new(ExpirySweeper::new(ctx.clone(), rules.sweep_interval(), rules.sweep_batch_size)),
            ctx,
            rules,
        }
    }

    pub fn in_memory(rules: ReservationRules, clock: Arc<dyn Clock>) -> Self {
        Self::new(Storage::memory(), clock, rules)
    }

    pub async fn from_config(config: &Config) -> Result<Self, StartupError> {
        let storage = Storage::connect(&config.storage).await?;
        Ok(Self::new(storage, Arc::new(SystemClock), config.reservations.clone()))
    }

    pub async fn create_trip(&self, principal: &Principal, new_trip: NewTrip) -> CoreResult<Trip> {
        principal.require(Capability::ManageTrips)?;

        let trip = Trip::provision(new_trip, self.ctx.clock.now())?;
        self.ctx.trips.insert_trip(&trip).await?;
        info!(
            "Trip {} created by {}: {} -> {}, {} seats",
            trip.id,
            principal.subject,
            trip.origin,
            trip.destination,
            trip.total_seats()
        );
        Ok(trip)
    }

    /// Holds seats for the calling principal.
    pub async fn place_hold(&self, principal: &Principal, hold: PlaceHold) -> CoreResult<HoldReceipt> {
        principal.require(Capability::HoldSeats)?;

        let hold_duration = match hold.hold_seconds {
            Some(seconds) => Duration::try_seconds(seconds),
            None => self.rules.hold_duration(),
        }
        .ok_or_else(|| ReservationError::ValidationFailed("hold duration is out of range".to_string()))?;
        self.holds
            .place_hold(HoldRequest {
                trip_id: hold.trip_id,
                customer_id: principal.subject.clone(),
                seat_numbers: hold.seat_numbers,
                passengers: hold.passengers,
                hold_duration,
            })
            .await
    }

    pub async fn confirm_booking(
        &self,
        principal: &Principal,
        booking_id: Uuid,
        payment: PaymentConfirmation,
    ) -> CoreResult<Booking> {
        principal.require(Capability::ConfirmBooking)?;
        self.lifecycle.confirm(booking_id, payment).await
    }

    pub async fn cancel_booking(
        &self,
        principal: &Principal,
        booking_id: Uuid,
        reason: CancellationReason,
    ) -> CoreResult<Booking> {
        let booking = self.lifecycle.get(booking_id).await?;
        if !principal.may_cancel_for(&booking.customer_id) {
            return Err(ReservationError::Forbidden(format!(
                "{} may not cancel booking {}",
                principal.subject, booking_id
            )));
        }
        self.lifecycle.cancel(booking_id, reason).await
    }

    pub async fn get_trip_availability(&self, trip_id: Uuid) -> CoreResult<TripAvailability> {
        self.reader.availability(trip_id).await
    }

    pub async fn search_trips(&self, query: &TripSearchQuery) -> CoreResult<Vec<TripSummary>> {
        self.reader.search(query).await
    }

    pub async fn get_trip_detail(&self, trip_id: Uuid) -> CoreResult<Trip> {
        self.reader.detail(trip_id).await
    }

    pub async fn get_booking(&self, principal: &Principal, booking_id: Uuid) -> CoreResult<Booking> {
        let booking = self.lifecycle.get(booking_id).await?;
        if !principal.may_read_for(&booking.customer_id) {
            return Err(ReservationError::Forbidden(format!(
                "{} may not read booking {}",
                principal.subject, booking_id
            )));
        }
        Ok(booking)
    }

    /// All bookings of one customer, terminal ones included.
    pub async fn list_bookings(&self, principal: &Principal, customer_id: &str) -> CoreResult<Vec<Booking>> {
        if !principal.may_read_for(customer_id) {
            return Err(ReservationError::Forbidden(format!(
                "{} may not list bookings of {}",
                principal.subject, customer_id
            )));
        }
        Ok(self.ctx.bookings.list_customer_bookings(customer_id).await?)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BookingEvent> {
        self.ctx.events.subscribe()
    }

    pub fn sweeper(&self) -> Arc<ExpirySweeper> {
        Arc::clone(&self.sweeper)
    }

    pub fn rules(&self) -> &ReservationRules {
        &self.rules
    }
}
