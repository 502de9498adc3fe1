use crate::BookingContext;
use chrono::{DateTime, Duration, SubsecRound, Utc};
use coachline_catalog::SeatTransition;
use coachline_core::booking::{Booking, Passenger};
use coachline_core::{CoreResult, ReservationError};
use coachline_shared::{BookingEvent, SeatsHeldEvent};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct HoldRequest {
    pub trip_id: Uuid,
    pub customer_id: String,
    pub seat_numbers: Vec<String>,
    pub passengers: Vec<Passenger>,
    pub hold_duration: Duration,
}

impl HoldRequest {
    /// Shape checks that need no storage access.
    pub fn validate(&self) -> CoreResult<()> {
        if self.customer_id.trim().is_empty() {
            return Err(invalid("customer id is required"));
        }
        if self.seat_numbers.is_empty() {
            return Err(invalid("at least one seat must be requested"));
        }
        if self.hold_duration <= Duration::zero() {
            return Err(invalid("hold duration must be positive"));
        }

        let mut requested = HashSet::new();
        for seat in &self.seat_numbers {
            if seat.trim().is_empty() {
                return Err(invalid("seat numbers must not be blank"));
            }
            if !requested.insert(seat.as_str()) {
                return Err(invalid(&format!("seat {} requested more than once", seat)));
            }
        }

        if self.passengers.len() != self.seat_numbers.len() {
            return Err(invalid(&format!(
                "{} passenger(s) for {} seat(s)",
                self.passengers.len(),
                self.seat_numbers.len()
            )));
        }
        let mut assigned = HashSet::new();
        for passenger in &self.passengers {
            if passenger.name.trim().is_empty() || passenger.phone.expose().trim().is_empty() {
                return Err(invalid("passenger name and phone are required"));
            }
            if !requested.contains(passenger.seat_number.as_str()) {
                return Err(invalid(&format!("passenger seat {} was not requested", passenger.seat_number)));
            }
            if !assigned.insert(passenger.seat_number.as_str()) {
                return Err(invalid(&format!("seat {} assigned to more than one passenger", passenger.seat_number)));
            }
        }

        Ok(())
    }
}

fn invalid(msg: &str) -> ReservationError {
    ReservationError::ValidationFailed(msg.to_string())
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HoldReceipt {
    pub booking_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub total_amount: i64,
    pub currency: String,
}

/// The only path by which a seat leaves `available`.
pub struct HoldManager {
    ctx: BookingContext,
}

impl HoldManager {
    pub fn new(ctx: BookingContext) -> Self {
        Self { ctx }
    }

    pub async fn place_hold(&self, request: HoldRequest) -> CoreResult<HoldReceipt> {
        request.validate()?;

        let trip = self
            .ctx
            .trips
            .get_trip(request.trip_id)
            .await?
            .ok_or(ReservationError::UnknownTrip(request.trip_id))?;

        let now = self.ctx.clock.now();
        let booking_id = Uuid::new_v4();
        // storage keeps microseconds; the guard must compare equal after a round trip
        let held_until = now
            .checked_add_signed(request.hold_duration)
            .ok_or_else(|| invalid("hold duration is out of range"))?
            .trunc_subsecs(6);
        let total_amount = i64::try_from(request.seat_numbers.len())
            .ok()
            .and_then(|count| trip.price_amount.checked_mul(count))
            .ok_or_else(|| invalid("booking total is out of range"))?;

        let hold = SeatTransition::hold(request.seat_numbers.clone(), booking_id);
        self.ctx.trips.apply_seat_transition(trip.id, &hold, now).await.map_err(|e| {
            if e.is_precondition_failure() {
                info!("Hold on trip {} lost a seat race: {}", trip.id, e);
            }
            ReservationError::from(e)
        })?;

        let mut booking = Booking::pending(
            booking_id,
            request.customer_id,
            trip.id,
            request.passengers,
            total_amount,
            trip.currency.clone(),
            now,
        );
        booking.place_on_hold(held_until, now)?;

        if let Err(e) = self.ctx.bookings.insert_booking(&booking).await {
            error!("Failed to record booking {} after holding seats: {}", booking_id, e);
            let release = SeatTransition::release(request.seat_numbers.clone(), booking_id);
            if let Err(undo) = self.ctx.trips.apply_seat_transition(trip.id, &release, now).await {
                warn!("Could not release seats held for booking {}: {}", booking_id, undo);
            }
            return Err(e.into());
        }

        info!(
            "Booking {} holds seats {:?} on trip {} until {}",
            booking_id, request.seat_numbers, trip.id, held_until
        );
        self.ctx.events.publish(BookingEvent::SeatsHeld(SeatsHeldEvent {
            trip_id: trip.id,
            booking_id,
            seat_numbers: request.seat_numbers,
            held_until,
            timestamp: now.timestamp(),
        }));

        Ok(HoldReceipt {
            booking_id,
            expires_at: held_until,
            total_amount,
            currency: trip.currency,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{hold_request, start, Harness};
    use coachline_catalog::SeatStatus;
    use coachline_core::booking::{BookingStatus, PaymentStatus};
    use coachline_core::repository::{BookingRepository, TripRepository};

    #[tokio::test]
    async fn test_hold_marks_seats_and_records_booking() {
        let h = Harness::new();
        let trip = h.trip(10).await;
        let manager = HoldManager::new(h.ctx.clone());
        let mut events = h.ctx.events.subscribe();

        let receipt = manager.place_hold(hold_request(&trip, "user-1", &["S1", "S2"])).await.unwrap();
        assert_eq!(receipt.expires_at, start() + Duration::minutes(15));
        assert_eq!(receipt.total_amount, 560_000);

        let stored = h.store.get_trip(trip.id).await.unwrap().unwrap();
        for seat in ["S1", "S2"] {
            let seat = stored.seat(seat).unwrap();
            assert_eq!(seat.status, SeatStatus::Held);
            assert_eq!(seat.booking_id, Some(receipt.booking_id));
        }
        assert_eq!(stored.available_seat_count(), 8);

        let booking = h.store.get_booking(receipt.booking_id).await.unwrap().unwrap();
        assert_eq!(booking.status, BookingStatus::Held);
        assert_eq!(booking.payment_status, PaymentStatus::Pending);
        assert_eq!(booking.held_until, Some(receipt.expires_at));

        let event = events.recv().await.unwrap();
        assert_eq!(event.topic(), "holds.created");
        assert_eq!(event.booking_id(), receipt.booking_id);
    }

    #[tokio::test]
    async fn test_overlapping_hold_is_rejected_whole() {
        let h = Harness::new();
        let trip = h.trip(10).await;
        let manager = HoldManager::new(h.ctx.clone());

        manager.place_hold(hold_request(&trip, "user-1", &["S3"])).await.unwrap();
        let err = manager.place_hold(hold_request(&trip, "user-2", &["S2", "S3"])).await.unwrap_err();
        assert_eq!(err, ReservationError::SeatUnavailable { seats: vec!["S3".to_string()] });

        // S2 must not have been taken by the failed attempt
        let stored = h.store.get_trip(trip.id).await.unwrap().unwrap();
        assert_eq!(stored.seat("S2").unwrap().status, SeatStatus::Available);
        assert!(h.store.list_customer_bookings("user-2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_trip_and_seat() {
        let h = Harness::new();
        let trip = h.trip(4).await;
        let manager = HoldManager::new(h.ctx.clone());

        let err = manager.place_hold(hold_request(&trip, "user-1", &["S1", "Z9"])).await.unwrap_err();
        assert_eq!(err, ReservationError::UnknownSeat(vec!["Z9".to_string()]));

        let mut missing = hold_request(&trip, "user-1", &["S1"]);
        missing.trip_id = Uuid::new_v4();
        let err = manager.place_hold(missing.clone()).await.unwrap_err();
        assert_eq!(err, ReservationError::UnknownTrip(missing.trip_id));
    }

    #[tokio::test]
    async fn test_out_of_range_hold_is_rejected_before_seats_move() {
        let h = Harness::new();
        let trip = h.trip(4).await;
        let manager = HoldManager::new(h.ctx.clone());

        let mut forever = hold_request(&trip, "user-1", &["S1"]);
        forever.hold_duration = Duration::seconds(10_000_000_000_000);
        let err = manager.place_hold(forever).await.unwrap_err();
        assert!(matches!(err, ReservationError::ValidationFailed(_)));

        let stored = h.store.get_trip(trip.id).await.unwrap().unwrap();
        assert_eq!(stored.available_seat_count(), 4);
        assert!(h.store.list_customer_bookings("user-1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_total_overflow_is_rejected() {
        let h = Harness::new();
        let mut trip = h.trip(4).await;
        trip.id = Uuid::new_v4();
        trip.price_amount = i64::MAX / 2 + 1;
        h.store.insert_trip(&trip).await.unwrap();

        let err = HoldManager::new(h.ctx.clone())
            .place_hold(hold_request(&trip, "user-1", &["S1", "S2"]))
            .await
            .unwrap_err();
        assert!(matches!(err, ReservationError::ValidationFailed(_)));

        let stored = h.store.get_trip(trip.id).await.unwrap().unwrap();
        assert_eq!(stored.available_seat_count(), 4);
    }

    #[test]
    fn test_request_validation() {
        let trip_id = Uuid::new_v4();
        let base = HoldRequest {
            trip_id,
            customer_id: "user-1".to_string(),
            seat_numbers: vec!["A1".to_string(), "A2".to_string()],
            passengers: vec![Passenger::new("An", "0900000001", "A1"), Passenger::new("Binh", "0900000002", "A2")],
            hold_duration: Duration::minutes(15),
        };
        assert!(base.validate().is_ok());

        let mut duplicate = base.clone();
        duplicate.seat_numbers = vec!["A1".to_string(), "A1".to_string()];
        assert!(matches!(duplicate.validate(), Err(ReservationError::ValidationFailed(_))));

        let mut empty = base.clone();
        empty.seat_numbers.clear();
        empty.passengers.clear();
        assert!(matches!(empty.validate(), Err(ReservationError::ValidationFailed(_))));

        let mut mismatched = base.clone();
        mismatched.passengers[1].seat_number = "A3".to_string();
        assert!(matches!(mismatched.validate(), Err(ReservationError::ValidationFailed(_))));

        let mut short = base.clone();
        short.passengers.pop();
        assert!(matches!(short.validate(), Err(ReservationError::ValidationFailed(_))));

        let mut zero = base.clone();
        zero.hold_duration = Duration::zero();
        assert!(matches!(zero.validate(), Err(ReservationError::ValidationFailed(_))));

        let mut nameless = base;
        nameless.passengers[0].name = " ".to_string();
        assert!(matches!(nameless.validate(), Err(ReservationError::ValidationFailed(_))));
    }
}
