use crate::tickets::TicketIssuer;
use crate::BookingContext;
use chrono::{DateTime, Utc};
use coachline_catalog::SeatTransition;
use coachline_core::booking::{Booking, BookingStatus, CancellationReason};
use coachline_core::{CoreResult, ReservationError};
use coachline_shared::{BookingCancelledEvent, BookingConfirmedEvent, BookingEvent};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Payment-success signal from the gateway.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaymentConfirmation {
    pub reference: String,
    pub method: Option<String>,
}

impl PaymentConfirmation {
    pub fn new(reference: impl Into<String>) -> Self {
        Self { reference: reference.into(), method: None }
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }
}

/// Drives a held booking to `confirmed` or `cancelled`.
///
/// Every outcome starts by flipping the booking's seats with a conditional
/// transition; whoever flips them first (confirm, cancel, or the sweeper)
/// owns the booking, and everyone else gets `BookingNoLongerHeld`.
pub struct BookingLifecycle {
    ctx: BookingContext,
    tickets: TicketIssuer,
}

impl BookingLifecycle {
    pub fn new(ctx: BookingContext, tickets: TicketIssuer) -> Self {
        Self { ctx, tickets }
    }

    pub async fn get(&self, booking_id: Uuid) -> CoreResult<Booking> {
        self.ctx
            .bookings
            .get_booking(booking_id)
            .await?
            .ok_or(ReservationError::UnknownBooking(booking_id))
    }

    pub async fn confirm(&self, booking_id: Uuid, payment: PaymentConfirmation) -> CoreResult<Booking> {
        if payment.reference.trim().is_empty() {
            return Err(ReservationError::ValidationFailed("payment reference is required".to_string()));
        }

        let booking = self.get(booking_id).await?;
        let now = self.ctx.clock.now();
        ensure_open(&booking, BookingStatus::Confirmed, now)?;

        let mut confirmed = booking.clone();
        confirmed.confirm(self.tickets.issue(), payment.reference, payment.method, now)?;

        let seats = booking.seat_numbers();
        self.flip_seats(&booking, SeatTransition::book(seats.clone(), booking.id), now).await?;

        match self.commit(&booking, &confirmed).await {
            Ok(()) => {}
            // the sweeper already closed the record over the same seats
            Err(e @ ReservationError::BookingNoLongerHeld(_)) => return Err(e),
            Err(e) => {
                self.undo(&booking, SeatTransition::unbook(seats, booking.id), now).await;
                return Err(e);
            }
        }

        let ticket_code = confirmed.ticket_code.clone().unwrap_or_default();
        info!("Booking {} confirmed, ticket {}", booking.id, ticket_code);
        self.ctx.events.publish(BookingEvent::BookingConfirmed(BookingConfirmedEvent {
            trip_id: booking.trip_id,
            booking_id: booking.id,
            seat_numbers: seats,
            ticket_code,
            total_amount: confirmed.total_amount,
            timestamp: now.timestamp(),
        }));

        Ok(confirmed)
    }

    pub async fn cancel(&self, booking_id: Uuid, reason: CancellationReason) -> CoreResult<Booking> {
        let booking = self.get(booking_id).await?;
        let now = self.ctx.clock.now();
        ensure_open(&booking, BookingStatus::Cancelled, now)?;

        let mut cancelled = booking.clone();
        cancelled.cancel(reason, now)?;

        let seats = booking.seat_numbers();
        self.flip_seats(&booking, SeatTransition::release(seats.clone(), booking.id), now).await?;

        match self.commit(&booking, &cancelled).await {
            Ok(()) => {}
            // the sweeper already closed the record over the same seats
            Err(e @ ReservationError::BookingNoLongerHeld(_)) => return Err(e),
            Err(e) => {
                self.undo(&booking, SeatTransition::hold(seats, booking.id), now).await;
                return Err(e);
            }
        }

        info!("Booking {} cancelled ({})", booking.id, reason.as_str());
        self.ctx.events.publish(BookingEvent::BookingCancelled(BookingCancelledEvent {
            trip_id: booking.trip_id,
            booking_id: booking.id,
            seat_numbers: seats,
            reason: reason.as_str().to_string(),
            timestamp: now.timestamp(),
        }));

        Ok(cancelled)
    }

    async fn flip_seats(&self, booking: &Booking, transition: SeatTransition, now: DateTime<Utc>) -> CoreResult<()> {
        match self.ctx.trips.apply_seat_transition(booking.trip_id, &transition, now).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_precondition_failure() => {
                debug!("Booking {} lost its seats before {}: {}", booking.id, transition.target, e);
                Err(ReservationError::BookingNoLongerHeld(booking.id))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn commit(&self, current: &Booking, next: &Booking) -> CoreResult<()> {
        match self.ctx.bookings.replace_if(&current.guard(), next).await {
            Ok(true) => Ok(()),
            Ok(false) => {
                warn!("Booking {} changed while its seats were being moved", current.id);
                Err(ReservationError::BookingNoLongerHeld(current.id))
            }
            Err(e) => {
                error!("Failed to write booking {}: {}", current.id, e);
                Err(e.into())
            }
        }
    }

    /// Best-effort reversal of a seat flip whose booking write did not land.
    async fn undo(&self, booking: &Booking, transition: SeatTransition, now: DateTime<Utc>) {
        if let Err(e) = self.ctx.trips.apply_seat_transition(booking.trip_id, &transition, now).await {
            error!("Seats of booking {} left as {}: {}", booking.id, transition.expected, e);
        }
    }
}

/// A booking can only move forward while it is `held` and its hold has not run out.
fn ensure_open(booking: &Booking, target: BookingStatus, now: DateTime<Utc>) -> CoreResult<()> {
    match booking.status {
        BookingStatus::Held => {}
        status if status.is_terminal() => return Err(ReservationError::BookingNoLongerHeld(booking.id)),
        status => return Err(ReservationError::InvalidTransition { from: status, to: target }),
    }
    if booking.is_hold_expired(now) {
        return Err(ReservationError::ExpiredHold(booking.id));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hold::HoldManager;
    use crate::testing::{hold_request, Harness};
    use chrono::Duration;
    use coachline_catalog::SeatStatus;
    use coachline_core::booking::PaymentStatus;
    use coachline_core::Clock;
    use coachline_core::repository::{BookingRepository, TripRepository};

    fn lifecycle(h: &Harness) -> BookingLifecycle {
        BookingLifecycle::new(h.ctx.clone(), TicketIssuer::new("CL"))
    }

    #[tokio::test]
    async fn test_confirm_books_seats_and_issues_ticket() {
        let h = Harness::new();
        let trip = h.trip(6).await;
        let receipt = HoldManager::new(h.ctx.clone())
            .place_hold(hold_request(&trip, "user-1", &["S1", "S2"]))
            .await
            .unwrap();

        let confirmed = lifecycle(&h)
            .confirm(receipt.booking_id, PaymentConfirmation::new("txn_8812").with_method("card"))
            .await
            .unwrap();

        assert_eq!(confirmed.status, BookingStatus::Confirmed);
        assert_eq!(confirmed.payment_status, PaymentStatus::Paid);
        assert_eq!(confirmed.payment_method.as_deref(), Some("card"));
        assert!(confirmed.ticket_code.as_deref().unwrap().starts_with("CL-"));

        let stored = h.store.get_trip(trip.id).await.unwrap().unwrap();
        for seat in ["S1", "S2"] {
            let seat = stored.seat(seat).unwrap();
            assert_eq!(seat.status, SeatStatus::Booked);
            assert_eq!(seat.booking_id, Some(receipt.booking_id));
        }
    }

    #[tokio::test]
    async fn test_second_confirm_reports_no_longer_held() {
        let h = Harness::new();
        let trip = h.trip(4).await;
        let receipt = HoldManager::new(h.ctx.clone())
            .place_hold(hold_request(&trip, "user-1", &["S4"]))
            .await
            .unwrap();

        let lifecycle = lifecycle(&h);
        lifecycle.confirm(receipt.booking_id, PaymentConfirmation::new("txn_1")).await.unwrap();
        let err = lifecycle.confirm(receipt.booking_id, PaymentConfirmation::new("txn_1")).await.unwrap_err();
        assert_eq!(err, ReservationError::BookingNoLongerHeld(receipt.booking_id));

        let err = lifecycle
            .cancel(receipt.booking_id, CancellationReason::CustomerRequest)
            .await
            .unwrap_err();
        assert_eq!(err, ReservationError::BookingNoLongerHeld(receipt.booking_id));
    }

    #[tokio::test]
    async fn test_confirm_at_expiry_instant_fails() {
        let h = Harness::new();
        let trip = h.trip(4).await;
        let receipt = HoldManager::new(h.ctx.clone())
            .place_hold(hold_request(&trip, "user-1", &["S1"]))
            .await
            .unwrap();

        h.clock.set(receipt.expires_at);
        let err = lifecycle(&h)
            .confirm(receipt.booking_id, PaymentConfirmation::new("txn_late"))
            .await
            .unwrap_err();
        assert_eq!(err, ReservationError::ExpiredHold(receipt.booking_id));

        let stored = h.store.get_trip(trip.id).await.unwrap().unwrap();
        assert_eq!(stored.seat("S1").unwrap().status, SeatStatus::Held);
    }

    #[tokio::test]
    async fn test_cancel_for_failed_payment_releases_seats() {
        let h = Harness::new();
        let trip = h.trip(4).await;
        let receipt = HoldManager::new(h.ctx.clone())
            .place_hold(hold_request(&trip, "user-1", &["S1", "S2", "S3"]))
            .await
            .unwrap();

        h.clock.advance(Duration::minutes(5));
        let cancelled = lifecycle(&h)
            .cancel(receipt.booking_id, CancellationReason::PaymentFailed)
            .await
            .unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);
        assert_eq!(cancelled.payment_status, PaymentStatus::Failed);
        assert_eq!(cancelled.held_until, None);

        let stored = h.store.get_trip(trip.id).await.unwrap().unwrap();
        assert_eq!(stored.available_seat_count(), 4);
        assert!(stored.seats.iter().all(|s| s.booking_id.is_none()));
    }

    #[tokio::test]
    async fn test_failed_confirm_write_returns_seats_to_hold() {
        let (h, bookings) = Harness::with_scripted_bookings();
        let trip = h.trip(4).await;
        let receipt = HoldManager::new(h.ctx.clone())
            .place_hold(hold_request(&trip, "user-1", &["S1", "S2"]))
            .await
            .unwrap();

        bookings.fail_next(1);
        let err = lifecycle(&h)
            .confirm(receipt.booking_id, PaymentConfirmation::new("txn_77"))
            .await
            .unwrap_err();
        assert!(matches!(err, ReservationError::StorageUnavailable(_)));

        let stored = h.store.get_trip(trip.id).await.unwrap().unwrap();
        for seat in ["S1", "S2"] {
            let seat = stored.seat(seat).unwrap();
            assert_eq!(seat.status, SeatStatus::Held);
            assert_eq!(seat.booking_id, Some(receipt.booking_id));
        }

        let confirmed = lifecycle(&h)
            .confirm(receipt.booking_id, PaymentConfirmation::new("txn_77"))
            .await
            .unwrap();
        assert_eq!(confirmed.status, BookingStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_cancel_beaten_by_expiry_leaves_seats_released() {
        let (h, bookings) = Harness::with_scripted_bookings();
        let trip = h.trip(4).await;
        let receipt = HoldManager::new(h.ctx.clone())
            .place_hold(hold_request(&trip, "user-1", &["S3"]))
            .await
            .unwrap();

        let mut expired = h.store.get_booking(receipt.booking_id).await.unwrap().unwrap();
        expired.expire(h.clock.now()).unwrap();
        bookings.overtake_with(expired);

        let err = lifecycle(&h)
            .cancel(receipt.booking_id, CancellationReason::CustomerRequest)
            .await
            .unwrap_err();
        assert_eq!(err, ReservationError::BookingNoLongerHeld(receipt.booking_id));

        let stored = h.store.get_trip(trip.id).await.unwrap().unwrap();
        assert_eq!(stored.seat("S3").unwrap().status, SeatStatus::Available);
        assert_eq!(stored.seat("S3").unwrap().booking_id, None);
        let booking = h.store.get_booking(receipt.booking_id).await.unwrap().unwrap();
        assert_eq!(booking.status, BookingStatus::Expired);
    }

    #[tokio::test]
    async fn test_confirm_requires_payment_reference() {
        let h = Harness::new();
        let err = lifecycle(&h).confirm(Uuid::new_v4(), PaymentConfirmation::new(" ")).await.unwrap_err();
        assert!(matches!(err, ReservationError::ValidationFailed(_)));

        let missing = Uuid::new_v4();
        let err = lifecycle(&h).confirm(missing, PaymentConfirmation::new("txn")).await.unwrap_err();
        assert_eq!(err, ReservationError::UnknownBooking(missing));
    }

    #[test]
    fn test_pending_booking_is_an_invalid_transition() {
        let now = Utc::now();
        let booking = Booking::pending(Uuid::new_v4(), "user-1".to_string(), Uuid::new_v4(), vec![], 0, "VND".to_string(), now);
        assert_eq!(
            ensure_open(&booking, BookingStatus::Confirmed, now),
            Err(ReservationError::InvalidTransition { from: BookingStatus::Pending, to: BookingStatus::Confirmed })
        );
    }
}
