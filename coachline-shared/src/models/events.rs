use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SeatsHeldEvent {
    pub trip_id: Uuid,
    pub booking_id: Uuid,
    pub seat_numbers: Vec<String>,
    pub held_until: DateTime<Utc>,
    pub timestamp: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct BookingConfirmedEvent {
    pub trip_id: Uuid,
    pub booking_id: Uuid,
    pub seat_numbers: Vec<String>,
    pub ticket_code: String,
    pub total_amount: i64,
    pub timestamp: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct BookingCancelledEvent {
    pub trip_id: Uuid,
    pub booking_id: Uuid,
    pub seat_numbers: Vec<String>,
    pub reason: String,
    pub timestamp: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct HoldExpiredEvent {
    pub trip_id: Uuid,
    pub booking_id: Uuid,
    pub seat_numbers: Vec<String>,
    pub timestamp: i64,
}

/// Everything a seat-map subscriber needs to know about a booking changing state.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingEvent {
    SeatsHeld(SeatsHeldEvent),
    BookingConfirmed(BookingConfirmedEvent),
    BookingCancelled(BookingCancelledEvent),
    HoldExpired(HoldExpiredEvent),
}

impl BookingEvent {
    pub fn trip_id(&self) -> Uuid {
        match self {
            BookingEvent::SeatsHeld(e) => e.trip_id,
            BookingEvent::BookingConfirmed(e) => e.trip_id,
            BookingEvent::BookingCancelled(e) => e.trip_id,
            BookingEvent::HoldExpired(e) => e.trip_id,
        }
    }

    pub fn booking_id(&self) -> Uuid {
        match self {
            BookingEvent::SeatsHeld(e) => e.booking_id,
            BookingEvent::BookingConfirmed(e) => e.booking_id,
            BookingEvent::BookingCancelled(e) => e.booking_id,
            BookingEvent::HoldExpired(e) => e.booking_id,
        }
    }

    /// Topic name used when the event is forwarded to a message bus.
    pub fn topic(&self) -> &'static str {
        match self {
            BookingEvent::SeatsHeld(_) => "holds.created",
            BookingEvent::BookingConfirmed(_) => "booking.confirmed",
            BookingEvent::BookingCancelled(_) => "booking.cancelled",
            BookingEvent::HoldExpired(_) => "holds.expired",
        }
    }
}
