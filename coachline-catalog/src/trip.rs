use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Seat status within a trip
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SeatStatus {
    Available,
    Held,
    Booked,
}

impl SeatStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeatStatus::Available => "available",
            SeatStatus::Held => "held",
            SeatStatus::Booked => "booked",
        }
    }
}

impl fmt::Display for SeatStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SeatStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(SeatStatus::Available),
            "held" => Ok(SeatStatus::Held),
            "booked" => Ok(SeatStatus::Booked),
            other => Err(format!("unknown seat status: {}", other)),
        }
    }
}

/// A single seat on a trip.
///
/// `booking_id` is a plain lookup reference to the booking currently holding
/// the seat. It is present iff the seat is not `Available`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Seat {
    pub seat_number: String,
    pub status: SeatStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub booking_id: Option<Uuid>,
}

impl Seat {
    pub fn available(seat_number: impl Into<String>) -> Self {
        Self {
            seat_number: seat_number.into(),
            status: SeatStatus::Available,
            booking_id: None,
        }
    }

    pub fn is_available(&self) -> bool {
        self.status == SeatStatus::Available
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TripStatus {
    Scheduled,
    Departed,
    Arrived,
}

impl TripStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TripStatus::Scheduled => "scheduled",
            TripStatus::Departed => "departed",
            TripStatus::Arrived => "arrived",
        }
    }
}

impl FromStr for TripStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(TripStatus::Scheduled),
            "departed" => Ok(TripStatus::Departed),
            "arrived" => Ok(TripStatus::Arrived),
            other => Err(format!("unknown trip status: {}", other)),
        }
    }
}

/// A scheduled trip and the seats it exclusively owns.
///
/// The seat list is fixed at creation: numbers are unique and the count never
/// changes. Only seat status and booking references are mutable, and only
/// through [`Trip::apply_transition`](crate::inventory).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Trip {
    pub id: Uuid,
    pub origin: String,
    pub destination: String,
    pub departure_time: DateTime<Utc>,
    pub expected_arrival_time: DateTime<Utc>,
    pub price_amount: i64,
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle_id: Option<Uuid>,
    pub status: TripStatus,
    pub seats: Vec<Seat>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Trip {
    pub fn seat(&self, seat_number: &str) -> Option<&Seat> {
        self.seats.iter().find(|s| s.seat_number == seat_number)
    }

    pub fn total_seats(&self) -> usize {
        self.seats.len()
    }

    /// Derived at read time; never stored on the trip record.
    pub fn available_seat_count(&self) -> usize {
        self.seats.iter().filter(|s| s.is_available()).count()
    }

    /// Seat numbers currently referencing `booking_id`, in seat-map order.
    pub fn seats_owned_by(&self, booking_id: Uuid) -> Vec<String> {
        self.seats
            .iter()
            .filter(|s| s.booking_id == Some(booking_id))
            .map(|s| s.seat_number.clone())
            .collect()
    }

    pub fn departure_date(&self) -> chrono::NaiveDate {
        self.departure_time.date_naive()
    }
}
