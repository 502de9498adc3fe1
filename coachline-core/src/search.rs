use crate::{CoreResult, ReservationError};
use chrono::{DateTime, NaiveDate, Utc};
use coachline_catalog::{SeatStatus, Trip, TripStatus};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TripSearchQuery {
    pub from: String,
    pub to: String,
    pub date: NaiveDate, // calendar day only, departure time-of-day is ignored
}

impl TripSearchQuery {
    pub fn new(from: impl Into<String>, to: impl Into<String>, date: NaiveDate) -> CoreResult<Self> {
        let query = Self { from: from.into(), to: to.into(), date };
        if query.from.trim().is_empty() || query.to.trim().is_empty() {
            return Err(ReservationError::ValidationFailed(
                "from, to, and date parameters are required".to_string(),
            ));
        }
        Ok(query)
    }

    /// Parse a `YYYY-MM-DD` date string.
    pub fn parse(from: &str, to: &str, date: &str) -> CoreResult<Self> {
        let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|_| {
            ReservationError::ValidationFailed("invalid date format, please use YYYY-MM-DD".to_string())
        })?;
        Self::new(from, to, date)
    }

    /// Case-insensitive substring match on route names, same UTC day, scheduled only.
    pub fn matches(&self, trip: &Trip) -> bool {
        trip.status == TripStatus::Scheduled
            && trip.departure_date() == self.date
            && contains_ignore_case(&trip.origin, &self.from)
            && contains_ignore_case(&trip.destination, &self.to)
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.trim().to_lowercase())
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TripSummary {
    pub trip_id: Uuid,
    pub origin: String,
    pub destination: String,
    pub departure_time: DateTime<Utc>,
    pub price_amount: i64,
    pub currency: String,
    pub available_seat_count: usize,
}

impl From<&Trip> for TripSummary {
    fn from(trip: &Trip) -> Self {
        Self {
            trip_id: trip.id,
            origin: trip.origin.clone(),
            destination: trip.destination.clone(),
            departure_time: trip.departure_time,
            price_amount: trip.price_amount,
            currency: trip.currency.clone(),
            available_seat_count: trip.available_seat_count(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeatAvailability {
    pub seat_number: String,
    pub status: SeatStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TripAvailability {
    pub trip_id: Uuid,
    pub seats: Vec<SeatAvailability>,
}

impl From<&Trip> for TripAvailability {
    fn from(trip: &Trip) -> Self {
        Self {
            trip_id: trip.id,
            seats: trip
                .seats
                .iter()
                .map(|s| SeatAvailability { seat_number: s.seat_number.clone(), status: s.status })
                .collect(),
        }
    }
}
