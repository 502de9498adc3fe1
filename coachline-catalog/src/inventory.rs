use crate::trip::{Seat, SeatStatus, Trip};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// A conditional, all-or-nothing change to a set of seats on one trip.
///
/// Every seat named must currently be in `expected` status and reference
/// `expected_booking`; only then are all of them moved to `target` with
/// `booking_id` attached. Storage engines evaluate this against the
/// authoritative seat rows, never against a cached read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatTransition {
    pub seat_numbers: Vec<String>,
    pub expected: SeatStatus,
    pub expected_booking: Option<Uuid>,
    pub target: SeatStatus,
    pub booking_id: Option<Uuid>,
}

impl SeatTransition {
    /// `available -> held`, attaching a new booking.
    pub fn hold(seat_numbers: Vec<String>, booking_id: Uuid) -> Self {
        Self {
            seat_numbers,
            expected: SeatStatus::Available,
            expected_booking: None,
            target: SeatStatus::Held,
            booking_id: Some(booking_id),
        }
    }

    /// `held -> booked`, keeping the booking reference.
    pub fn book(seat_numbers: Vec<String>, booking_id: Uuid) -> Self {
        Self {
            seat_numbers,
            expected: SeatStatus::Held,
            expected_booking: Some(booking_id),
            target: SeatStatus::Booked,
            booking_id: Some(booking_id),
        }
    }

    /// `held -> available`, clearing the booking reference.
    pub fn release(seat_numbers: Vec<String>, booking_id: Uuid) -> Self {
        Self {
            seat_numbers,
            expected: SeatStatus::Held,
            expected_booking: Some(booking_id),
            target: SeatStatus::Available,
            booking_id: None,
        }
    }

    /// `booked -> held`. Only used to undo a confirmation whose booking
    /// record could not be written.
    pub fn unbook(seat_numbers: Vec<String>, booking_id: Uuid) -> Self {
        Self {
            seat_numbers,
            expected: SeatStatus::Booked,
            expected_booking: Some(booking_id),
            target: SeatStatus::Held,
            booking_id: Some(booking_id),
        }
    }

    /// Structural checks that do not depend on current seat state.
    pub fn validate(&self) -> Result<(), InventoryError> {
        if self.seat_numbers.is_empty() {
            return Err(InventoryError::InvalidTransition("no seat numbers provided".to_string()));
        }

        let mut seen = HashSet::new();
        for number in &self.seat_numbers {
            if !seen.insert(number.as_str()) {
                return Err(InventoryError::InvalidTransition(format!(
                    "seat {} requested more than once",
                    number
                )));
            }
        }

        // available <=> no booking reference, on both sides of the transition
        if (self.target == SeatStatus::Available) != self.booking_id.is_none() {
            return Err(InventoryError::InvalidTransition(format!(
                "target status {} is inconsistent with booking reference",
                self.target
            )));
        }
        if (self.expected == SeatStatus::Available) != self.expected_booking.is_none() {
            return Err(InventoryError::InvalidTransition(format!(
                "expected status {} is inconsistent with booking reference",
                self.expected
            )));
        }

        Ok(())
    }

    fn precondition_holds(&self, seat: &Seat) -> bool {
        seat.status == self.expected && seat.booking_id == self.expected_booking
    }

    /// Evaluate the transition against a seat list without mutating it.
    ///
    /// Unknown seats are reported before precondition failures.
    pub fn check(&self, seats: &[Seat]) -> Result<(), InventoryError> {
        self.validate()?;

        let mut unknown = Vec::new();
        let mut conflicting = Vec::new();
        for number in &self.seat_numbers {
            match seats.iter().find(|s| &s.seat_number == number) {
                None => unknown.push(number.clone()),
                Some(seat) if !self.precondition_holds(seat) => conflicting.push(number.clone()),
                Some(_) => {}
            }
        }

        if !unknown.is_empty() {
            return Err(InventoryError::UnknownSeat(unknown));
        }
        if !conflicting.is_empty() {
            return Err(InventoryError::PreconditionFailed { seats: conflicting });
        }
        Ok(())
    }
}

impl Trip {
    /// Apply a seat transition in full or not at all, bumping `updated_at`.
    pub fn apply_transition(
        &mut self,
        transition: &SeatTransition,
        now: DateTime<Utc>,
    ) -> Result<(), InventoryError> {
        transition.check(&self.seats)?;

        let requested: HashSet<&str> = transition.seat_numbers.iter().map(String::as_str).collect();
        for seat in self.seats.iter_mut().filter(|s| requested.contains(s.seat_number.as_str())) {
            seat.status = transition.target;
            seat.booking_id = transition.booking_id;
        }
        self.updated_at = now;
        Ok(())
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum InventoryError {
    #[error("Unknown seat(s): {}", .0.join(", "))]
    UnknownSeat(Vec<String>),

    #[error("Seat precondition failed for: {}", seats.join(", "))]
    PreconditionFailed { seats: Vec<String> },

    #[error("Invalid seat transition: {0}")]
    InvalidTransition(String),

    #[error("Invalid seat map: {0}")]
    InvalidSeatMap(String),

    #[error("Invalid trip: {0}")]
    InvalidTrip(String),
}
