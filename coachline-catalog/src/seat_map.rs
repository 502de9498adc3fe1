use crate::inventory::InventoryError;
use crate::trip::{Seat, Trip, TripStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::warn;
use uuid::Uuid;

/// Vehicle seat-map layout supplied by the provisioning collaborator.
///
/// `layout` is row-major; empty cells and `"null"` mark aisles. When the
/// layout is empty the vehicle only declares `total_seats`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeatMapDefinition {
    #[serde(default)]
    pub rows: u32,
    #[serde(default)]
    pub cols: u32,
    #[serde(default)]
    pub layout: Vec<Vec<String>>,
    #[serde(default)]
    pub total_seats: u32,
}

impl SeatMapDefinition {
    pub fn with_layout(layout: Vec<Vec<String>>) -> Self {
        let rows = layout.len() as u32;
        let cols = layout.iter().map(|r| r.len()).max().unwrap_or(0) as u32;
        Self {
            rows,
            cols,
            layout,
            total_seats: 0,
        }
    }

    pub fn with_total_seats(total_seats: u32) -> Self {
        Self {
            total_seats,
            ..Self::default()
        }
    }

    /// Seat numbers in layout order, each exactly once.
    pub fn seat_numbers(&self) -> Result<Vec<String>, InventoryError> {
        let from_layout: Vec<String> = self
            .layout
            .iter()
            .flatten()
            .map(|cell| cell.trim())
            .filter(|cell| !cell.is_empty() && *cell != "null")
            .map(str::to_string)
            .collect();

        if !from_layout.is_empty() {
            let mut seen = HashSet::new();
            for number in &from_layout {
                if !seen.insert(number.as_str()) {
                    return Err(InventoryError::InvalidSeatMap(format!(
                        "seat number {} appears more than once",
                        number
                    )));
                }
            }
            return Ok(from_layout);
        }

        if self.total_seats == 0 {
            return Err(InventoryError::InvalidSeatMap(
                "vehicle has no seat map layout or total seats defined".to_string(),
            ));
        }

        warn!(
            "Seat map has no detailed layout, generating {} generic seat numbers",
            self.total_seats
        );
        Ok((1..=self.total_seats).map(|i| format!("S{}", i)).collect())
    }
}

/// Trip provisioning input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTrip {
    pub origin: String,
    pub destination: String,
    pub departure_time: DateTime<Utc>,
    pub expected_arrival_time: DateTime<Utc>,
    pub price_amount: i64,
    pub currency: String,
    /// Operating company and vehicle, kept as plain references.
    #[serde(default)]
    pub company_id: Option<Uuid>,
    #[serde(default)]
    pub vehicle_id: Option<Uuid>,
    pub seat_map: SeatMapDefinition,
}

impl Trip {
    /// Build a scheduled trip whose seats are all `Available`.
    pub fn provision(new_trip: NewTrip, now: DateTime<Utc>) -> Result<Trip, InventoryError> {
        if new_trip.origin.trim().is_empty() || new_trip.destination.trim().is_empty() {
            return Err(InventoryError::InvalidTrip(
                "route origin and destination names are required".to_string(),
            ));
        }
        if new_trip.price_amount <= 0 {
            return Err(InventoryError::InvalidTrip("price must be positive".to_string()));
        }
        if new_trip.departure_time >= new_trip.expected_arrival_time {
            return Err(InventoryError::InvalidTrip(
                "departure time must be before expected arrival time".to_string(),
            ));
        }

        let seats = new_trip
            .seat_map
            .seat_numbers()?
            .into_iter()
            .map(Seat::available)
            .collect();

        Ok(Trip {
            id: Uuid::new_v4(),
            origin: new_trip.origin,
            destination: new_trip.destination,
            departure_time: new_trip.departure_time,
            expected_arrival_time: new_trip.expected_arrival_time,
            price_amount: new_trip.price_amount,
            currency: new_trip.currency,
            company_id: new_trip.company_id,
            vehicle_id: new_trip.vehicle_id,
            status: TripStatus::Scheduled,
            seats,
            created_at: now,
            updated_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trip::SeatStatus;
    use chrono::Duration;

    fn coach_layout() -> Vec<Vec<String>> {
        // 10 rows of 2 + aisle + 2
        (1..=10)
            .map(|row| {
                vec![
                    format!("A{}", row),
                    format!("B{}", row),
                    String::new(),
                    format!("C{}", row),
                    format!("D{}", row),
                ]
            })
            .collect()
    }

    fn new_trip(seat_map: SeatMapDefinition) -> NewTrip {
        let departure = Utc::now() + Duration::days(2);
        NewTrip {
            origin: "Ha Noi".to_string(),
            destination: "Hai Phong".to_string(),
            departure_time: departure,
            expected_arrival_time: departure + Duration::hours(2),
            price_amount: 150_000,
            currency: "VND".to_string(),
            company_id: Some(Uuid::new_v4()),
            vehicle_id: Some(Uuid::new_v4()),
            seat_map,
        }
    }

    #[test]
    fn test_forty_seat_layout() {
        let trip = Trip::provision(new_trip(SeatMapDefinition::with_layout(coach_layout())), Utc::now()).unwrap();

        assert_eq!(trip.total_seats(), 40);
        assert!(trip.company_id.is_some() && trip.vehicle_id.is_some());
        assert!(trip.seats.iter().all(|s| s.status == SeatStatus::Available && s.booking_id.is_none()));

        let expected: Vec<String> = coach_layout().into_iter().flatten().filter(|c| !c.is_empty()).collect();
        let actual: Vec<String> = trip.seats.iter().map(|s| s.seat_number.clone()).collect();
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_null_cells_are_aisles() {
        let layout = vec![vec!["1A".to_string(), "null".to_string(), "1B".to_string()]];
        let numbers = SeatMapDefinition::with_layout(layout).seat_numbers().unwrap();
        assert_eq!(numbers, vec!["1A", "1B"]);
    }

    #[test]
    fn test_generic_seats_from_total() {
        let numbers = SeatMapDefinition::with_total_seats(3).seat_numbers().unwrap();
        assert_eq!(numbers, vec!["S1", "S2", "S3"]);
    }

    #[test]
    fn test_empty_seat_map_rejected() {
        let err = SeatMapDefinition::default().seat_numbers().unwrap_err();
        assert!(matches!(err, InventoryError::InvalidSeatMap(_)));
    }

    #[test]
    fn test_duplicate_layout_seat_rejected() {
        let layout = vec![vec!["A1".to_string(), "A1".to_string()]];
        let err = SeatMapDefinition::with_layout(layout).seat_numbers().unwrap_err();
        assert!(matches!(err, InventoryError::InvalidSeatMap(_)));
    }

    #[test]
    fn test_trip_validation() {
        let mut bad_price = new_trip(SeatMapDefinition::with_total_seats(4));
        bad_price.price_amount = 0;
        assert!(matches!(Trip::provision(bad_price, Utc::now()), Err(InventoryError::InvalidTrip(_))));

        let mut backwards = new_trip(SeatMapDefinition::with_total_seats(4));
        backwards.expected_arrival_time = backwards.departure_time - Duration::hours(1);
        assert!(matches!(Trip::provision(backwards, Utc::now()), Err(InventoryError::InvalidTrip(_))));

        let mut no_origin = new_trip(SeatMapDefinition::with_total_seats(4));
        no_origin.origin = "  ".to_string();
        assert!(matches!(Trip::provision(no_origin, Utc::now()), Err(InventoryError::InvalidTrip(_))));
    }
}
