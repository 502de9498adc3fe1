use coachline_catalog::Trip;
use coachline_core::repository::TripRepository;
use coachline_core::search::{TripAvailability, TripSearchQuery, TripSummary};
use coachline_core::{CoreResult, ReservationError};
use std::sync::Arc;
use uuid::Uuid;

/// Read-only trip queries. Seat counts are derived from the seat rows on
/// every call, nothing here is cached.
pub struct TripReader {
    trips: Arc<dyn TripRepository>,
}

impl TripReader {
    pub fn new(trips: Arc<dyn TripRepository>) -> Self {
        Self { trips }
    }

    pub async fn search(&self, query: &TripSearchQuery) -> CoreResult<Vec<TripSummary>> {
        let trips = self.trips.search_trips(query).await?;
        Ok(trips.iter().map(TripSummary::from).collect())
    }

    pub async fn availability(&self, trip_id: Uuid) -> CoreResult<TripAvailability> {
        let trip = self.detail(trip_id).await?;
        Ok(TripAvailability::from(&trip))
    }

    /// Full seat map, including which booking owns each seat.
    pub async fn detail(&self, trip_id: Uuid) -> CoreResult<Trip> {
        self.trips.get_trip(trip_id).await?.ok_or(ReservationError::UnknownTrip(trip_id))
    }
}
