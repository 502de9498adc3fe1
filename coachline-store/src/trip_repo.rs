use crate::database::{decode_error, store_error};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use coachline_catalog::{InventoryError, Seat, SeatStatus, SeatTransition, Trip, TripStatus};
use coachline_core::repository::{StoreError, TripRepository};
use coachline_core::search::TripSearchQuery;
use sqlx::PgPool;
use std::collections::HashMap;
use tracing::{debug, info};
use uuid::Uuid;

pub struct PostgresTripRepository {
    pool: PgPool,
}

impl PostgresTripRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn seats_for(&self, trip_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<Seat>>, StoreError> {
        let rows = sqlx::query_as::<_, SeatRow>(
            r#"
            SELECT trip_id, seat_number, status, booking_id
            FROM trip_seats
            WHERE trip_id = ANY($1)
            ORDER BY trip_id, position
            "#,
        )
        .bind(trip_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;

        let mut by_trip: HashMap<Uuid, Vec<Seat>> = HashMap::new();
        for row in rows {
            let trip_id = row.trip_id;
            by_trip.entry(trip_id).or_default().push(row.into_seat()?);
        }
        Ok(by_trip)
    }

    /// Work out why a conditional update touched fewer rows than requested.
    async fn diagnose_rejection(&self, trip_id: Uuid, transition: &SeatTransition) -> StoreError {
        let exists: Result<bool, sqlx::Error> = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM trips WHERE id = $1)")
            .bind(trip_id)
            .fetch_one(&self.pool)
            .await;
        match exists {
            Ok(false) => return StoreError::TripNotFound(trip_id),
            Ok(true) => {}
            Err(e) => return store_error(e),
        }

        let seats = match self.seats_for(&[trip_id]).await {
            Ok(mut by_trip) => by_trip.remove(&trip_id).unwrap_or_default(),
            Err(e) => return e,
        };

        match transition.check(&seats) {
            Err(e) => e.into(),
            // the conflicting writer has already moved on; report every requested seat
            Ok(()) => InventoryError::PreconditionFailed { seats: transition.seat_numbers.clone() }.into(),
        }
    }
}

#[derive(sqlx::FromRow)]
struct TripRow {
    id: Uuid,
    origin: String,
    destination: String,
    departure_time: DateTime<Utc>,
    expected_arrival_time: DateTime<Utc>,
    price_amount: i64,
    currency: String,
    company_id: Option<Uuid>,
    vehicle_id: Option<Uuid>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TripRow {
    fn into_trip(self, seats: Vec<Seat>) -> Result<Trip, StoreError> {
        Ok(Trip {
            id: self.id,
            origin: self.origin,
            destination: self.destination,
            departure_time: self.departure_time,
            expected_arrival_time: self.expected_arrival_time,
            price_amount: self.price_amount,
            currency: self.currency,
            company_id: self.company_id,
            vehicle_id: self.vehicle_id,
            status: self.status.parse::<TripStatus>().map_err(|e| decode_error("trips.status", e))?,
            seats,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SeatRow {
    trip_id: Uuid,
    seat_number: String,
    status: String,
    booking_id: Option<Uuid>,
}

impl SeatRow {
    fn into_seat(self) -> Result<Seat, StoreError> {
        Ok(Seat {
            seat_number: self.seat_number,
            status: self.status.parse::<SeatStatus>().map_err(|e| decode_error("trip_seats.status", e))?,
            booking_id: self.booking_id,
        })
    }
}

const TRIP_COLUMNS: &str =
    "id, origin, destination, departure_time, expected_arrival_time, price_amount, currency, company_id, vehicle_id, \
     status, created_at, updated_at";

fn like_pattern(term: &str) -> String {
    let escaped = term.trim().replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
    format!("%{}%", escaped)
}

#[async_trait]
impl TripRepository for PostgresTripRepository {
    async fn insert_trip(&self, trip: &Trip) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(store_error)?;

        sqlx::query(
            r#"
            INSERT INTO trips (id, origin, destination, departure_time, expected_arrival_time, price_amount, currency,
                               company_id, vehicle_id, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(trip.id)
        .bind(&trip.origin)
        .bind(&trip.destination)
        .bind(trip.departure_time)
        .bind(trip.expected_arrival_time)
        .bind(trip.price_amount)
        .bind(&trip.currency)
        .bind(trip.company_id)
        .bind(trip.vehicle_id)
        .bind(trip.status.as_str())
        .bind(trip.created_at)
        .bind(trip.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(store_error)?;

        for (position, seat) in trip.seats.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO trip_seats (trip_id, seat_number, position, status, booking_id)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(trip.id)
            .bind(&seat.seat_number)
            .bind(position as i32)
            .bind(seat.status.as_str())
            .bind(seat.booking_id)
            .execute(&mut *tx)
            .await
            .map_err(store_error)?;
        }

        tx.commit().await.map_err(store_error)?;
        info!("Trip {} stored with {} seats", trip.id, trip.seats.len());
        Ok(())
    }

    async fn get_trip(&self, id: Uuid) -> Result<Option<Trip>, StoreError> {
        let sql = format!("SELECT {} FROM trips WHERE id = $1", TRIP_COLUMNS);
        let row = sqlx::query_as::<_, TripRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let seats = self.seats_for(&[id]).await?.remove(&id).unwrap_or_default();
        row.into_trip(seats).map(Some)
    }

    async fn search_trips(&self, query: &TripSearchQuery) -> Result<Vec<Trip>, StoreError> {
        let sql = format!(
            r#"
            SELECT {}
            FROM trips
            WHERE status = 'scheduled'
              AND origin ILIKE $1
              AND destination ILIKE $2
              AND (departure_time AT TIME ZONE 'UTC')::date = $3
            ORDER BY departure_time
            "#,
            TRIP_COLUMNS
        );
        let rows = sqlx::query_as::<_, TripRow>(&sql)
            .bind(like_pattern(&query.from))
            .bind(like_pattern(&query.to))
            .bind(query.date)
            .fetch_all(&self.pool)
            .await
            .map_err(store_error)?;

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut seats = self.seats_for(&ids).await?;

        rows.into_iter()
            .map(|row| {
                let trip_seats = seats.remove(&row.id).unwrap_or_default();
                row.into_trip(trip_seats)
            })
            .collect()
    }

    async fn apply_seat_transition(
        &self,
        trip_id: Uuid,
        transition: &SeatTransition,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        transition.validate()?;

        let mut tx = self.pool.begin().await.map_err(store_error)?;

        // Row locks taken by the UPDATE make concurrent writers re-check the
        // WHERE clause against the committed row, so only one of them matches.
        let result = sqlx::query(
            r#"
            UPDATE trip_seats
            SET status = $1, booking_id = $2
            WHERE trip_id = $3
              AND seat_number = ANY($4)
              AND status = $5
              AND booking_id IS NOT DISTINCT FROM $6
            "#,
        )
        .bind(transition.target.as_str())
        .bind(transition.booking_id)
        .bind(trip_id)
        .bind(&transition.seat_numbers)
        .bind(transition.expected.as_str())
        .bind(transition.expected_booking)
        .execute(&mut *tx)
        .await
        .map_err(store_error)?;

        if result.rows_affected() != transition.seat_numbers.len() as u64 {
            tx.rollback().await.map_err(store_error)?;
            let rejection = self.diagnose_rejection(trip_id, transition).await;
            debug!("Seat transition on trip {} rejected: {}", trip_id, rejection);
            return Err(rejection);
        }

        sqlx::query("UPDATE trips SET updated_at = $1 WHERE id = $2")
            .bind(now)
            .bind(trip_id)
            .execute(&mut *tx)
            .await
            .map_err(store_error)?;

        tx.commit().await.map_err(store_error)?;
        Ok(())
    }
}
