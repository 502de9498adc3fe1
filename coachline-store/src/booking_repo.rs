use crate::database::{decode_error, store_error};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use coachline_core::booking::{Booking, BookingGuard, BookingStatus, CancellationReason, Passenger, PaymentStatus};
use coachline_core::repository::{BookingRepository, StoreError};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

pub struct PostgresBookingRepository {
    pool: PgPool,
}

impl PostgresBookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    customer_id: String,
    trip_id: Uuid,
    passengers: Json<Vec<Passenger>>,
    status: String,
    payment_status: String,
    held_until: Option<DateTime<Utc>>,
    total_amount: i64,
    currency: String,
    payment_method: Option<String>,
    payment_reference: Option<String>,
    ticket_code: Option<String>,
    cancellation_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = StoreError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        let cancellation_reason = row
            .cancellation_reason
            .map(|r| r.parse::<CancellationReason>())
            .transpose()
            .map_err(|e| decode_error("bookings.cancellation_reason", e))?;

        Ok(Booking {
            id: row.id,
            customer_id: row.customer_id,
            trip_id: row.trip_id,
            passengers: row.passengers.0,
            status: row.status.parse::<BookingStatus>().map_err(|e| decode_error("bookings.status", e))?,
            payment_status: row
                .payment_status
                .parse::<PaymentStatus>()
                .map_err(|e| decode_error("bookings.payment_status", e))?,
            held_until: row.held_until,
            total_amount: row.total_amount,
            currency: row.currency,
            payment_method: row.payment_method,
            payment_reference: row.payment_reference,
            ticket_code: row.ticket_code,
            cancellation_reason,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const BOOKING_COLUMNS: &str = "id, customer_id, trip_id, passengers, status, payment_status, held_until, \
     total_amount, currency, payment_method, payment_reference, ticket_code, cancellation_reason, \
     created_at, updated_at";

fn into_bookings(rows: Vec<BookingRow>) -> Result<Vec<Booking>, StoreError> {
    rows.into_iter().map(Booking::try_from).collect()
}

#[async_trait]
impl BookingRepository for PostgresBookingRepository {
    async fn insert_booking(&self, booking: &Booking) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO bookings (id, customer_id, trip_id, passengers, status, payment_status, held_until,
                                  total_amount, currency, payment_method, payment_reference, ticket_code,
                                  cancellation_reason, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(booking.id)
        .bind(&booking.customer_id)
        .bind(booking.trip_id)
        .bind(Json(&booking.passengers))
        .bind(booking.status.as_str())
        .bind(booking.payment_status.as_str())
        .bind(booking.held_until)
        .bind(booking.total_amount)
        .bind(&booking.currency)
        .bind(&booking.payment_method)
        .bind(&booking.payment_reference)
        .bind(&booking.ticket_code)
        .bind(booking.cancellation_reason.map(|r| r.as_str()))
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            let duplicate = matches!(&e, sqlx::Error::Database(db) if db.constraint() == Some("bookings_pkey"));
            if duplicate {
                StoreError::DuplicateBooking(booking.id)
            } else {
                store_error(e)
            }
        })?;

        Ok(())
    }

    async fn get_booking(&self, id: Uuid) -> Result<Option<Booking>, StoreError> {
        let sql = format!("SELECT {} FROM bookings WHERE id = $1", BOOKING_COLUMNS);
        let row = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;

        row.map(Booking::try_from).transpose()
    }

    async fn list_customer_bookings(&self, customer_id: &str) -> Result<Vec<Booking>, StoreError> {
        let sql = format!(
            "SELECT {} FROM bookings WHERE customer_id = $1 ORDER BY created_at",
            BOOKING_COLUMNS
        );
        let rows = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(customer_id)
            .fetch_all(&self.pool)
            .await
            .map_err(store_error)?;

        into_bookings(rows)
    }

    async fn list_expired_holds(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<Booking>, StoreError> {
        let sql = format!(
            "SELECT {} FROM bookings WHERE status = $1 AND held_until <= $2 ORDER BY held_until LIMIT $3",
            BOOKING_COLUMNS
        );
        let rows = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(BookingStatus::Held.as_str())
            .bind(now)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(store_error)?;

        into_bookings(rows)
    }

    async fn replace_if(&self, guard: &BookingGuard, next: &Booking) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET status = $2,
                payment_status = $3,
                held_until = $4,
                payment_method = $5,
                payment_reference = $6,
                ticket_code = $7,
                cancellation_reason = $8,
                updated_at = $9
            WHERE id = $1
              AND status = $10
              AND held_until IS NOT DISTINCT FROM $11
            "#,
        )
        .bind(guard.booking_id)
        .bind(next.status.as_str())
        .bind(next.payment_status.as_str())
        .bind(next.held_until)
        .bind(&next.payment_method)
        .bind(&next.payment_reference)
        .bind(&next.ticket_code)
        .bind(next.cancellation_reason.map(|r| r.as_str()))
        .bind(next.updated_at)
        .bind(guard.status.as_str())
        .bind(guard.held_until)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(result.rows_affected() == 1)
    }
}
