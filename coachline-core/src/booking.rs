use crate::{CoreResult, ReservationError};
use chrono::{DateTime, Utc};
use coachline_shared::Masked;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Booking status in the reservation lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Held,
    Confirmed,
    Cancelled,
    Expired,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Held => "held",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Expired => "expired",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingStatus::Confirmed | BookingStatus::Cancelled | BookingStatus::Expired
        )
    }

    /// The only legal edges: pending -> held, held -> {confirmed, cancelled, expired}.
    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        matches!(
            (self, next),
            (BookingStatus::Pending, BookingStatus::Held)
                | (BookingStatus::Held, BookingStatus::Confirmed)
                | (BookingStatus::Held, BookingStatus::Cancelled)
                | (BookingStatus::Held, BookingStatus::Expired)
        )
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BookingStatus::Pending),
            "held" => Ok(BookingStatus::Held),
            "confirmed" => Ok(BookingStatus::Confirmed),
            "cancelled" => Ok(BookingStatus::Cancelled),
            "expired" => Ok(BookingStatus::Expired),
            other => Err(format!("unknown booking status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "paid" => Ok(PaymentStatus::Paid),
            "failed" => Ok(PaymentStatus::Failed),
            other => Err(format!("unknown payment status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CancellationReason {
    CustomerRequest,
    PaymentFailed,
    Administrative,
}

impl CancellationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CancellationReason::CustomerRequest => "customer_request",
            CancellationReason::PaymentFailed => "payment_failed",
            CancellationReason::Administrative => "administrative",
        }
    }
}

impl FromStr for CancellationReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer_request" => Ok(CancellationReason::CustomerRequest),
            "payment_failed" => Ok(CancellationReason::PaymentFailed),
            "administrative" => Ok(CancellationReason::Administrative),
            other => Err(format!("unknown cancellation reason: {}", other)),
        }
    }
}

/// One traveller and the seat assigned to them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Passenger {
    pub name: String,
    pub phone: Masked<String>,
    pub seat_number: String,
}

impl Passenger {
    pub fn new(name: impl Into<String>, phone: impl Into<String>, seat_number: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            phone: Masked(phone.into()),
            seat_number: seat_number.into(),
        }
    }
}

/// Snapshot used for conditional booking updates: a write only lands if the
/// stored booking still has this status and hold expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookingGuard {
    pub booking_id: Uuid,
    pub status: BookingStatus,
    pub held_until: Option<DateTime<Utc>>,
}

/// One reservation attempt by one customer for one trip.
///
/// Bookings are never deleted; cancelled and expired rows stay for audit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Booking {
    pub id: Uuid,
    pub customer_id: String,
    pub trip_id: Uuid,
    pub passengers: Vec<Passenger>,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    pub held_until: Option<DateTime<Utc>>,
    pub total_amount: i64,
    pub currency: String,
    pub payment_method: Option<String>,
    pub payment_reference: Option<String>,
    pub ticket_code: Option<String>,
    pub cancellation_reason: Option<CancellationReason>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn pending(
        id: Uuid,
        customer_id: String,
        trip_id: Uuid,
        passengers: Vec<Passenger>,
        total_amount: i64,
        currency: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            customer_id,
            trip_id,
            passengers,
            status: BookingStatus::Pending,
            payment_status: PaymentStatus::Pending,
            held_until: None,
            total_amount,
            currency,
            payment_method: None,
            payment_reference: None,
            ticket_code: None,
            cancellation_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Seat numbers referenced by the passenger list, in passenger order.
    pub fn seat_numbers(&self) -> Vec<String> {
        self.passengers.iter().map(|p| p.seat_number.clone()).collect()
    }

    pub fn guard(&self) -> BookingGuard {
        BookingGuard {
            booking_id: self.id,
            status: self.status,
            held_until: self.held_until,
        }
    }

    /// A hold is over once `held_until` is at or before `now`.
    pub fn is_hold_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == BookingStatus::Held && self.held_until.is_some_and(|until| until <= now)
    }

    pub fn place_on_hold(&mut self, held_until: DateTime<Utc>, now: DateTime<Utc>) -> CoreResult<()> {
        self.advance(BookingStatus::Held, now)?;
        self.held_until = Some(held_until);
        Ok(())
    }

    pub fn confirm(
        &mut self,
        ticket_code: String,
        payment_reference: String,
        payment_method: Option<String>,
        now: DateTime<Utc>,
    ) -> CoreResult<()> {
        self.advance(BookingStatus::Confirmed, now)?;
        self.held_until = None;
        self.payment_status = PaymentStatus::Paid;
        self.payment_reference = Some(payment_reference);
        self.payment_method = payment_method;
        self.ticket_code = Some(ticket_code);
        Ok(())
    }

    pub fn cancel(&mut self, reason: CancellationReason, now: DateTime<Utc>) -> CoreResult<()> {
        self.advance(BookingStatus::Cancelled, now)?;
        self.held_until = None;
        self.cancellation_reason = Some(reason);
        if reason == CancellationReason::PaymentFailed {
            self.payment_status = PaymentStatus::Failed;
        }
        Ok(())
    }

    pub fn expire(&mut self, now: DateTime<Utc>) -> CoreResult<()> {
        self.advance(BookingStatus::Expired, now)?;
        self.held_until = None;
        Ok(())
    }

    fn advance(&mut self, next: BookingStatus, now: DateTime<Utc>) -> CoreResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(ReservationError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = now;
        Ok(())
    }
}
