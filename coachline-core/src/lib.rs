pub mod booking;
pub mod clock;
pub mod identity;
pub mod repository;
pub mod search;

use coachline_catalog::InventoryError;
use repository::StoreError;
use uuid::Uuid;

pub use booking::{Booking, BookingGuard, BookingStatus, CancellationReason, Passenger, PaymentStatus};
pub use clock::{Clock, ManualClock, SystemClock};
pub use identity::{Capability, Principal, Role};

/// Errors surfaced to callers of the reservation core.
///
/// Seat-transition precondition failures are recovered into these kinds and
/// returned as-is; nothing in the core retries them.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ReservationError {
    #[error("Trip not found: {0}")]
    UnknownTrip(Uuid),

    #[error("Unknown seat(s): {}", .0.join(", "))]
    UnknownSeat(Vec<String>),

    #[error("Booking not found: {0}")]
    UnknownBooking(Uuid),

    #[error("Seat(s) no longer available: {}", seats.join(", "))]
    SeatUnavailable { seats: Vec<String> },

    #[error("Booking {0} is no longer held")]
    BookingNoLongerHeld(Uuid),

    #[error("Invalid booking transition from {from} to {to}")]
    InvalidTransition { from: BookingStatus, to: BookingStatus },

    #[error("Hold on booking {0} has expired")]
    ExpiredHold(Uuid),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),
}

pub type CoreResult<T> = Result<T, ReservationError>;

impl From<InventoryError> for ReservationError {
    fn from(err: InventoryError) -> Self {
        match err {
            InventoryError::UnknownSeat(seats) => ReservationError::UnknownSeat(seats),
            InventoryError::PreconditionFailed { seats } => ReservationError::SeatUnavailable { seats },
            other => ReservationError::ValidationFailed(other.to_string()),
        }
    }
}

impl From<StoreError> for ReservationError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::TripNotFound(id) => ReservationError::UnknownTrip(id),
            StoreError::Inventory(e) => e.into(),
            StoreError::DuplicateBooking(id) => {
                ReservationError::StorageUnavailable(format!("booking {} already exists", id))
            }
            StoreError::Unavailable(msg) | StoreError::Decode(msg) => ReservationError::StorageUnavailable(msg),
        }
    }
}
