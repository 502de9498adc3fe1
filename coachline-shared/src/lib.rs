pub mod models;
pub mod pii;

pub use models::events::{
    BookingCancelledEvent, BookingConfirmedEvent, BookingEvent, HoldExpiredEvent, SeatsHeldEvent,
};
pub use pii::Masked;
