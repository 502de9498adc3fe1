pub mod events;
pub mod hold;
pub mod lifecycle;
pub mod reader;
pub mod sweeper;
pub mod tickets;

#[cfg(test)]
pub(crate) mod testing;

use coachline_core::clock::Clock;
use coachline_core::repository::{BookingRepository, TripRepository};
use std::sync::Arc;

pub use events::EventBus;
pub use hold::{HoldManager, HoldReceipt, HoldRequest};
pub use lifecycle::{BookingLifecycle, PaymentConfirmation};
pub use reader::TripReader;
pub use sweeper::{ExpirySweeper, SweepReport};
pub use tickets::TicketIssuer;

/// Collaborators shared by every booking component.
#[derive(Clone)]
pub struct BookingContext {
    pub trips: Arc<dyn TripRepository>,
    pub bookings: Arc<dyn BookingRepository>,
    pub clock: Arc<dyn Clock>,
    pub events: EventBus,
}

impl BookingContext {
    pub fn new(
        trips: Arc<dyn TripRepository>,
        bookings: Arc<dyn BookingRepository>,
        clock: Arc<dyn Clock>,
        events: EventBus,
    ) -> Self {
        Self { trips, bookings, clock, events }
    }
}
