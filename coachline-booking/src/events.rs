use coachline_shared::BookingEvent;
use tokio::sync::broadcast;
use tracing::{debug, info};

const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out of booking lifecycle events.
///
/// Publishing never fails the operation that produced the event: with no
/// subscribers the event is dropped, and slow subscribers see `Lagged`.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<BookingEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn publish(&self, event: BookingEvent) {
        let topic = event.topic();
        let booking_id = event.booking_id();
        match self.tx.send(event) {
            Ok(receivers) => info!("Published {} for booking {} to {} subscriber(s)", topic, booking_id, receivers),
            Err(_) => debug!("No subscribers for {} (booking {})", topic, booking_id),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BookingEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
