pub mod trip;
pub mod seat_map;
pub mod inventory;

pub use trip::{Seat, SeatStatus, Trip, TripStatus};
pub use seat_map::{NewTrip, SeatMapDefinition};
pub use inventory::{InventoryError, SeatTransition};
