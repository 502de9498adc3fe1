pub mod app_config;
pub mod database;
pub mod memory;
pub mod trip_repo;
pub mod booking_repo;

pub use app_config::{Config, ReservationRules, StorageBackend, StorageConfig};
pub use database::DbClient;
pub use memory::MemoryStore;
pub use trip_repo::PostgresTripRepository;
pub use booking_repo::PostgresBookingRepository;
