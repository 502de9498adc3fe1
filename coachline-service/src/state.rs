use coachline_core::repository::{BookingRepository, TripRepository};
use coachline_store::{DbClient, MemoryStore, PostgresBookingRepository, PostgresTripRepository, StorageBackend, StorageConfig};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("storage.database_url is required for the postgres backend")]
    MissingDatabaseUrl,

    #[error("Database connection failed: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// The two repositories the reservation core runs against.
#[derive(Clone)]
pub struct Storage {
    pub trips: Arc<dyn TripRepository>,
    pub bookings: Arc<dyn BookingRepository>,
}

impl Storage {
    pub fn memory() -> Self {
        let store = Arc::new(MemoryStore::new());
        Self {
            trips: store.clone(),
            bookings: store,
        }
    }

    pub async fn postgres(database_url: &str, max_connections: u32) -> Result<Self, StartupError> {
        let db = DbClient::new(database_url, max_connections).await?;
        db.migrate().await?;
        Ok(Self {
            trips: Arc::new(PostgresTripRepository::new(db.pool.clone())),
            bookings: Arc::new(PostgresBookingRepository::new(db.pool)),
        })
    }

    pub async fn connect(config: &StorageConfig) -> Result<Self, StartupError> {
        match config.backend {
            StorageBackend::Memory => {
                info!("Using in-memory storage; reservations are lost on restart");
                Ok(Self::memory())
            }
            StorageBackend::Postgres => {
                let url = config.database_url.as_deref().ok_or(StartupError::MissingDatabaseUrl)?;
                info!("Connecting to PostgreSQL (max {} connections)", config.max_connections);
                Self::postgres(url, config.max_connections).await
            }
        }
    }
}
