use anyhow::Context;
use coachline_service::ReservationService;
use coachline_store::Config;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "coachline=info,coachline_booking=debug,coachline_store=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    info!(
        "Starting coachline reservation core ({:?} storage, {}s holds)",
        config.storage.backend, config.reservations.hold_seconds
    );

    let service = ReservationService::from_config(&config)
        .await
        .context("Failed to initialise storage")?;

    // Seat-map listeners live outside this process; log what they would see
    let mut events = service.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => debug!("{} trip={} booking={}", event.topic(), event.trip_id(), event.booking_id()),
                Err(RecvError::Lagged(missed)) => warn!("Event log fell behind, {} events dropped", missed),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let sweeper = service.sweeper();
    let worker = tokio::spawn(async move {
        sweeper
            .run(async {
                let _ = shutdown_rx.await;
            })
            .await;
    });

    tokio::signal::ctrl_c().await.context("Failed to listen for ctrl-c")?;
    info!("Shutdown requested");
    let _ = shutdown_tx.send(());
    worker.await.context("Expiry sweeper task failed")?;

    Ok(())
}
