use crate::BookingContext;
use chrono::{DateTime, Utc};
use coachline_catalog::SeatTransition;
use coachline_core::booking::Booking;
use coachline_core::repository::StoreError;
use coachline_core::CoreResult;
use coachline_shared::{BookingEvent, HoldExpiredEvent};
use std::future::Future;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub examined: usize,
    pub expired: usize,
    /// Bookings that another writer resolved first.
    pub skipped: usize,
    pub failed: usize,
}

/// Reclaims seats from holds whose `held_until` has passed.
///
/// Safe to run from several processes at once: seats are released with a
/// conditional transition and the booking is only marked expired if it still
/// carries the status and expiry the sweeper read.
pub struct ExpirySweeper {
    ctx: BookingContext,
    interval: Duration,
    batch_size: usize,
}

enum Outcome {
    Expired,
    Skipped,
}

impl ExpirySweeper {
    pub fn new(ctx: BookingContext, interval: Duration, batch_size: usize) -> Self {
        Self {
            ctx,
            interval,
            batch_size: batch_size.max(1),
        }
    }

    pub async fn sweep_once(&self) -> CoreResult<SweepReport> {
        let now = self.ctx.clock.now();
        let due = self.ctx.bookings.list_expired_holds(now, self.batch_size).await?;

        let mut report = SweepReport { examined: due.len(), ..SweepReport::default() };
        for booking in &due {
            match self.expire(booking, now).await {
                Ok(Outcome::Expired) => report.expired += 1,
                Ok(Outcome::Skipped) => report.skipped += 1,
                Err(e) => {
                    error!("Failed to expire booking {}: {}", booking.id, e);
                    report.failed += 1;
                }
            }
        }

        if report.examined > 0 {
            info!(
                "Expiry sweep: {} due, {} expired, {} skipped, {} failed",
                report.examined, report.expired, report.skipped, report.failed
            );
        }
        Ok(report)
    }

    async fn expire(&self, booking: &Booking, now: DateTime<Utc>) -> Result<Outcome, StoreError> {
        let mut expired = booking.clone();
        if expired.expire(now).is_err() {
            return Ok(Outcome::Skipped);
        }

        let seats = booking.seat_numbers();
        let release = SeatTransition::release(seats.clone(), booking.id);

        match self.ctx.trips.apply_seat_transition(booking.trip_id, &release, now).await {
            Ok(()) => {
                match self.ctx.bookings.replace_if(&booking.guard(), &expired).await {
                    Ok(true) => {}
                    Ok(false) => {
                        debug!("Booking {} changed under the sweeper", booking.id);
                        return Ok(Outcome::Skipped);
                    }
                    Err(e) => {
                        let rehold = SeatTransition::hold(seats, booking.id);
                        if let Err(undo) = self.ctx.trips.apply_seat_transition(booking.trip_id, &rehold, now).await {
                            warn!("Seats of booking {} stay released: {}", booking.id, undo);
                        }
                        return Err(e);
                    }
                }
            }
            Err(e) if e.is_precondition_failure() => {
                // seats released earlier without the booking write landing
                let stranded = self.seats_gone(booking).await?
                    && self.ctx.bookings.replace_if(&booking.guard(), &expired).await?;
                if !stranded {
                    debug!("Booking {} already resolved, not expiring: {}", booking.id, e);
                    return Ok(Outcome::Skipped);
                }
                warn!("Booking {} no longer owned its seats, expired the record only", booking.id);
            }
            Err(e @ (StoreError::TripNotFound(_) | StoreError::Inventory(_))) => {
                warn!("Booking {} references seats that cannot be released: {}", booking.id, e);
                if !self.ctx.bookings.replace_if(&booking.guard(), &expired).await? {
                    return Ok(Outcome::Skipped);
                }
            }
            Err(e) => return Err(e),
        }

        debug!("Booking {} expired, seats {:?} released", booking.id, seats);
        self.ctx.events.publish(BookingEvent::HoldExpired(HoldExpiredEvent {
            trip_id: booking.trip_id,
            booking_id: booking.id,
            seat_numbers: seats,
            timestamp: now.timestamp(),
        }));
        Ok(Outcome::Expired)
    }

    /// True when none of the booking's seats still reference it.
    async fn seats_gone(&self, booking: &Booking) -> Result<bool, StoreError> {
        let trip = self
            .ctx
            .trips
            .get_trip(booking.trip_id)
            .await?
            .ok_or(StoreError::TripNotFound(booking.trip_id))?;
        Ok(trip.seats_owned_by(booking.id).is_empty())
    }

    /// Sweep on every tick until `shutdown` resolves.
    pub async fn run<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!("Expiry sweeper started, interval {:?}", self.interval);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Expiry sweeper shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep_once().await {
                        error!("Expiry sweep failed: {}", e);
                    }
                }
            }
        }
    }
}
