// src/services/sweeper_service.rs
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing;

use crate::clock::Clock;
use crate::errors::DispatchResult;
use crate::models::trip::{OfferStatus, RequestStatus, TripStatus};
use crate::state::EngineSettings;
use crate::store::MemoryStore;

/// Counters for one sweep cycle, surfaced in logs and tests.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepStats {
    pub offers_expired: usize,
    pub requests_expired: usize,
    pub no_shows_cancelled: usize,
}

/// Scheduled enforcement of time-based transitions: expired driver offers,
/// stale open requests and no-show accepted trips. Each matched document is
/// re-checked and written in its own transaction, so a failure on one
/// document never aborts the batch and a concurrent transition simply makes
/// the sweep a no-op for that document.
pub struct Sweeper {
    store: Arc<MemoryStore>,
    clock: Arc<dyn Clock>,
    settings: EngineSettings,
}

impl Sweeper {
    pub fn new(store: Arc<MemoryStore>, clock: Arc<dyn Clock>, settings: EngineSettings) -> Self {
        Self {
            store,
            clock,
            settings,
        }
    }

    /// One full sweep cycle. Synchronous from the caller's point of view so
    /// tests drive it directly; production wraps it in [`Sweeper::spawn`].
    pub async fn run_once(&self) -> SweepStats {
        let mut stats = SweepStats::default();
        stats.offers_expired = self.sweep_expired_offers().await;
        stats.requests_expired = self.sweep_stale_requests().await;
        stats.no_shows_cancelled = self.sweep_no_shows().await;
        if stats != SweepStats::default() {
            tracing::info!(
                offers_expired = stats.offers_expired,
                requests_expired = stats.requests_expired,
                no_shows_cancelled = stats.no_shows_cancelled,
                "sweep cycle applied timeouts"
            );
        }
        stats
    }

    /// Pending trips whose driver never answered inside the response
    /// window: offer `expired`, trip `no_driver_available`, driver released.
    async fn sweep_expired_offers(&self) -> usize {
        let now = self.clock.now();
        let candidates = self.store.pending_trips_with_expired_offer(now).await;
        let mut swept = 0;
        for candidate in candidates {
            let trip_id = candidate.id.clone();
            let result: DispatchResult<bool> = self
                .store
                .transact(move |txn| {
                    let trip = match txn.trip(&candidate.id) {
                        Some(t) if t.status == TripStatus::Pending => t.clone(),
                        _ => return Ok(false),
                    };
                    let offer = match txn.offer(&trip.driver_id, &trip.id) {
                        Some(o) if o.status == OfferStatus::Pending && o.expires_at <= now => {
                            o.clone()
                        }
                        _ => return Ok(false),
                    };

                    let mut offer = offer;
                    offer.status = OfferStatus::Expired;
                    txn.put_offer(offer);

                    let mut trip = trip;
                    trip.status = TripStatus::NoDriverAvailable;
                    let driver_id = trip.driver_id.clone();
                    txn.put_trip(trip);

                    if let Some(mut driver) = txn.driver(&driver_id).cloned() {
                        driver.current_trip_id = None;
                        driver.is_available = driver.is_online;
                        driver.updated_at = now;
                        txn.put_driver(driver);
                    }
                    Ok(true)
                })
                .await;
            match result {
                Ok(true) => {
                    tracing::info!(trip_id = %trip_id, "offer expired, trip closed without a driver");
                    swept += 1;
                }
                Ok(false) => {}
                Err(err) => {
                    tracing::error!(trip_id = %trip_id, error = %err, "offer expiry sweep failed for document");
                }
            }
        }
        swept
    }

    /// Open requests older than the search window move to `expired`.
    async fn sweep_stale_requests(&self) -> usize {
        let now = self.clock.now();
        let cutoff = now - self.settings.search_timeout;
        let candidates = self.store.open_requests_before(cutoff).await;
        let mut swept = 0;
        for candidate in candidates {
            let request_id = candidate.id.clone();
            let result: DispatchResult<bool> = self
                .store
                .transact(move |txn| {
                    let mut request = match txn.trip_request(&candidate.id) {
                        Some(r)
                            if r.status == RequestStatus::Open && r.created_at < cutoff =>
                        {
                            r.clone()
                        }
                        _ => return Ok(false),
                    };
                    request.status = RequestStatus::Expired;
                    request.expiry_reason = Some("no_driver_found".to_string());
                    txn.put_trip_request(request);
                    Ok(true)
                })
                .await;
            match result {
                Ok(true) => {
                    tracing::info!(request_id = %request_id, "unmatched trip request expired");
                    swept += 1;
                }
                Ok(false) => {}
                Err(err) => {
                    tracing::error!(request_id = %request_id, error = %err, "request expiry sweep failed for document");
                }
            }
        }
        swept
    }

    /// Accepted trips whose driver never arrived inside the arrival window:
    /// system cancellation and driver release.
    async fn sweep_no_shows(&self) -> usize {
        let now = self.clock.now();
        let cutoff = now - self.settings.driver_arrival_timeout;
        let candidates = self.store.accepted_trips_before(cutoff).await;
        let mut swept = 0;
        for candidate in candidates {
            let trip_id = candidate.id.clone();
            let result: DispatchResult<bool> = self
                .store
                .transact(move |txn| {
                    let mut trip = match txn.trip(&candidate.id) {
                        Some(t)
                            if t.status == TripStatus::Accepted
                                && t.accepted_at.map(|at| at < cutoff).unwrap_or(false) =>
                        {
                            t.clone()
                        }
                        _ => return Ok(false),
                    };
                    trip.status = TripStatus::CancelledBySystem;
                    trip.cancelled_at = Some(now);
                    trip.cancellation_reason = Some("driver_no_show".to_string());
                    trip.cancelled_by = Some("system".to_string());
                    let driver_id = trip.driver_id.clone();
                    txn.put_trip(trip);

                    if let Some(mut driver) = txn.driver(&driver_id).cloned() {
                        driver.current_trip_id = None;
                        driver.is_available = driver.is_online;
                        driver.updated_at = now;
                        txn.put_driver(driver);
                    }
                    Ok(true)
                })
                .await;
            match result {
                Ok(true) => {
                    tracing::info!(trip_id = %trip_id, "no-show trip cancelled by system");
                    swept += 1;
                }
                Ok(false) => {}
                Err(err) => {
                    tracing::error!(trip_id = %trip_id, error = %err, "no-show sweep failed for document");
                }
            }
        }
        swept
    }

    /// Periodic driver for production. Each cycle gets one interval's worth
    /// of time budget; tests call [`Sweeper::run_once`] directly instead.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        let interval = self.settings.sweep_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if tokio::time::timeout(interval, self.run_once()).await.is_err() {
                    tracing::warn!("sweep cycle exceeded its time budget, resuming next tick");
                }
            }
        })
    }
}
