// src/services/trip_service.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing;

use crate::clock::Clock;
use crate::errors::{DispatchError, DispatchResult};
use crate::models::trip::{
    CompleteTripResponse, OfferStatus, RatingPayload, Trip, TripResponse, TripStatus,
};
use crate::services::payment_service;
use crate::store::{MemoryStore, StoreTxn};
use crate::utils::id_generator::{IdGenerator, IdType};

#[async_trait]
pub trait TripOperations: Send + Sync {
    async fn accept_offer(&self, driver_id: &str, trip_id: &str) -> DispatchResult<TripResponse>;
    async fn reject_offer(&self, driver_id: &str, trip_id: &str) -> DispatchResult<TripResponse>;
    async fn driver_arrived(&self, driver_id: &str, trip_id: &str) -> DispatchResult<TripResponse>;
    async fn start_trip(&self, driver_id: &str, trip_id: &str) -> DispatchResult<TripResponse>;
    async fn complete_trip(
        &self,
        driver_id: &str,
        trip_id: &str,
    ) -> DispatchResult<CompleteTripResponse>;
    async fn cancel_by_passenger(
        &self,
        passenger_id: &str,
        trip_id: &str,
    ) -> DispatchResult<TripResponse>;
    async fn cancel_by_driver(
        &self,
        driver_id: &str,
        trip_id: &str,
        reason: Option<String>,
    ) -> DispatchResult<TripResponse>;
    async fn force_cancel(
        &self,
        manager_id: &str,
        trip_id: &str,
        reason: Option<String>,
    ) -> DispatchResult<TripResponse>;
    async fn submit_rating(
        &self,
        passenger_id: &str,
        payload: RatingPayload,
    ) -> DispatchResult<TripResponse>;
}

/// The trip state machine. Every transition runs in one transaction that
/// reads the trip, checks the actor and the legal pre-states, applies the
/// status write with its timestamp, and couples the driver release and the
/// offer update to terminal moves.
pub struct TripService {
    store: Arc<MemoryStore>,
    clock: Arc<dyn Clock>,
}

fn check_trip_id(trip_id: &str) -> DispatchResult<()> {
    if !IdGenerator::validate_id(trip_id, Some(IdType::Trip)) {
        return Err(DispatchError::validation_error(
            "tripId",
            "malformed trip id",
        ));
    }
    Ok(())
}

fn load_trip(txn: &StoreTxn<'_>, trip_id: &str) -> DispatchResult<Trip> {
    txn.trip(trip_id)
        .cloned()
        .ok_or_else(|| DispatchError::trip_not_found(trip_id))
}

fn ensure_actor(caller: &str, expected: &str, role: &str) -> DispatchResult<()> {
    if caller != expected {
        return Err(DispatchError::forbidden(format!(
            "caller is not the {} of this trip",
            role
        )));
    }
    Ok(())
}

/// Wrong pre-state resolves races: the loser of a double accept reads the
/// winner's status here and fails with it in the message.
fn ensure_status(trip: &Trip, allowed: &[TripStatus]) -> DispatchResult<()> {
    if !allowed.contains(&trip.status) {
        return Err(DispatchError::forbidden(format!(
            "illegal transition for trip {}: current_state={}",
            trip.id, trip.status
        )));
    }
    Ok(())
}

/// Hand the driver back to the pool. `isAvailable` follows `isOnline`; a
/// driver who went offline mid-trip stays unavailable.
fn release_driver(txn: &mut StoreTxn<'_>, driver_id: &str, now: DateTime<Utc>) {
    if let Some(mut driver) = txn.driver(driver_id).cloned() {
        driver.current_trip_id = None;
        driver.is_available = driver.is_online;
        driver.updated_at = now;
        txn.put_driver(driver);
    }
}

/// Move a still-pending offer to `status` alongside the trip transition.
fn close_pending_offer(
    txn: &mut StoreTxn<'_>,
    driver_id: &str,
    trip_id: &str,
    status: OfferStatus,
) {
    if let Some(offer) = txn.offer(driver_id, trip_id) {
        if offer.status == OfferStatus::Pending {
            let mut offer = offer.clone();
            offer.status = status;
            txn.put_offer(offer);
        }
    }
}

impl TripService {
    pub fn new(store: Arc<MemoryStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    async fn cancel(
        &self,
        caller: &str,
        trip_id: &str,
        new_status: TripStatus,
        cancelled_by: &str,
        reason: Option<String>,
        allowed: &'static [TripStatus],
        actor_role: Option<&'static str>,
    ) -> DispatchResult<TripResponse> {
        check_trip_id(trip_id)?;
        let now = self.clock.now();
        let caller = caller.to_string();
        let trip_id = trip_id.to_string();
        let cancelled_by = cancelled_by.to_string();

        let trip = self
            .store
            .transact(move |txn| {
                let mut trip = load_trip(txn, &trip_id)?;
                match actor_role {
                    Some("passenger") => ensure_actor(&caller, &trip.passenger_id, "passenger")?,
                    Some("driver") => ensure_actor(&caller, &trip.driver_id, "driver")?,
                    _ => {}
                }
                ensure_status(&trip, allowed)?;

                trip.status = new_status;
                trip.cancelled_at = Some(now);
                trip.cancellation_reason = reason;
                trip.cancelled_by = Some(cancelled_by);

                let driver_id = trip.driver_id.clone();
                close_pending_offer(txn, &driver_id, &trip.id, OfferStatus::Cancelled);
                release_driver(txn, &driver_id, now);
                txn.put_trip(trip.clone());
                Ok(trip)
            })
            .await?;

        tracing::info!(trip_id = %trip.id, status = %trip.status, "trip cancelled");
        Ok(trip.into())
    }
}

const ACTIVE_STATUSES: &[TripStatus] = &[
    TripStatus::Pending,
    TripStatus::Accepted,
    TripStatus::DriverArrived,
    TripStatus::InProgress,
];

const CANCELLABLE_BY_PARTY: &[TripStatus] = &[TripStatus::Pending, TripStatus::Accepted];

#[async_trait]
impl TripOperations for TripService {
    async fn accept_offer(&self, driver_id: &str, trip_id: &str) -> DispatchResult<TripResponse> {
        check_trip_id(trip_id)?;
        let now = self.clock.now();
        let driver_id = driver_id.to_string();
        let trip_id = trip_id.to_string();

        let trip = self
            .store
            .transact(move |txn| {
                let mut trip = load_trip(txn, &trip_id)?;
                ensure_actor(&driver_id, &trip.driver_id, "driver")?;
                ensure_status(&trip, &[TripStatus::Pending])?;

                let mut offer = txn
                    .offer(&driver_id, &trip_id)
                    .cloned()
                    .ok_or_else(|| {
                        DispatchError::not_found(format!("offer not found for trip {}", trip_id))
                    })?;
                if offer.status != OfferStatus::Pending {
                    return Err(DispatchError::forbidden(format!(
                        "offer is no longer pending: {:?}",
                        offer.status
                    )));
                }

                trip.status = TripStatus::Accepted;
                trip.accepted_at = Some(now);
                offer.status = OfferStatus::Accepted;

                txn.put_trip(trip.clone());
                txn.put_offer(offer);
                Ok(trip)
            })
            .await?;

        tracing::info!(trip_id = %trip.id, driver_id = %trip.driver_id, "offer accepted");
        Ok(trip.into())
    }

    async fn reject_offer(&self, driver_id: &str, trip_id: &str) -> DispatchResult<TripResponse> {
        check_trip_id(trip_id)?;
        let now = self.clock.now();
        let driver_id = driver_id.to_string();
        let trip_id = trip_id.to_string();

        let (trip, mutated) = self
            .store
            .transact(move |txn| {
                let mut trip = load_trip(txn, &trip_id)?;
                ensure_actor(&driver_id, &trip.driver_id, "driver")?;

                let mut offer = txn
                    .offer(&driver_id, &trip_id)
                    .cloned()
                    .ok_or_else(|| {
                        DispatchError::not_found(format!("offer not found for trip {}", trip_id))
                    })?;
                if offer.status.is_terminal() {
                    // Retried or late reject: answer success without touching state
                    return Ok((trip, false));
                }
                ensure_status(&trip, &[TripStatus::Pending])?;

                offer.status = OfferStatus::Rejected;
                trip.status = TripStatus::NoDriverAvailable;

                txn.put_offer(offer);
                release_driver(txn, &driver_id, now);
                txn.put_trip(trip.clone());
                Ok((trip, true))
            })
            .await?;

        if mutated {
            tracing::info!(trip_id = %trip.id, driver_id = %trip.driver_id, "offer rejected");
        } else {
            tracing::debug!(trip_id = %trip.id, "reject on terminal offer, no-op");
        }
        Ok(trip.into())
    }

    async fn driver_arrived(&self, driver_id: &str, trip_id: &str) -> DispatchResult<TripResponse> {
        check_trip_id(trip_id)?;
        let now = self.clock.now();
        let driver_id = driver_id.to_string();
        let trip_id = trip_id.to_string();

        let trip = self
            .store
            .transact(move |txn| {
                let mut trip = load_trip(txn, &trip_id)?;
                ensure_actor(&driver_id, &trip.driver_id, "driver")?;
                ensure_status(&trip, &[TripStatus::Accepted])?;

                trip.status = TripStatus::DriverArrived;
                trip.arrived_at = Some(now);
                txn.put_trip(trip.clone());
                Ok(trip)
            })
            .await?;

        tracing::info!(trip_id = %trip.id, "driver arrived at pickup");
        Ok(trip.into())
    }

    async fn start_trip(&self, driver_id: &str, trip_id: &str) -> DispatchResult<TripResponse> {
        check_trip_id(trip_id)?;
        let now = self.clock.now();
        let driver_id = driver_id.to_string();
        let trip_id = trip_id.to_string();

        let trip = self
            .store
            .transact(move |txn| {
                let mut trip = load_trip(txn, &trip_id)?;
                ensure_actor(&driver_id, &trip.driver_id, "driver")?;
                ensure_status(&trip, &[TripStatus::DriverArrived])?;

                trip.status = TripStatus::InProgress;
                trip.started_at = Some(now);
                txn.put_trip(trip.clone());
                Ok(trip)
            })
            .await?;

        tracing::info!(trip_id = %trip.id, "trip started");
        Ok(trip.into())
    }

    async fn complete_trip(
        &self,
        driver_id: &str,
        trip_id: &str,
    ) -> DispatchResult<CompleteTripResponse> {
        check_trip_id(trip_id)?;
        let now = self.clock.now();
        let driver_id = driver_id.to_string();
        let trip_id = trip_id.to_string();

        let trip = self
            .store
            .transact(move |txn| {
                let mut trip = load_trip(txn, &trip_id)?;
                ensure_actor(&driver_id, &trip.driver_id, "driver")?;
                ensure_status(&trip, &[TripStatus::InProgress])?;

                trip.status = TripStatus::Completed;
                trip.completed_at = Some(now);

                payment_service::create_pending_payment(txn, &trip, now);
                release_driver(txn, &driver_id, now);
                txn.put_trip(trip.clone());
                Ok(trip)
            })
            .await?;

        tracing::info!(trip_id = %trip.id, fare = trip.fare_amount, "trip completed");
        let final_price_ils = trip.fare_amount;
        Ok(CompleteTripResponse {
            trip: trip.into(),
            final_price_ils,
        })
    }

    async fn cancel_by_passenger(
        &self,
        passenger_id: &str,
        trip_id: &str,
    ) -> DispatchResult<TripResponse> {
        self.cancel(
            passenger_id,
            trip_id,
            TripStatus::CancelledByPassenger,
            "passenger",
            None,
            CANCELLABLE_BY_PARTY,
            Some("passenger"),
        )
        .await
    }

    async fn cancel_by_driver(
        &self,
        driver_id: &str,
        trip_id: &str,
        reason: Option<String>,
    ) -> DispatchResult<TripResponse> {
        self.cancel(
            driver_id,
            trip_id,
            TripStatus::CancelledByDriver,
            "driver",
            reason,
            CANCELLABLE_BY_PARTY,
            Some("driver"),
        )
        .await
    }

    async fn force_cancel(
        &self,
        manager_id: &str,
        trip_id: &str,
        reason: Option<String>,
    ) -> DispatchResult<TripResponse> {
        let reason = reason.unwrap_or_else(|| "manager_override".to_string());
        let response = self
            .cancel(
                manager_id,
                trip_id,
                TripStatus::CancelledBySystem,
                "manager",
                Some(reason),
                ACTIVE_STATUSES,
                None,
            )
            .await?;
        tracing::warn!(trip_id = %response.id, manager_id, "trip force-cancelled by manager");
        Ok(response)
    }

    async fn submit_rating(
        &self,
        passenger_id: &str,
        payload: RatingPayload,
    ) -> DispatchResult<TripResponse> {
        check_trip_id(&payload.trip_id)?;
        payload.validate()?;
        let passenger_id = passenger_id.to_string();

        let trip = self
            .store
            .transact(move |txn| {
                let mut trip = load_trip(txn, &payload.trip_id)?;
                ensure_actor(&passenger_id, &trip.passenger_id, "passenger")?;
                ensure_status(&trip, &[TripStatus::Completed])?;

                trip.rating = Some(payload.rating);
                trip.rating_comment = payload.comment;
                txn.put_trip(trip.clone());
                Ok(trip)
            })
            .await?;

        tracing::info!(trip_id = %trip.id, rating = ?trip.rating, "trip rated");
        Ok(trip.into())
    }
}
