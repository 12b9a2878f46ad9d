// src/services/matching_service.rs
use async_trait::async_trait;
use std::sync::Arc;
use tracing;

use crate::clock::Clock;
use crate::errors::{DispatchError, DispatchResult};
use crate::models::driver::GeoPoint;
use crate::models::payment::{PaymentMethod, PaymentStatus};
use crate::models::trip::{
    DriverOffer, MatchOutcome, OfferStatus, RequestStatus, RequestTripPayload,
    RequestTripResponse, Trip, TripEstimate, TripRequest, TripStatus,
};
use crate::services::config_service::ConfigService;
use crate::state::EngineSettings;
use crate::store::MemoryStore;
use crate::utils::geo;
use crate::utils::id_generator::{IdGenerator, IdType};
use crate::utils::pricing::PriceTable;

#[async_trait]
pub trait MatchingOperations: Send + Sync {
    async fn request_trip(
        &self,
        passenger_id: &str,
        payload: RequestTripPayload,
    ) -> DispatchResult<RequestTripResponse>;
}

struct Candidate {
    driver_id: String,
    distance_km: f64,
}

/// Admission and matching for passenger ride requests: kill switch, pilot
/// cap, server-side price recomputation, nearest-driver search and the
/// transactional claim that binds a driver to a new trip.
pub struct MatchingService {
    store: Arc<MemoryStore>,
    config: Arc<ConfigService>,
    clock: Arc<dyn Clock>,
    settings: EngineSettings,
    prices: PriceTable,
}

impl MatchingService {
    pub fn new(
        store: Arc<MemoryStore>,
        config: Arc<ConfigService>,
        clock: Arc<dyn Clock>,
        settings: EngineSettings,
    ) -> Self {
        let prices = settings.price_table();
        Self {
            store,
            config,
            clock,
            settings,
            prices,
        }
    }

    /// Online, available drivers with a known position inside the search
    /// radius, nearest first. Equidistant drivers keep store key order.
    async fn rank_candidates(&self, pickup: &GeoPoint) -> Vec<Candidate> {
        let mut candidates: Vec<Candidate> = self
            .store
            .available_drivers()
            .await
            .into_iter()
            .filter_map(|driver| {
                let location = driver.last_location?;
                let distance_km = geo::haversine_km(pickup, &location);
                if distance_km > self.settings.max_search_radius_km {
                    return None;
                }
                Some(Candidate {
                    driver_id: driver.id,
                    distance_km,
                })
            })
            .collect();
        candidates.sort_by(|a, b| {
            a.distance_km
                .partial_cmp(&b.distance_km)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        candidates
    }

    /// One claim attempt against a single driver. `Ok(None)` means the
    /// driver was no longer claimable when re-read inside the transaction.
    async fn try_claim(
        &self,
        request_id: &str,
        passenger_id: &str,
        pickup: GeoPoint,
        dropoff: GeoPoint,
        estimate: TripEstimate,
        fare: i64,
        driver_id: &str,
    ) -> DispatchResult<Option<Trip>> {
        let now = self.clock.now();
        let trip_id = IdGenerator::generate_with_timestamp(IdType::Trip, now);
        let offer_expires_at = now + self.settings.driver_response_timeout;
        let max_per_passenger = self.settings.max_active_trips_per_passenger;
        let max_per_driver = self.settings.max_active_trips_per_driver;

        let request_id = request_id.to_string();
        let passenger_id = passenger_id.to_string();
        let driver_id = driver_id.to_string();

        self.store
            .transact(move |txn| {
                // Re-read the driver; the snapshot used for ranking is stale
                // by the time the claim runs.
                let mut driver = match txn.driver(&driver_id) {
                    Some(d) if d.is_online && d.is_available => d.clone(),
                    _ => return Ok(None),
                };
                if txn.active_trip_count_for_driver(&driver_id) >= max_per_driver {
                    return Ok(None);
                }
                // The admission check ran before this transaction; a
                // concurrent request may have won a claim since.
                if txn.active_trip_count_for_passenger(&passenger_id) >= max_per_passenger {
                    return Err(DispatchError::forbidden(
                        "passenger already has an active trip",
                    ));
                }

                let mut request = txn
                    .trip_request(&request_id)
                    .cloned()
                    .ok_or_else(|| {
                        DispatchError::internal(format!("trip request vanished: {}", request_id))
                    })?;
                if request.status != RequestStatus::Open {
                    return Err(DispatchError::forbidden(format!(
                        "trip request is no longer open: {:?}",
                        request.status
                    )));
                }

                let trip = Trip {
                    id: trip_id.clone(),
                    passenger_id: passenger_id.clone(),
                    driver_id: driver_id.clone(),
                    pickup,
                    dropoff,
                    estimated_distance_km: estimate.distance_km,
                    estimated_duration_min: estimate.duration_min,
                    estimated_price_ils: fare,
                    status: TripStatus::Pending,
                    payment_method: PaymentMethod::Cash,
                    fare_amount: fare,
                    payment_status: PaymentStatus::Pending,
                    paid_at: None,
                    created_at: now,
                    accepted_at: None,
                    arrived_at: None,
                    started_at: None,
                    completed_at: None,
                    cancelled_at: None,
                    cancellation_reason: None,
                    cancelled_by: None,
                    rating: None,
                    rating_comment: None,
                };

                driver.is_available = false;
                driver.current_trip_id = Some(trip_id.clone());
                driver.updated_at = now;

                let offer = DriverOffer {
                    trip_id: trip_id.clone(),
                    driver_id: driver_id.clone(),
                    estimated_price_ils: fare,
                    status: OfferStatus::Pending,
                    created_at: now,
                    expires_at: offer_expires_at,
                };

                request.status = RequestStatus::Matched;
                request.matched_driver_id = Some(driver_id.clone());
                request.matched_trip_id = Some(trip_id.clone());
                request.matched_at = Some(now);

                txn.put_trip(trip.clone());
                txn.put_driver(driver);
                txn.put_offer(offer);
                txn.put_trip_request(request);
                Ok(Some(trip))
            })
            .await
    }
}

#[async_trait]
impl MatchingOperations for MatchingService {
    async fn request_trip(
        &self,
        passenger_id: &str,
        payload: RequestTripPayload,
    ) -> DispatchResult<RequestTripResponse> {
        payload.validate()?;

        if !self.config.trips_enabled().await {
            return Err(DispatchError::service_disabled(
                "trip requests are temporarily disabled",
            ));
        }

        let active = self.store.active_trips_for_passenger(passenger_id).await;
        if active.len() >= self.settings.max_active_trips_per_passenger {
            return Err(DispatchError::forbidden(
                "passenger already has an active trip",
            ));
        }

        let now = self.clock.now();
        let server_price = self.prices.price(payload.estimate.distance_km);
        if server_price != payload.estimate.price_ils {
            tracing::warn!(
                passenger_id,
                claimed = payload.estimate.price_ils,
                recomputed = server_price,
                "client price differs from server pricing, overriding"
            );
        }

        let request = TripRequest {
            id: IdGenerator::generate_with_timestamp(IdType::Request, now),
            passenger_id: passenger_id.to_string(),
            pickup: payload.pickup,
            dropoff: payload.dropoff,
            estimated_distance_km: payload.estimate.distance_km,
            estimated_duration_min: payload.estimate.duration_min,
            estimated_price_ils: server_price,
            status: RequestStatus::Open,
            matched_driver_id: None,
            matched_trip_id: None,
            matched_at: None,
            expiry_reason: None,
            created_at: now,
        };
        let request_id = request.id.clone();
        let persisted = request.clone();
        self.store
            .transact(move |txn| {
                txn.put_trip_request(persisted);
                Ok(())
            })
            .await?;

        let candidates = self.rank_candidates(&payload.pickup).await;
        if candidates.is_empty() {
            tracing::info!(%request_id, "no eligible drivers in range, request stays open");
            return Ok(RequestTripResponse {
                request_id,
                trip_id: None,
                driver_id: None,
                status: MatchOutcome::Searching,
            });
        }

        // Claim the nearest candidate; on a lost race, one retry against the
        // runner-up before degrading to `searching`.
        for candidate in candidates.iter().take(2) {
            let claimed = self
                .try_claim(
                    &request_id,
                    passenger_id,
                    payload.pickup,
                    payload.dropoff,
                    payload.estimate.clone(),
                    server_price,
                    &candidate.driver_id,
                )
                .await?;
            match claimed {
                Some(trip) => {
                    tracing::info!(
                        trip_id = %trip.id,
                        driver_id = %trip.driver_id,
                        distance_km = candidate.distance_km,
                        fare = trip.fare_amount,
                        "trip matched"
                    );
                    return Ok(RequestTripResponse {
                        request_id,
                        trip_id: Some(trip.id),
                        driver_id: Some(trip.driver_id),
                        status: MatchOutcome::Matched,
                    });
                }
                None => {
                    tracing::debug!(
                        driver_id = %candidate.driver_id,
                        "claim lost to a concurrent writer, trying next candidate"
                    );
                }
            }
        }

        tracing::info!(%request_id, "all claim attempts lost, request stays open");
        Ok(RequestTripResponse {
            request_id,
            trip_id: None,
            driver_id: None,
            status: MatchOutcome::Searching,
        })
    }
}
