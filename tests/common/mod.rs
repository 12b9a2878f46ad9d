// tests/common/mod.rs
#![allow(dead_code)]

use std::sync::Arc;

use chrono::{TimeZone, Utc};

use swift_dispatch::clock::ManualClock;
use swift_dispatch::models::driver::GeoPoint;
use swift_dispatch::models::trip::{
    MatchOutcome, RequestTripPayload, RequestTripResponse, TripEstimate,
};
use swift_dispatch::services::driver_service::DriverOperations;
use swift_dispatch::services::matching_service::MatchingOperations;
use swift_dispatch::state::{AppState, EngineSettings};

pub const PICKUP: GeoPoint = GeoPoint {
    lat: 32.2211,
    lng: 35.2544,
};
pub const DROPOFF: GeoPoint = GeoPoint {
    lat: 31.9038,
    lng: 35.2034,
};
/// ~130 m from `PICKUP`.
pub const NEARBY: GeoPoint = GeoPoint {
    lat: 32.2200,
    lng: 35.2540,
};

pub struct TestEngine {
    pub state: AppState,
    pub clock: Arc<ManualClock>,
}

pub fn engine() -> TestEngine {
    engine_with(EngineSettings::default())
}

pub fn engine_with(settings: EngineSettings) -> TestEngine {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
    ));
    let state = AppState::with_clock(settings, clock.clone());
    TestEngine { state, clock }
}

pub async fn online_driver(engine: &TestEngine, driver_id: &str, location: GeoPoint) {
    engine
        .state
        .driver_service
        .set_online(driver_id, true)
        .await
        .unwrap();
    engine
        .state
        .driver_service
        .update_location(driver_id, location)
        .await
        .unwrap();
}

pub fn ride_payload() -> RequestTripPayload {
    RequestTripPayload {
        pickup: PICKUP,
        dropoff: DROPOFF,
        estimate: TripEstimate {
            distance_km: 37.6,
            duration_min: 42,
            price_ils: 19,
        },
    }
}

/// Request a trip for `passenger_id` and insist on a match.
pub async fn matched_trip(engine: &TestEngine, passenger_id: &str) -> RequestTripResponse {
    let response = engine
        .state
        .matching_service
        .request_trip(passenger_id, ride_payload())
        .await
        .unwrap();
    assert_eq!(response.status, MatchOutcome::Matched);
    response
}
