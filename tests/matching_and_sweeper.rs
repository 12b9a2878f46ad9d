// tests/matching_and_sweeper.rs
//! Matching, admission and timeout coverage: nearest-driver selection, the
//! search radius cap, pilot caps, the kill switch and all three sweeps.

mod common;

use chrono::Duration;

use common::{engine, engine_with, matched_trip, online_driver, ride_payload, NEARBY, PICKUP};
use swift_dispatch::clock::Clock;
use swift_dispatch::errors::DispatchError;
use swift_dispatch::models::driver::GeoPoint;
use swift_dispatch::models::trip::{MatchOutcome, OfferStatus, RequestStatus, TripStatus};
use swift_dispatch::services::driver_service::DriverOperations;
use swift_dispatch::services::matching_service::MatchingOperations;
use swift_dispatch::services::trip_service::TripOperations;
use swift_dispatch::state::EngineSettings;
use swift_dispatch::utils::geo;

const PASSENGER: &str = "pax-1";
const DRIVER: &str = "drv-1";

#[tokio::test]
async fn no_drivers_returns_searching_and_request_later_expires() {
    let engine = engine();

    let response = engine
        .state
        .matching_service
        .request_trip(PASSENGER, ride_payload())
        .await
        .unwrap();
    assert_eq!(response.status, MatchOutcome::Searching);
    assert!(response.trip_id.is_none());

    let request = engine
        .state
        .store
        .trip_request(&response.request_id)
        .await
        .unwrap();
    assert_eq!(request.status, RequestStatus::Open);

    // Not yet stale at 119 s
    engine.clock.advance(Duration::seconds(119));
    let stats = engine.state.sweeper.run_once().await;
    assert_eq!(stats.requests_expired, 0);

    // Past the 120 s search window
    engine.clock.advance(Duration::seconds(2));
    let stats = engine.state.sweeper.run_once().await;
    assert_eq!(stats.requests_expired, 1);

    let request = engine
        .state
        .store
        .trip_request(&response.request_id)
        .await
        .unwrap();
    assert_eq!(request.status, RequestStatus::Expired);
    assert_eq!(request.expiry_reason.as_deref(), Some("no_driver_found"));

    // The sweep is idempotent
    let stats = engine.state.sweeper.run_once().await;
    assert_eq!(stats.requests_expired, 0);
}

#[tokio::test]
async fn nearest_driver_wins() {
    let engine = engine();
    online_driver(&engine, "drv-far", GeoPoint { lat: 32.30, lng: 35.30 }).await;
    online_driver(&engine, "drv-near", NEARBY).await;

    let matched = matched_trip(&engine, PASSENGER).await;
    assert_eq!(matched.driver_id.as_deref(), Some("drv-near"));

    // The loser of the selection is untouched
    let far = engine.state.store.driver("drv-far").await.unwrap();
    assert!(far.is_available);
}

#[tokio::test]
async fn drivers_without_location_are_skipped() {
    let engine = engine();
    engine
        .state
        .driver_service
        .set_online(DRIVER, true)
        .await
        .unwrap();

    let response = engine
        .state
        .matching_service
        .request_trip(PASSENGER, ride_payload())
        .await
        .unwrap();
    assert_eq!(response.status, MatchOutcome::Searching);
}

#[tokio::test]
async fn search_radius_boundary_is_inclusive() {
    // A driver sitting exactly on the cap is eligible; one epsilon past the
    // cap is not.
    let at_cap = GeoPoint { lat: 32.35, lng: 35.2544 };
    let distance = geo::haversine_km(&PICKUP, &at_cap);

    let engine = engine_with(EngineSettings::default().with_max_search_radius_km(distance));
    online_driver(&engine, DRIVER, at_cap).await;
    let matched = matched_trip(&engine, PASSENGER).await;
    assert_eq!(matched.driver_id.as_deref(), Some(DRIVER));

    let engine = engine_with(
        EngineSettings::default().with_max_search_radius_km(distance - 0.001),
    );
    online_driver(&engine, DRIVER, at_cap).await;
    let response = engine
        .state
        .matching_service
        .request_trip(PASSENGER, ride_payload())
        .await
        .unwrap();
    assert_eq!(response.status, MatchOutcome::Searching);
}

#[tokio::test]
async fn client_price_is_overridden_not_rejected() {
    let engine = engine();
    online_driver(&engine, DRIVER, NEARBY).await;

    let mut payload = ride_payload();
    payload.estimate.price_ils = 999;
    let response = engine
        .state
        .matching_service
        .request_trip(PASSENGER, payload)
        .await
        .unwrap();
    assert_eq!(response.status, MatchOutcome::Matched);

    let trip = engine
        .state
        .store
        .trip(response.trip_id.as_deref().unwrap())
        .await
        .unwrap();
    assert_eq!(trip.fare_amount, 19);
    assert_eq!(trip.estimated_price_ils, 19);
}

#[tokio::test]
async fn passenger_pilot_cap_is_one_active_trip() {
    let engine = engine();
    online_driver(&engine, DRIVER, NEARBY).await;
    online_driver(&engine, "drv-2", NEARBY).await;

    let first = matched_trip(&engine, PASSENGER).await;
    let err = engine
        .state
        .matching_service
        .request_trip(PASSENGER, ride_payload())
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::Forbidden(_)));

    // Once the trip terminates, the passenger may request again
    let trip_id = first.trip_id.unwrap();
    engine
        .state
        .trip_service
        .cancel_by_passenger(PASSENGER, &trip_id)
        .await
        .unwrap();
    let second = matched_trip(&engine, PASSENGER).await;
    assert!(second.trip_id.is_some());
}

#[tokio::test]
async fn claimed_driver_is_not_matched_again() {
    let engine = engine();
    online_driver(&engine, DRIVER, NEARBY).await;

    matched_trip(&engine, PASSENGER).await;

    // The only driver is claimed; a second passenger keeps searching
    let response = engine
        .state
        .matching_service
        .request_trip("pax-2", ride_payload())
        .await
        .unwrap();
    assert_eq!(response.status, MatchOutcome::Searching);
}

#[tokio::test]
async fn kill_switch_blocks_new_requests_but_not_inflight_trips() {
    let engine = engine_with(
        EngineSettings::default().with_config_cache_ttl(std::time::Duration::from_secs(0)),
    );
    online_driver(&engine, DRIVER, NEARBY).await;
    let trip_id = matched_trip(&engine, PASSENGER).await.trip_id.unwrap();

    engine
        .state
        .config_service
        .set_trips_enabled(false, "mgr-1")
        .await
        .unwrap();

    let err = engine
        .state
        .matching_service
        .request_trip("pax-2", ride_payload())
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::ServiceDisabled(_)));

    // No admission record was written past the switch
    assert!(engine
        .state
        .store
        .open_requests_before(engine.clock.now() + Duration::seconds(1))
        .await
        .is_empty());

    // The trip accepted before the toggle proceeds unaffected
    let trips = &engine.state.trip_service;
    trips.accept_offer(DRIVER, &trip_id).await.unwrap();
    trips.driver_arrived(DRIVER, &trip_id).await.unwrap();
    trips.start_trip(DRIVER, &trip_id).await.unwrap();
    let completed = trips.complete_trip(DRIVER, &trip_id).await.unwrap();
    assert_eq!(completed.trip.status, TripStatus::Completed);

    // Re-enable and admission recovers
    engine
        .state
        .config_service
        .set_trips_enabled(true, "mgr-1")
        .await
        .unwrap();
    matched_trip(&engine, "pax-2").await;
}

#[tokio::test]
async fn pending_offer_expires_into_no_driver_available() {
    let engine = engine();
    online_driver(&engine, DRIVER, NEARBY).await;
    let trip_id = matched_trip(&engine, PASSENGER).await.trip_id.unwrap();

    // Inside the 20 s response window nothing happens
    engine.clock.advance(Duration::seconds(19));
    let stats = engine.state.sweeper.run_once().await;
    assert_eq!(stats.offers_expired, 0);

    engine.clock.advance(Duration::seconds(2));
    let stats = engine.state.sweeper.run_once().await;
    assert_eq!(stats.offers_expired, 1);

    let trip = engine.state.store.trip(&trip_id).await.unwrap();
    assert_eq!(trip.status, TripStatus::NoDriverAvailable);

    let offer = engine.state.store.offer(DRIVER, &trip_id).await.unwrap();
    assert_eq!(offer.status, OfferStatus::Expired);

    let driver = engine.state.store.driver(DRIVER).await.unwrap();
    assert!(driver.is_available);
    assert!(driver.current_trip_id.is_none());
}

#[tokio::test]
async fn late_accept_beats_the_sweeper_if_it_commits_first() {
    let engine = engine();
    online_driver(&engine, DRIVER, NEARBY).await;
    let trip_id = matched_trip(&engine, PASSENGER).await.trip_id.unwrap();

    // Past expiry, but the accept lands before the next sweep
    engine.clock.advance(Duration::seconds(25));
    let accepted = engine
        .state
        .trip_service
        .accept_offer(DRIVER, &trip_id)
        .await
        .unwrap();
    assert_eq!(accepted.status, TripStatus::Accepted);

    // The sweep re-checks inside its transaction and leaves the trip alone
    let stats = engine.state.sweeper.run_once().await;
    assert_eq!(stats.offers_expired, 0);
    let trip = engine.state.store.trip(&trip_id).await.unwrap();
    assert_eq!(trip.status, TripStatus::Accepted);
}

#[tokio::test]
async fn sweeps_handle_mixed_batches() {
    let engine = engine();

    // One stale open request
    engine
        .state
        .matching_service
        .request_trip("pax-stale", ride_payload())
        .await
        .unwrap();

    // One pending trip whose offer will expire
    online_driver(&engine, "drv-idle", NEARBY).await;
    let pending = matched_trip(&engine, "pax-idle").await.trip_id.unwrap();

    // One accepted trip that will become a no-show
    online_driver(&engine, "drv-gone", NEARBY).await;
    let accepted = matched_trip(&engine, "pax-gone").await.trip_id.unwrap();
    engine
        .state
        .trip_service
        .accept_offer("drv-gone", &accepted)
        .await
        .unwrap();

    engine.clock.advance(Duration::seconds(301));
    let stats = engine.state.sweeper.run_once().await;
    assert_eq!(stats.offers_expired, 1);
    assert_eq!(stats.requests_expired, 1);
    assert_eq!(stats.no_shows_cancelled, 1);

    assert_eq!(
        engine.state.store.trip(&pending).await.unwrap().status,
        TripStatus::NoDriverAvailable
    );
    assert_eq!(
        engine.state.store.trip(&accepted).await.unwrap().status,
        TripStatus::CancelledBySystem
    );
}

#[tokio::test]
async fn invalid_request_payloads_are_rejected() {
    let engine = engine();
    online_driver(&engine, DRIVER, NEARBY).await;

    let mut payload = ride_payload();
    payload.pickup.lat = 120.0;
    let err = engine
        .state
        .matching_service
        .request_trip(PASSENGER, payload)
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::ValidationFailed(_)));

    let mut payload = ride_payload();
    payload.estimate.distance_km = f64::NAN;
    let err = engine
        .state
        .matching_service
        .request_trip(PASSENGER, payload)
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::ValidationFailed(_)));
}
