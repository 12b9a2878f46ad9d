use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tracing_subscriber::EnvFilter;

use swift_dispatch::handlers::{driver_handler, manager_handler, trip_handler};
use swift_dispatch::state::{AppState, EngineSettings};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = EngineSettings::from_env();
    let bind_addr = settings.bind_addr.clone();
    let state = Arc::new(AppState::new(settings));
    state.seed_managers().await;

    // Timeout enforcement runs for the lifetime of the process
    state.sweeper.clone().spawn();

    let app = Router::new()
        // passenger
        .route("/requestTrip", post(trip_handler::request_trip))
        .route("/cancelByPassenger", post(trip_handler::cancel_by_passenger))
        .route("/submitRating", post(trip_handler::submit_rating))
        // driver
        .route("/acceptOffer", post(trip_handler::accept_offer))
        .route("/rejectOffer", post(trip_handler::reject_offer))
        .route("/driverArrived", post(trip_handler::driver_arrived))
        .route("/startTrip", post(trip_handler::start_trip))
        .route("/completeTrip", post(trip_handler::complete_trip))
        .route("/confirmCashPayment", post(trip_handler::confirm_cash_payment))
        .route("/cancelByDriver", post(trip_handler::cancel_by_driver))
        .route("/setDriverOnline", post(driver_handler::set_driver_online))
        .route(
            "/updateDriverLocation",
            post(driver_handler::update_driver_location),
        )
        // manager
        .route("/managerForceCancel", post(manager_handler::force_cancel))
        .route("/managerToggleTrips", post(manager_handler::toggle_trips))
        .route(
            "/managerToggleFeatureFlag",
            post(manager_handler::toggle_feature_flag),
        )
        .route("/getSystemConfig", get(manager_handler::get_system_config))
        .with_state(state);

    tracing::info!(addr = %bind_addr, "dispatch engine listening");
    let listener = tokio::net::TcpListener::bind(&bind_addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
