// src/handlers/trip_handler.rs
use axum::extract::State;
use axum::Json;
use std::sync::Arc;

use crate::errors::DispatchError;
use crate::handlers::auth::AuthUser;
use crate::models::trip::{
    CancelTripPayload, CompleteTripResponse, RatingPayload, RequestTripPayload,
    RequestTripResponse, TripIdPayload, TripResponse,
};
use crate::services::matching_service::MatchingOperations;
use crate::services::payment_service::PaymentOperations;
use crate::services::trip_service::TripOperations;
use crate::state::AppState;

pub async fn request_trip(
    State(state): State<Arc<AppState>>,
    AuthUser(caller): AuthUser,
    Json(payload): Json<RequestTripPayload>,
) -> Result<Json<RequestTripResponse>, DispatchError> {
    let response = state.matching_service.request_trip(&caller, payload).await?;
    Ok(Json(response))
}

pub async fn accept_offer(
    State(state): State<Arc<AppState>>,
    AuthUser(caller): AuthUser,
    Json(payload): Json<TripIdPayload>,
) -> Result<Json<TripResponse>, DispatchError> {
    let response = state
        .trip_service
        .accept_offer(&caller, &payload.trip_id)
        .await?;
    Ok(Json(response))
}

pub async fn reject_offer(
    State(state): State<Arc<AppState>>,
    AuthUser(caller): AuthUser,
    Json(payload): Json<TripIdPayload>,
) -> Result<Json<TripResponse>, DispatchError> {
    let response = state
        .trip_service
        .reject_offer(&caller, &payload.trip_id)
        .await?;
    Ok(Json(response))
}

pub async fn driver_arrived(
    State(state): State<Arc<AppState>>,
    AuthUser(caller): AuthUser,
    Json(payload): Json<TripIdPayload>,
) -> Result<Json<TripResponse>, DispatchError> {
    let response = state
        .trip_service
        .driver_arrived(&caller, &payload.trip_id)
        .await?;
    Ok(Json(response))
}

pub async fn start_trip(
    State(state): State<Arc<AppState>>,
    AuthUser(caller): AuthUser,
    Json(payload): Json<TripIdPayload>,
) -> Result<Json<TripResponse>, DispatchError> {
    let response = state
        .trip_service
        .start_trip(&caller, &payload.trip_id)
        .await?;
    Ok(Json(response))
}

pub async fn complete_trip(
    State(state): State<Arc<AppState>>,
    AuthUser(caller): AuthUser,
    Json(payload): Json<TripIdPayload>,
) -> Result<Json<CompleteTripResponse>, DispatchError> {
    let response = state
        .trip_service
        .complete_trip(&caller, &payload.trip_id)
        .await?;
    Ok(Json(response))
}

pub async fn confirm_cash_payment(
    State(state): State<Arc<AppState>>,
    AuthUser(caller): AuthUser,
    Json(payload): Json<TripIdPayload>,
) -> Result<Json<TripResponse>, DispatchError> {
    let response = state
        .payment_service
        .confirm_cash_payment(&caller, &payload.trip_id)
        .await?;
    Ok(Json(response))
}

pub async fn cancel_by_passenger(
    State(state): State<Arc<AppState>>,
    AuthUser(caller): AuthUser,
    Json(payload): Json<TripIdPayload>,
) -> Result<Json<TripResponse>, DispatchError> {
    let response = state
        .trip_service
        .cancel_by_passenger(&caller, &payload.trip_id)
        .await?;
    Ok(Json(response))
}

pub async fn cancel_by_driver(
    State(state): State<Arc<AppState>>,
    AuthUser(caller): AuthUser,
    Json(payload): Json<CancelTripPayload>,
) -> Result<Json<TripResponse>, DispatchError> {
    let response = state
        .trip_service
        .cancel_by_driver(&caller, &payload.trip_id, payload.reason)
        .await?;
    Ok(Json(response))
}

pub async fn submit_rating(
    State(state): State<Arc<AppState>>,
    AuthUser(caller): AuthUser,
    Json(payload): Json<RatingPayload>,
) -> Result<Json<TripResponse>, DispatchError> {
    let response = state.trip_service.submit_rating(&caller, payload).await?;
    Ok(Json(response))
}
