// src/handlers/manager_handler.rs
use axum::extract::State;
use axum::Json;
use std::sync::Arc;

use crate::errors::DispatchError;
use crate::handlers::auth::AuthUser;
use crate::models::system::{SystemConfig, ToggleFlagPayload, ToggleTripsPayload};
use crate::models::trip::{CancelTripPayload, TripResponse};
use crate::services::trip_service::TripOperations;
use crate::state::AppState;

pub async fn force_cancel(
    State(state): State<Arc<AppState>>,
    AuthUser(caller): AuthUser,
    Json(payload): Json<CancelTripPayload>,
) -> Result<Json<TripResponse>, DispatchError> {
    state.auth_service.require_manager(&caller).await?;
    let response = state
        .trip_service
        .force_cancel(&caller, &payload.trip_id, payload.reason)
        .await?;
    Ok(Json(response))
}

pub async fn toggle_trips(
    State(state): State<Arc<AppState>>,
    AuthUser(caller): AuthUser,
    Json(payload): Json<ToggleTripsPayload>,
) -> Result<Json<SystemConfig>, DispatchError> {
    state.auth_service.require_manager(&caller).await?;
    let config = state
        .config_service
        .set_trips_enabled(payload.enabled, &caller)
        .await?;
    Ok(Json(config))
}

pub async fn toggle_feature_flag(
    State(state): State<Arc<AppState>>,
    AuthUser(caller): AuthUser,
    Json(payload): Json<ToggleFlagPayload>,
) -> Result<Json<SystemConfig>, DispatchError> {
    state.auth_service.require_manager(&caller).await?;
    let flag = payload.parse_flag()?;
    let config = state
        .config_service
        .set_flag(flag, payload.enabled, &caller)
        .await?;
    Ok(Json(config))
}

pub async fn get_system_config(
    State(state): State<Arc<AppState>>,
    AuthUser(caller): AuthUser,
) -> Result<Json<SystemConfig>, DispatchError> {
    state.auth_service.require_manager(&caller).await?;
    Ok(Json(state.config_service.current().await))
}
