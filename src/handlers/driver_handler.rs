// src/handlers/driver_handler.rs
use axum::extract::State;
use axum::Json;
use std::sync::Arc;

use crate::errors::DispatchError;
use crate::handlers::auth::AuthUser;
use crate::models::driver::{DriverResponse, LocationUpdatePayload, SetOnlinePayload};
use crate::services::driver_service::DriverOperations;
use crate::state::AppState;

pub async fn set_driver_online(
    State(state): State<Arc<AppState>>,
    AuthUser(caller): AuthUser,
    Json(payload): Json<SetOnlinePayload>,
) -> Result<Json<DriverResponse>, DispatchError> {
    let response = state
        .driver_service
        .set_online(&caller, payload.online)
        .await?;
    Ok(Json(response))
}

pub async fn update_driver_location(
    State(state): State<Arc<AppState>>,
    AuthUser(caller): AuthUser,
    Json(payload): Json<LocationUpdatePayload>,
) -> Result<Json<DriverResponse>, DispatchError> {
    let location = payload.validate()?;
    let response = state
        .driver_service
        .update_location(&caller, location)
        .await?;
    Ok(Json(response))
}
