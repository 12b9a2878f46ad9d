// src/models/driver.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{DispatchError, DispatchResult};

/// A point on the map. Wire format `{lat, lng}`.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn validate(&self, field: &str) -> DispatchResult<()> {
        if !self.lat.is_finite() || !(-90.0..=90.0).contains(&self.lat) {
            return Err(DispatchError::validation_error(
                format!("{}.lat", field),
                "latitude must be within [-90, 90]",
            ));
        }
        if !self.lng.is_finite() || !(-180.0..=180.0).contains(&self.lng) {
            return Err(DispatchError::validation_error(
                format!("{}.lng", field),
                "longitude must be within [-180, 180]",
            ));
        }
        Ok(())
    }
}

/// Mutable driver state, keyed by the driver's auth identity.
///
/// `isAvailable` strictly implies `isOnline`. While a trip holds a claim on
/// the driver, `isAvailable` is false and `currentTripId` points at the trip.
/// Only the matching claim and the state-machine release may touch the
/// `isAvailable`/`currentTripId` pair.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Driver {
    pub id: String,
    pub is_online: bool,
    pub is_available: bool,
    pub last_location: Option<GeoPoint>,
    pub current_trip_id: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl Driver {
    /// Fresh offline document, created on the driver's first online toggle.
    pub fn new(id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            is_online: false,
            is_available: false,
            last_location: None,
            current_trip_id: None,
            updated_at: now,
        }
    }
}

// Driver-facing ingress payloads

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetOnlinePayload {
    pub online: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationUpdatePayload {
    pub lat: f64,
    pub lng: f64,
}

impl LocationUpdatePayload {
    pub fn validate(&self) -> DispatchResult<GeoPoint> {
        let point = GeoPoint {
            lat: self.lat,
            lng: self.lng,
        };
        point.validate("location")?;
        Ok(point)
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverResponse {
    pub id: String,
    pub is_online: bool,
    pub is_available: bool,
    pub last_location: Option<GeoPoint>,
    pub current_trip_id: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl From<Driver> for DriverResponse {
    fn from(driver: Driver) -> Self {
        Self {
            id: driver.id,
            is_online: driver.is_online,
            is_available: driver.is_available,
            last_location: driver.last_location,
            current_trip_id: driver.current_trip_id,
            updated_at: driver.updated_at,
        }
    }
}
