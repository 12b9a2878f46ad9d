// src/models/trip.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::{DispatchError, DispatchResult};
use crate::models::driver::GeoPoint;
use crate::models::payment::{PaymentMethod, PaymentStatus};

/// Authoritative trip state. Transitions are validated by the trip service;
/// no other code path writes `status`.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TripStatus {
    Pending,           // Created by matching, waiting for the driver to accept
    Accepted,          // Driver accepted the offer
    DriverArrived,     // Driver is at the pickup point
    InProgress,        // Passenger on board
    Completed,         // Ride finished, payment record created
    CancelledByPassenger,
    CancelledByDriver,
    CancelledBySystem, // Sweeper no-show or manager override
    NoDriverAvailable, // Offer rejected or expired
}

impl TripStatus {
    /// Active statuses keep the driver claimed.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            TripStatus::Pending
                | TripStatus::Accepted
                | TripStatus::DriverArrived
                | TripStatus::InProgress
        )
    }

    /// Terminal statuses admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }
}

impl fmt::Display for TripStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TripStatus::Pending => "pending",
            TripStatus::Accepted => "accepted",
            TripStatus::DriverArrived => "driver_arrived",
            TripStatus::InProgress => "in_progress",
            TripStatus::Completed => "completed",
            TripStatus::CancelledByPassenger => "cancelled_by_passenger",
            TripStatus::CancelledByDriver => "cancelled_by_driver",
            TripStatus::CancelledBySystem => "cancelled_by_system",
            TripStatus::NoDriverAvailable => "no_driver_available",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Open,
    Matched,
    Expired,
    Cancelled,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OfferStatus {
    Pending,
    Accepted,
    Rejected,
    Cancelled,
    Expired,
}

impl OfferStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OfferStatus::Pending)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Trip {
    pub id: String,
    pub passenger_id: String,
    pub driver_id: String,

    pub pickup: GeoPoint,
    pub dropoff: GeoPoint,
    pub estimated_distance_km: f64,
    pub estimated_duration_min: i64,
    pub estimated_price_ils: i64,

    pub status: TripStatus,

    pub payment_method: PaymentMethod,
    pub fare_amount: i64,
    pub payment_status: PaymentStatus,
    pub paid_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub arrived_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,

    pub cancellation_reason: Option<String>,
    pub cancelled_by: Option<String>,

    pub rating: Option<u8>,
    pub rating_comment: Option<String>,
}

/// The passenger's admission record. Lives only until matched, expired or
/// cancelled; status never reverses once it leaves `open`.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct TripRequest {
    pub id: String,
    pub passenger_id: String,
    pub pickup: GeoPoint,
    pub dropoff: GeoPoint,
    pub estimated_distance_km: f64,
    pub estimated_duration_min: i64,
    pub estimated_price_ils: i64,
    pub status: RequestStatus,
    pub matched_driver_id: Option<String>,
    pub matched_trip_id: Option<String>,
    pub matched_at: Option<DateTime<Utc>>,
    pub expiry_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// The invitation presented to exactly one driver for one trip, kept under
/// `driverRequests/<driverId>` and keyed by trip id.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct DriverOffer {
    pub trip_id: String,
    pub driver_id: String,
    pub estimated_price_ils: i64,
    pub status: OfferStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

// Callable payloads

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct TripEstimate {
    pub distance_km: f64,
    pub duration_min: i64,
    pub price_ils: i64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestTripPayload {
    pub pickup: GeoPoint,
    pub dropoff: GeoPoint,
    pub estimate: TripEstimate,
}

impl RequestTripPayload {
    pub fn validate(&self) -> DispatchResult<()> {
        self.pickup.validate("pickup")?;
        self.dropoff.validate("dropoff")?;
        if !self.estimate.distance_km.is_finite() || self.estimate.distance_km < 0.0 {
            return Err(DispatchError::validation_error(
                "estimate.distanceKm",
                "distance must be a non-negative number",
            ));
        }
        if self.estimate.duration_min < 0 {
            return Err(DispatchError::validation_error(
                "estimate.durationMin",
                "duration must be non-negative",
            ));
        }
        if self.estimate.price_ils < 0 {
            return Err(DispatchError::validation_error(
                "estimate.priceIls",
                "price must be non-negative",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripIdPayload {
    pub trip_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelTripPayload {
    pub trip_id: String,
    pub reason: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingPayload {
    pub trip_id: String,
    pub rating: u8,
    pub comment: Option<String>,
}

impl RatingPayload {
    pub fn validate(&self) -> DispatchResult<()> {
        if !(1..=5).contains(&self.rating) {
            return Err(DispatchError::validation_error(
                "rating",
                "rating must be within [1, 5]",
            ));
        }
        Ok(())
    }
}

// Callable responses

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MatchOutcome {
    Matched,
    Searching,
}

/// `no drivers available` is a successful `searching` response, never an
/// error; the client polls or subscribes for the outcome.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestTripResponse {
    pub request_id: String,
    pub trip_id: Option<String>,
    pub driver_id: Option<String>,
    pub status: MatchOutcome,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripResponse {
    pub id: String,
    pub passenger_id: String,
    pub driver_id: String,
    pub status: TripStatus,
    pub pickup: GeoPoint,
    pub dropoff: GeoPoint,
    pub estimated_distance_km: f64,
    pub estimated_price_ils: i64,
    pub fare_amount: i64,
    pub payment_status: PaymentStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub arrived_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    pub cancelled_by: Option<String>,
    pub rating: Option<u8>,
}

impl From<Trip> for TripResponse {
    fn from(trip: Trip) -> Self {
        Self {
            id: trip.id,
            passenger_id: trip.passenger_id,
            driver_id: trip.driver_id,
            status: trip.status,
            pickup: trip.pickup,
            dropoff: trip.dropoff,
            estimated_distance_km: trip.estimated_distance_km,
            estimated_price_ils: trip.estimated_price_ils,
            fare_amount: trip.fare_amount,
            payment_status: trip.payment_status,
            paid_at: trip.paid_at,
            created_at: trip.created_at,
            accepted_at: trip.accepted_at,
            arrived_at: trip.arrived_at,
            started_at: trip.started_at,
            completed_at: trip.completed_at,
            cancelled_at: trip.cancelled_at,
            cancellation_reason: trip.cancellation_reason,
            cancelled_by: trip.cancelled_by,
            rating: trip.rating,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteTripResponse {
    #[serde(flatten)]
    pub trip: TripResponse,
    pub final_price_ils: i64,
}
