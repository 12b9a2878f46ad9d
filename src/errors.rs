use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Main error type for the dispatch engine.
///
/// Every callable operation translates its failures into one of these kinds
/// before the response leaves the process.
#[derive(Debug)]
pub enum DispatchError {
    // RPC taxonomy
    Unauthenticated(String),
    InvalidArgument(String),
    NotFound(String),
    Forbidden(String),
    ServiceDisabled(String),
    Internal(String),

    // Validation with field-level details
    ValidationFailed(Vec<FieldError>),

    // Store layer
    StoreConflict(String),
    StoreUnavailable(String),
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::Unauthenticated(msg) => write!(f, "Unauthenticated: {}", msg),
            DispatchError::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            DispatchError::NotFound(msg) => write!(f, "Not found: {}", msg),
            DispatchError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            DispatchError::ServiceDisabled(msg) => write!(f, "Service disabled: {}", msg),
            DispatchError::Internal(msg) => write!(f, "Internal error: {}", msg),
            DispatchError::ValidationFailed(errors) => {
                write!(f, "Validation failed: {} errors", errors.len())
            }
            DispatchError::StoreConflict(msg) => write!(f, "Store conflict: {}", msg),
            DispatchError::StoreUnavailable(msg) => write!(f, "Store unavailable: {}", msg),
        }
    }
}

impl std::error::Error for DispatchError {}

impl DispatchError {
    /// Stable taxonomy kind, as exposed on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchError::Unauthenticated(_) => "unauthenticated",
            DispatchError::InvalidArgument(_) | DispatchError::ValidationFailed(_) => {
                "invalid_argument"
            }
            DispatchError::NotFound(_) => "not_found",
            DispatchError::Forbidden(_) => "forbidden",
            DispatchError::ServiceDisabled(_) => "service_disabled",
            DispatchError::Internal(_)
            | DispatchError::StoreConflict(_)
            | DispatchError::StoreUnavailable(_) => "internal",
        }
    }
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        let (status, kind, message, details) = match self {
            DispatchError::Unauthenticated(msg) => {
                (StatusCode::UNAUTHORIZED, "unauthenticated", msg, None)
            }
            DispatchError::InvalidArgument(msg) => {
                (StatusCode::BAD_REQUEST, "invalid_argument", msg, None)
            }
            DispatchError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg, None),
            DispatchError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg, None),
            DispatchError::ServiceDisabled(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_disabled", msg, None)
            }
            DispatchError::ValidationFailed(errors) => {
                let details = serde_json::to_value(&errors).ok();
                (
                    StatusCode::BAD_REQUEST,
                    "invalid_argument",
                    "Validation errors occurred".to_string(),
                    details,
                )
            }
            // Store and unexpected failures surface as internal with no leaked detail
            DispatchError::Internal(_)
            | DispatchError::StoreConflict(_)
            | DispatchError::StoreUnavailable(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal",
                "internal error".to_string(),
                None,
            ),
        };

        let error_response = ErrorResponse {
            error: kind.to_string(),
            message,
            details,
        };

        (status, axum::Json(error_response)).into_response()
    }
}

// Convenience type alias for Results
pub type DispatchResult<T> = Result<T, DispatchError>;

// Helper functions for creating common errors
impl DispatchError {
    pub fn unauthenticated(msg: impl Into<String>) -> Self {
        DispatchError::Unauthenticated(msg.into())
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        DispatchError::InvalidArgument(msg.into())
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        DispatchError::NotFound(resource.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        DispatchError::Forbidden(msg.into())
    }

    pub fn service_disabled(msg: impl Into<String>) -> Self {
        DispatchError::ServiceDisabled(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        DispatchError::Internal(msg.into())
    }

    pub fn validation_error(field: impl Into<String>, message: impl Into<String>) -> Self {
        DispatchError::ValidationFailed(vec![FieldError {
            field: field.into(),
            message: message.into(),
        }])
    }

    pub fn trip_not_found(trip_id: impl Into<String>) -> Self {
        DispatchError::NotFound(format!("trip not found: {}", trip_id.into()))
    }

    pub fn driver_not_found(driver_id: impl Into<String>) -> Self {
        DispatchError::NotFound(format!("driver not found: {}", driver_id.into()))
    }
}

impl From<serde_json::Error> for DispatchError {
    fn from(err: serde_json::Error) -> Self {
        DispatchError::Internal(format!("serialization failure: {}", err))
    }
}
