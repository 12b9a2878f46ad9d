// src/handlers/auth.rs
use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::errors::DispatchError;

/// Authenticated caller identity.
///
/// Phone/OTP authentication happens upstream; the gateway forwards the
/// verified identity in the `x-user-id` header. A request without it never
/// reaches a service.
pub struct AuthUser(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = DispatchError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get("x-user-id")
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| AuthUser(value.to_string()))
            .ok_or_else(|| DispatchError::unauthenticated("missing caller identity"))
    }
}
