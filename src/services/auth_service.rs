// src/services/auth_service.rs
use std::sync::Arc;

use tracing;

use crate::errors::{DispatchError, DispatchResult};
use crate::models::user::Role;
use crate::store::MemoryStore;

/// Role resolution against `users/<userId>`.
///
/// Passenger and driver operations do not consult the stored role at all;
/// they compare the caller against the `passengerId`/`driverId` on the
/// target document. Only manager operations come through here.
pub struct AuthService {
    store: Arc<MemoryStore>,
}

impl AuthService {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }

    /// Role for a caller; unknown users default to passenger.
    pub async fn role_of(&self, user_id: &str) -> Role {
        match self.store.user(user_id).await {
            Some(user) => user.role,
            None => Role::Passenger,
        }
    }

    pub async fn require_manager(&self, user_id: &str) -> DispatchResult<Role> {
        let role = self.role_of(user_id).await;
        if !role.is_manager() {
            tracing::warn!(user_id, ?role, "manager operation rejected");
            return Err(DispatchError::forbidden(
                "operation requires manager or admin role",
            ));
        }
        Ok(role)
    }
}
