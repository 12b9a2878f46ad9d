// src/services/driver_service.rs
use async_trait::async_trait;
use std::sync::Arc;
use tracing;

use crate::clock::Clock;
use crate::errors::{DispatchError, DispatchResult};
use crate::models::driver::{Driver, DriverResponse, GeoPoint};
use crate::store::MemoryStore;

#[async_trait]
pub trait DriverOperations: Send + Sync {
    async fn set_online(&self, driver_id: &str, online: bool) -> DispatchResult<DriverResponse>;
    async fn update_location(
        &self,
        driver_id: &str,
        location: GeoPoint,
    ) -> DispatchResult<DriverResponse>;
    async fn get_driver(&self, driver_id: &str) -> DispatchResult<Option<DriverResponse>>;
}

/// Ingress for the driver's own document: online/offline opt-in and
/// periodic position updates. The `isAvailable`/`currentTripId` pair is
/// never written here; that coupling belongs to the matching claim and the
/// state-machine release.
pub struct DriverService {
    store: Arc<MemoryStore>,
    clock: Arc<dyn Clock>,
}

impl DriverService {
    pub fn new(store: Arc<MemoryStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }
}

#[async_trait]
impl DriverOperations for DriverService {
    async fn set_online(&self, driver_id: &str, online: bool) -> DispatchResult<DriverResponse> {
        let now = self.clock.now();
        let driver_id = driver_id.to_string();
        let driver = self
            .store
            .transact(move |txn| {
                let mut driver = txn
                    .driver(&driver_id)
                    .cloned()
                    .unwrap_or_else(|| Driver::new(driver_id.clone(), now));
                driver.is_online = online;
                // A claimed driver stays unavailable until the trip releases it
                driver.is_available = online && driver.current_trip_id.is_none();
                driver.updated_at = now;
                txn.put_driver(driver.clone());
                Ok(driver)
            })
            .await?;

        tracing::info!(driver_id = %driver.id, online, "driver online state changed");
        Ok(driver.into())
    }

    async fn update_location(
        &self,
        driver_id: &str,
        location: GeoPoint,
    ) -> DispatchResult<DriverResponse> {
        let now = self.clock.now();
        let driver_id = driver_id.to_string();
        let driver = self
            .store
            .transact(move |txn| {
                let mut driver = txn
                    .driver(&driver_id)
                    .cloned()
                    .ok_or_else(|| DispatchError::driver_not_found(&driver_id))?;
                driver.last_location = Some(location);
                driver.updated_at = now;
                txn.put_driver(driver.clone());
                Ok(driver)
            })
            .await?;

        tracing::debug!(driver_id = %driver.id, "driver location updated");
        Ok(driver.into())
    }

    async fn get_driver(&self, driver_id: &str) -> DispatchResult<Option<DriverResponse>> {
        Ok(self.store.driver(driver_id).await.map(Into::into))
    }
}
