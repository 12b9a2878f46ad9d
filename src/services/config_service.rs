// src/services/config_service.rs
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing;

use crate::clock::Clock;
use crate::errors::DispatchResult;
use crate::models::system::{FeatureFlag, SystemConfig};
use crate::store::MemoryStore;

struct CachedConfig {
    config: SystemConfig,
    fetched_at: Instant,
}

/// Read-through cache over the `system/config` singleton.
///
/// Reads tolerate a missing document by answering defaults. Writers persist
/// the document and invalidate this process's cache in the same call; other
/// processes converge at cache expiry.
pub struct ConfigService {
    store: Arc<MemoryStore>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    cached: RwLock<Option<CachedConfig>>,
}

impl ConfigService {
    pub fn new(store: Arc<MemoryStore>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            store,
            clock,
            ttl,
            cached: RwLock::new(None),
        }
    }

    /// Current flags, served from cache while fresh.
    pub async fn current(&self) -> SystemConfig {
        {
            let cached = self.cached.read().await;
            if let Some(entry) = cached.as_ref() {
                if entry.fetched_at.elapsed() < self.ttl {
                    return entry.config.clone();
                }
            }
        }

        let config = self.store.system_config().await.unwrap_or_default();
        let mut cached = self.cached.write().await;
        *cached = Some(CachedConfig {
            config: config.clone(),
            fetched_at: Instant::now(),
        });
        config
    }

    pub async fn trips_enabled(&self) -> bool {
        self.current().await.trips_enabled
    }

    pub async fn invalidate(&self) {
        *self.cached.write().await = None;
    }

    pub async fn set_trips_enabled(
        &self,
        enabled: bool,
        updated_by: &str,
    ) -> DispatchResult<SystemConfig> {
        self.set_flag(FeatureFlag::Trips, enabled, updated_by).await
    }

    pub async fn set_flag(
        &self,
        flag: FeatureFlag,
        enabled: bool,
        updated_by: &str,
    ) -> DispatchResult<SystemConfig> {
        let now = self.clock.now();
        let updated_by = updated_by.to_string();
        let updated = self
            .store
            .transact(move |txn| {
                let mut config = txn.system_config().cloned().unwrap_or_default();
                config.set_flag(flag, enabled);
                config.updated_at = Some(now);
                config.updated_by = Some(updated_by);
                txn.put_system_config(config.clone());
                Ok(config)
            })
            .await?;

        self.invalidate().await;
        tracing::info!(?flag, enabled, "system config flag updated");
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::{TimeZone, Utc};

    fn test_clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
        ))
    }

    #[tokio::test]
    async fn test_missing_document_reads_as_defaults() {
        let store = Arc::new(MemoryStore::new());
        let service = ConfigService::new(store, test_clock(), Duration::from_secs(10));

        let config = service.current().await;
        assert!(config.trips_enabled);
        assert!(!config.payments_enabled);
    }

    #[tokio::test]
    async fn test_writer_invalidates_own_cache() {
        let store = Arc::new(MemoryStore::new());
        let clock = test_clock();
        let service = ConfigService::new(store, clock.clone(), Duration::from_secs(3600));

        assert!(service.trips_enabled().await);
        service.set_trips_enabled(false, "mgr-1").await.unwrap();
        // Same process observes the toggle immediately despite the long TTL
        assert!(!service.trips_enabled().await);

        let config = service.current().await;
        assert_eq!(config.updated_by.as_deref(), Some("mgr-1"));
        assert_eq!(config.updated_at, Some(clock.now()));
    }

    #[tokio::test]
    async fn test_stale_cache_masks_foreign_writes_until_ttl() {
        let store = Arc::new(MemoryStore::new());
        let service = ConfigService::new(store.clone(), test_clock(), Duration::from_secs(3600));
        assert!(service.trips_enabled().await);

        // A different process writes the document directly
        store
            .transact(|txn| {
                let mut config = txn.system_config().cloned().unwrap_or_default();
                config.trips_enabled = false;
                txn.put_system_config(config);
                Ok(())
            })
            .await
            .unwrap();

        // Still cached here
        assert!(service.trips_enabled().await);
        // Until expiry (forced)
        service.invalidate().await;
        assert!(!service.trips_enabled().await);
    }

    #[tokio::test]
    async fn test_zero_ttl_always_rereads() {
        let store = Arc::new(MemoryStore::new());
        let service = ConfigService::new(store.clone(), test_clock(), Duration::from_secs(0));
        assert!(service.trips_enabled().await);

        store
            .transact(|txn| {
                let mut config = SystemConfig::default();
                config.trips_enabled = false;
                txn.put_system_config(config);
                Ok(())
            })
            .await
            .unwrap();

        assert!(!service.trips_enabled().await);
    }

    #[tokio::test]
    async fn test_toggle_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let service = ConfigService::new(store, test_clock(), Duration::from_secs(0));

        let first = service.set_trips_enabled(false, "mgr-1").await.unwrap();
        let second = service.set_trips_enabled(false, "mgr-1").await.unwrap();
        assert_eq!(first.trips_enabled, second.trips_enabled);
        assert!(!service.trips_enabled().await);
    }
}
