// src/state.rs
use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::models::user::{Role, User};
use crate::services::{
    auth_service::AuthService, config_service::ConfigService, driver_service::DriverService,
    matching_service::MatchingService, payment_service::PaymentService,
    sweeper_service::Sweeper, trip_service::TripService,
};
use crate::store::MemoryStore;
use crate::utils::pricing::PriceTable;

/// Process-level engine settings. Runtime feature flags live in the
/// persisted `SystemConfig` document instead; these knobs are fixed at
/// startup.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Offer expiry window for the selected driver.
    pub driver_response_timeout: chrono::Duration,
    /// How long an unmatched request stays open before the sweeper expires it.
    pub search_timeout: chrono::Duration,
    /// No-show window after a driver accepts.
    pub driver_arrival_timeout: chrono::Duration,
    pub max_active_trips_per_passenger: usize,
    pub max_active_trips_per_driver: usize,
    pub max_search_radius_km: f64,
    pub min_fare_ils: i64,
    pub rate_per_km: f64,
    pub config_cache_ttl: std::time::Duration,
    pub sweep_interval: std::time::Duration,
    pub bind_addr: String,
    /// User ids seeded with the manager role at startup.
    pub manager_ids: Vec<String>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            driver_response_timeout: chrono::Duration::seconds(20),
            search_timeout: chrono::Duration::seconds(120),
            driver_arrival_timeout: chrono::Duration::seconds(300),
            max_active_trips_per_passenger: 1,
            max_active_trips_per_driver: 1,
            max_search_radius_km: 15.0,
            min_fare_ils: 5,
            rate_per_km: 0.5,
            config_cache_ttl: std::time::Duration::from_secs(10),
            sweep_interval: std::time::Duration::from_secs(60),
            bind_addr: "0.0.0.0:3000".to_string(),
            manager_ids: Vec::new(),
        }
    }
}

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_f64(name: &str, default: f64) -> f64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl EngineSettings {
    /// Load settings from `DISPATCH_*` environment variables, falling back
    /// to the pilot defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            driver_response_timeout: chrono::Duration::seconds(env_u64(
                "DISPATCH_DRIVER_RESPONSE_TIMEOUT_SECS",
                20,
            ) as i64),
            search_timeout: chrono::Duration::seconds(
                env_u64("DISPATCH_SEARCH_TIMEOUT_SECS", 120) as i64,
            ),
            driver_arrival_timeout: chrono::Duration::seconds(env_u64(
                "DISPATCH_DRIVER_ARRIVAL_TIMEOUT_SECS",
                300,
            ) as i64),
            max_active_trips_per_passenger: env_u64("DISPATCH_MAX_ACTIVE_TRIPS_PER_PASSENGER", 1)
                as usize,
            max_active_trips_per_driver: env_u64("DISPATCH_MAX_ACTIVE_TRIPS_PER_DRIVER", 1)
                as usize,
            max_search_radius_km: env_f64("DISPATCH_MAX_SEARCH_RADIUS_KM", 15.0),
            min_fare_ils: env_u64("DISPATCH_MIN_FARE_ILS", 5) as i64,
            rate_per_km: env_f64("DISPATCH_RATE_PER_KM", 0.5),
            config_cache_ttl: std::time::Duration::from_secs(env_u64(
                "DISPATCH_CONFIG_CACHE_TTL_SECS",
                10,
            )),
            sweep_interval: std::time::Duration::from_secs(env_u64(
                "DISPATCH_SWEEP_INTERVAL_SECS",
                60,
            )),
            bind_addr: std::env::var("DISPATCH_BIND_ADDR")
                .unwrap_or_else(|_| defaults.bind_addr.clone()),
            manager_ids: std::env::var("DISPATCH_MANAGER_IDS")
                .map(|v| {
                    v.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
        }
    }

    pub fn price_table(&self) -> PriceTable {
        PriceTable {
            min_fare_ils: self.min_fare_ils,
            rate_per_km: self.rate_per_km,
        }
    }

    // Builder-style overrides for tests

    pub fn with_driver_response_timeout(mut self, timeout: chrono::Duration) -> Self {
        self.driver_response_timeout = timeout;
        self
    }

    pub fn with_search_timeout(mut self, timeout: chrono::Duration) -> Self {
        self.search_timeout = timeout;
        self
    }

    pub fn with_driver_arrival_timeout(mut self, timeout: chrono::Duration) -> Self {
        self.driver_arrival_timeout = timeout;
        self
    }

    pub fn with_max_search_radius_km(mut self, radius_km: f64) -> Self {
        self.max_search_radius_km = radius_km;
        self
    }

    pub fn with_config_cache_ttl(mut self, ttl: std::time::Duration) -> Self {
        self.config_cache_ttl = ttl;
        self
    }
}

pub struct AppState {
    pub settings: EngineSettings,
    pub store: Arc<MemoryStore>,
    pub config_service: Arc<ConfigService>,
    pub auth_service: Arc<AuthService>,
    pub driver_service: Arc<DriverService>,
    pub matching_service: Arc<MatchingService>,
    pub trip_service: Arc<TripService>,
    pub payment_service: Arc<PaymentService>,
    pub sweeper: Arc<Sweeper>,
}

impl AppState {
    pub fn new(settings: EngineSettings) -> Self {
        Self::with_clock(settings, Arc::new(SystemClock))
    }

    /// Wire every service onto the same store and clock. Tests inject a
    /// `ManualClock` here.
    pub fn with_clock(settings: EngineSettings, clock: Arc<dyn Clock>) -> Self {
        let store = Arc::new(MemoryStore::new());
        let config_service = Arc::new(ConfigService::new(
            store.clone(),
            clock.clone(),
            settings.config_cache_ttl,
        ));
        let auth_service = Arc::new(AuthService::new(store.clone()));
        let driver_service = Arc::new(DriverService::new(store.clone(), clock.clone()));
        let matching_service = Arc::new(MatchingService::new(
            store.clone(),
            config_service.clone(),
            clock.clone(),
            settings.clone(),
        ));
        let trip_service = Arc::new(TripService::new(store.clone(), clock.clone()));
        let payment_service = Arc::new(PaymentService::new(store.clone(), clock.clone()));
        let sweeper = Arc::new(Sweeper::new(store.clone(), clock, settings.clone()));

        Self {
            settings,
            store,
            config_service,
            auth_service,
            driver_service,
            matching_service,
            trip_service,
            payment_service,
            sweeper,
        }
    }

    /// Seed the configured manager identities into the `users` collection.
    pub async fn seed_managers(&self) {
        for id in &self.settings.manager_ids {
            tracing::info!(user_id = %id, "seeding manager role");
            self.store
                .put_user(User {
                    id: id.clone(),
                    role: Role::Manager,
                })
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_match_pilot_values() {
        let settings = EngineSettings::default();
        assert_eq!(settings.driver_response_timeout, chrono::Duration::seconds(20));
        assert_eq!(settings.search_timeout, chrono::Duration::seconds(120));
        assert_eq!(settings.driver_arrival_timeout, chrono::Duration::seconds(300));
        assert_eq!(settings.max_active_trips_per_passenger, 1);
        assert_eq!(settings.max_active_trips_per_driver, 1);
        assert_eq!(settings.max_search_radius_km, 15.0);
        assert_eq!(settings.min_fare_ils, 5);
        assert_eq!(settings.rate_per_km, 0.5);
        assert_eq!(settings.config_cache_ttl, std::time::Duration::from_secs(10));
    }

    #[test]
    fn test_builder_overrides() {
        let settings = EngineSettings::default()
            .with_search_timeout(chrono::Duration::seconds(5))
            .with_max_search_radius_km(2.0);
        assert_eq!(settings.search_timeout, chrono::Duration::seconds(5));
        assert_eq!(settings.max_search_radius_km, 2.0);
    }
}
