// src/store/memory.rs
//! Transactional document store backing the engine.
//!
//! Stand-in for the hosted document database: every collection lives behind
//! one writer lock, and a transaction is a synchronous closure over a cloned
//! working copy that replaces the live state only when it returns `Ok`. A
//! transaction therefore commits wholly or not at all, and concurrent
//! read-modify-write sequences on trip + driver + offer serialize on the
//! lock. Committed writes fan out as [`StoreEvent`]s to snapshot
//! subscribers.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, RwLock};

use crate::errors::DispatchResult;
use crate::models::driver::Driver;
use crate::models::payment::Payment;
use crate::models::system::SystemConfig;
use crate::models::trip::{DriverOffer, OfferStatus, RequestStatus, Trip, TripRequest, TripStatus};
use crate::models::user::User;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Drivers,
    TripRequests,
    Trips,
    DriverOffers,
    Payments,
    Users,
    SystemConfig,
}

/// Change notification emitted after a transaction commits.
#[derive(Debug, Clone)]
pub struct StoreEvent {
    pub collection: Collection,
    pub doc_id: String,
}

#[derive(Default, Clone)]
struct StoreInner {
    drivers: BTreeMap<String, Driver>,
    trip_requests: BTreeMap<String, TripRequest>,
    trips: BTreeMap<String, Trip>,
    // driver id -> trip id -> offer
    offers: BTreeMap<String, BTreeMap<String, DriverOffer>>,
    payments: BTreeMap<String, Payment>,
    users: BTreeMap<String, User>,
    system_config: Option<SystemConfig>,
}

pub struct MemoryStore {
    inner: RwLock<StoreInner>,
    events: broadcast::Sender<StoreEvent>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            inner: RwLock::new(StoreInner::default()),
            events,
        }
    }

    /// Snapshot subscription: every committed write surfaces here.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    /// Run `op` atomically. The closure sees a working copy of the whole
    /// store; an `Err` return discards every write it made.
    pub async fn transact<T>(
        &self,
        op: impl FnOnce(&mut StoreTxn<'_>) -> DispatchResult<T>,
    ) -> DispatchResult<T> {
        let mut guard = self.inner.write().await;
        let mut work = guard.clone();
        let mut txn = StoreTxn {
            inner: &mut work,
            touched: Vec::new(),
        };
        let out = op(&mut txn)?;
        let touched = txn.touched;
        *guard = work;
        drop(guard);
        for event in touched {
            let _ = self.events.send(event);
        }
        Ok(out)
    }

    // Point reads

    pub async fn driver(&self, id: &str) -> Option<Driver> {
        self.inner.read().await.drivers.get(id).cloned()
    }

    pub async fn trip(&self, id: &str) -> Option<Trip> {
        self.inner.read().await.trips.get(id).cloned()
    }

    pub async fn trip_request(&self, id: &str) -> Option<TripRequest> {
        self.inner.read().await.trip_requests.get(id).cloned()
    }

    pub async fn offer(&self, driver_id: &str, trip_id: &str) -> Option<DriverOffer> {
        self.inner
            .read()
            .await
            .offers
            .get(driver_id)
            .and_then(|m| m.get(trip_id))
            .cloned()
    }

    pub async fn payment(&self, id: &str) -> Option<Payment> {
        self.inner.read().await.payments.get(id).cloned()
    }

    pub async fn user(&self, id: &str) -> Option<User> {
        self.inner.read().await.users.get(id).cloned()
    }

    pub async fn system_config(&self) -> Option<SystemConfig> {
        self.inner.read().await.system_config.clone()
    }

    // Queries

    /// Drivers with `isOnline && isAvailable`, in key order.
    pub async fn available_drivers(&self) -> Vec<Driver> {
        self.inner
            .read()
            .await
            .drivers
            .values()
            .filter(|d| d.is_online && d.is_available)
            .cloned()
            .collect()
    }

    pub async fn active_trips_for_passenger(&self, passenger_id: &str) -> Vec<Trip> {
        self.inner
            .read()
            .await
            .trips
            .values()
            .filter(|t| t.passenger_id == passenger_id && t.status.is_active())
            .cloned()
            .collect()
    }

    pub async fn active_trips_for_driver(&self, driver_id: &str) -> Vec<Trip> {
        self.inner
            .read()
            .await
            .trips
            .values()
            .filter(|t| t.driver_id == driver_id && t.status.is_active())
            .cloned()
            .collect()
    }

    /// Open requests created strictly before `cutoff`.
    pub async fn open_requests_before(&self, cutoff: DateTime<Utc>) -> Vec<TripRequest> {
        self.inner
            .read()
            .await
            .trip_requests
            .values()
            .filter(|r| r.status == RequestStatus::Open && r.created_at < cutoff)
            .cloned()
            .collect()
    }

    /// Accepted trips whose `acceptedAt` is strictly before `cutoff`.
    pub async fn accepted_trips_before(&self, cutoff: DateTime<Utc>) -> Vec<Trip> {
        self.inner
            .read()
            .await
            .trips
            .values()
            .filter(|t| {
                t.status == TripStatus::Accepted
                    && t.accepted_at.map(|at| at < cutoff).unwrap_or(false)
            })
            .cloned()
            .collect()
    }

    /// Pending trips whose driver offer is still pending but past expiry.
    pub async fn pending_trips_with_expired_offer(&self, now: DateTime<Utc>) -> Vec<Trip> {
        let inner = self.inner.read().await;
        inner
            .trips
            .values()
            .filter(|t| t.status == TripStatus::Pending)
            .filter(|t| {
                inner
                    .offers
                    .get(&t.driver_id)
                    .and_then(|m| m.get(&t.id))
                    .map(|o| o.status == OfferStatus::Pending && o.expires_at <= now)
                    .unwrap_or(false)
            })
            .cloned()
            .collect()
    }

    /// Seed or replace a user document. Used at startup for manager
    /// bootstrap and by tests.
    pub async fn put_user(&self, user: User) {
        let id = user.id.clone();
        self.inner.write().await.users.insert(id.clone(), user);
        let _ = self.events.send(StoreEvent {
            collection: Collection::Users,
            doc_id: id,
        });
    }
}

/// Mutable view of the store inside a transaction.
pub struct StoreTxn<'a> {
    inner: &'a mut StoreInner,
    touched: Vec<StoreEvent>,
}

impl StoreTxn<'_> {
    fn touch(&mut self, collection: Collection, doc_id: &str) {
        self.touched.push(StoreEvent {
            collection,
            doc_id: doc_id.to_string(),
        });
    }

    // Reads (within the transaction's consistent view)

    pub fn driver(&self, id: &str) -> Option<&Driver> {
        self.inner.drivers.get(id)
    }

    pub fn trip(&self, id: &str) -> Option<&Trip> {
        self.inner.trips.get(id)
    }

    pub fn trip_request(&self, id: &str) -> Option<&TripRequest> {
        self.inner.trip_requests.get(id)
    }

    pub fn offer(&self, driver_id: &str, trip_id: &str) -> Option<&DriverOffer> {
        self.inner
            .offers
            .get(driver_id)
            .and_then(|m| m.get(trip_id))
    }

    pub fn payment(&self, id: &str) -> Option<&Payment> {
        self.inner.payments.get(id)
    }

    pub fn system_config(&self) -> Option<&SystemConfig> {
        self.inner.system_config.as_ref()
    }

    pub fn active_trip_count_for_passenger(&self, passenger_id: &str) -> usize {
        self.inner
            .trips
            .values()
            .filter(|t| t.passenger_id == passenger_id && t.status.is_active())
            .count()
    }

    pub fn active_trip_count_for_driver(&self, driver_id: &str) -> usize {
        self.inner
            .trips
            .values()
            .filter(|t| t.driver_id == driver_id && t.status.is_active())
            .count()
    }

    // Writes

    pub fn put_driver(&mut self, driver: Driver) {
        self.touch(Collection::Drivers, &driver.id);
        self.inner.drivers.insert(driver.id.clone(), driver);
    }

    pub fn put_trip(&mut self, trip: Trip) {
        self.touch(Collection::Trips, &trip.id);
        self.inner.trips.insert(trip.id.clone(), trip);
    }

    pub fn put_trip_request(&mut self, request: TripRequest) {
        self.touch(Collection::TripRequests, &request.id);
        self.inner
            .trip_requests
            .insert(request.id.clone(), request);
    }

    pub fn put_offer(&mut self, offer: DriverOffer) {
        self.touch(Collection::DriverOffers, &offer.trip_id);
        self.inner
            .offers
            .entry(offer.driver_id.clone())
            .or_default()
            .insert(offer.trip_id.clone(), offer);
    }

    pub fn put_payment(&mut self, payment: Payment) {
        self.touch(Collection::Payments, &payment.id);
        self.inner.payments.insert(payment.id.clone(), payment);
    }

    pub fn put_system_config(&mut self, config: SystemConfig) {
        self.touch(Collection::SystemConfig, "config");
        self.inner.system_config = Some(config);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::DispatchError;
    use chrono::TimeZone;

    fn test_driver(id: &str) -> Driver {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let mut driver = Driver::new(id, now);
        driver.is_online = true;
        driver.is_available = true;
        driver
    }

    #[tokio::test]
    async fn test_transact_commits_on_ok() {
        let store = MemoryStore::new();
        store
            .transact(|txn| {
                txn.put_driver(test_driver("drv-1"));
                Ok(())
            })
            .await
            .unwrap();

        let driver = store.driver("drv-1").await.unwrap();
        assert!(driver.is_available);
    }

    #[tokio::test]
    async fn test_transact_rolls_back_on_err() {
        let store = MemoryStore::new();
        store
            .transact(|txn| {
                txn.put_driver(test_driver("drv-1"));
                Ok(())
            })
            .await
            .unwrap();

        let result: DispatchResult<()> = store
            .transact(|txn| {
                let mut driver = txn.driver("drv-1").cloned().unwrap();
                driver.is_available = false;
                driver.current_trip_id = Some("trp-260301-00000000".to_string());
                txn.put_driver(driver);
                Err(DispatchError::forbidden("abort after write"))
            })
            .await;
        assert!(result.is_err());

        // The aborted write is invisible
        let driver = store.driver("drv-1").await.unwrap();
        assert!(driver.is_available);
        assert!(driver.current_trip_id.is_none());
    }

    #[tokio::test]
    async fn test_events_fire_only_on_commit() {
        let store = MemoryStore::new();
        let mut events = store.subscribe();

        let _: DispatchResult<()> = store
            .transact(|txn| {
                txn.put_driver(test_driver("drv-1"));
                Err(DispatchError::forbidden("abort"))
            })
            .await;
        store
            .transact(|txn| {
                txn.put_driver(test_driver("drv-2"));
                Ok(())
            })
            .await
            .unwrap();

        let event = events.try_recv().unwrap();
        assert_eq!(event.collection, Collection::Drivers);
        assert_eq!(event.doc_id, "drv-2");
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_available_driver_query() {
        let store = MemoryStore::new();
        store
            .transact(|txn| {
                let mut online = test_driver("drv-a");
                online.is_available = false;
                txn.put_driver(online);
                txn.put_driver(test_driver("drv-b"));
                let mut offline = test_driver("drv-c");
                offline.is_online = false;
                offline.is_available = false;
                txn.put_driver(offline);
                Ok(())
            })
            .await
            .unwrap();

        let available = store.available_drivers().await;
        assert_eq!(available.len(), 1);
        assert_eq!(available[0].id, "drv-b");
    }
}
