// src/services/payment_service.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing;

use crate::clock::Clock;
use crate::errors::{DispatchError, DispatchResult};
use crate::models::payment::{payment_id, Payment, PaymentMethod, PaymentStatus};
use crate::models::trip::{Trip, TripResponse, TripStatus};
use crate::store::{MemoryStore, StoreTxn};
use crate::utils::id_generator::{IdGenerator, IdType};

#[async_trait]
pub trait PaymentOperations: Send + Sync {
    async fn confirm_cash_payment(
        &self,
        driver_id: &str,
        trip_id: &str,
    ) -> DispatchResult<TripResponse>;
}

/// Write the deterministic payment record for a freshly completed trip.
/// Called from inside the completion transaction; a record left behind by a
/// retried completion is kept untouched.
pub(crate) fn create_pending_payment(txn: &mut StoreTxn<'_>, trip: &Trip, now: DateTime<Utc>) {
    let id = payment_id(&trip.id);
    if txn.payment(&id).is_some() {
        return;
    }
    txn.put_payment(Payment {
        id,
        trip_id: trip.id.clone(),
        passenger_id: trip.passenger_id.clone(),
        driver_id: trip.driver_id.clone(),
        amount: trip.fare_amount,
        currency: "ILS".to_string(),
        method: PaymentMethod::Cash,
        status: PaymentStatus::Pending,
        created_at: now,
        updated_at: now,
    });
}

/// Cash settlement on completed trips. The trip's `paymentStatus` and the
/// mirror document in `payments` move together in one transaction.
pub struct PaymentService {
    store: Arc<MemoryStore>,
    clock: Arc<dyn Clock>,
}

impl PaymentService {
    pub fn new(store: Arc<MemoryStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }
}

#[async_trait]
impl PaymentOperations for PaymentService {
    async fn confirm_cash_payment(
        &self,
        driver_id: &str,
        trip_id: &str,
    ) -> DispatchResult<TripResponse> {
        if !IdGenerator::validate_id(trip_id, Some(IdType::Trip)) {
            return Err(DispatchError::validation_error("tripId", "malformed trip id"));
        }
        let now = self.clock.now();
        let driver_id = driver_id.to_string();
        let trip_id = trip_id.to_string();

        let trip = self
            .store
            .transact(move |txn| {
                let mut trip = txn
                    .trip(&trip_id)
                    .cloned()
                    .ok_or_else(|| DispatchError::trip_not_found(&trip_id))?;
                if driver_id != trip.driver_id {
                    return Err(DispatchError::forbidden(
                        "caller is not the driver of this trip",
                    ));
                }
                if trip.status != TripStatus::Completed {
                    return Err(DispatchError::forbidden(format!(
                        "cash can only be confirmed on a completed trip: current_state={}",
                        trip.status
                    )));
                }
                if trip.payment_status != PaymentStatus::Pending {
                    return Err(DispatchError::forbidden("trip is already paid"));
                }

                trip.payment_status = PaymentStatus::Paid;
                trip.paid_at = Some(now);

                let key = payment_id(&trip.id);
                let mut payment = txn.payment(&key).cloned().unwrap_or_else(|| Payment {
                    id: key,
                    trip_id: trip.id.clone(),
                    passenger_id: trip.passenger_id.clone(),
                    driver_id: trip.driver_id.clone(),
                    amount: trip.fare_amount,
                    currency: "ILS".to_string(),
                    method: PaymentMethod::Cash,
                    status: PaymentStatus::Pending,
                    created_at: now,
                    updated_at: now,
                });
                payment.status = PaymentStatus::Paid;
                payment.updated_at = now;
                txn.put_payment(payment);

                txn.put_trip(trip.clone());
                Ok(trip)
            })
            .await?;

        tracing::info!(trip_id = %trip.id, amount = trip.fare_amount, "cash payment confirmed");
        Ok(trip.into())
    }
}
