// src/models/payment.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
}

/// Payment record, keyed deterministically as `payment_<tripId>` so retried
/// completions can never write it twice.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: String,
    pub trip_id: String,
    pub passenger_id: String,
    pub driver_id: String,
    pub amount: i64,
    pub currency: String,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Deterministic payment document key for a trip.
pub fn payment_id(trip_id: &str) -> String {
    format!("payment_{}", trip_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_id_is_deterministic() {
        assert_eq!(payment_id("trp-260301-a1b2c"), "payment_trp-260301-a1b2c");
        assert_eq!(payment_id("trp-260301-a1b2c"), payment_id("trp-260301-a1b2c"));
    }
}
