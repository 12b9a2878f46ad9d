// src/models/system.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{DispatchError, DispatchResult};

/// Feature-flag singleton at `system/config`. A missing document reads as
/// the defaults below.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SystemConfig {
    pub trips_enabled: bool,
    pub roadblocks_enabled: bool,
    pub payments_enabled: bool,
    pub updated_at: Option<DateTime<Utc>>,
    pub updated_by: Option<String>,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            trips_enabled: true,
            roadblocks_enabled: true,
            payments_enabled: false,
            updated_at: None,
            updated_by: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FeatureFlag {
    Trips,
    Roadblocks,
    Payments,
}

impl SystemConfig {
    pub fn flag(&self, flag: FeatureFlag) -> bool {
        match flag {
            FeatureFlag::Trips => self.trips_enabled,
            FeatureFlag::Roadblocks => self.roadblocks_enabled,
            FeatureFlag::Payments => self.payments_enabled,
        }
    }

    pub fn set_flag(&mut self, flag: FeatureFlag, enabled: bool) {
        match flag {
            FeatureFlag::Trips => self.trips_enabled = enabled,
            FeatureFlag::Roadblocks => self.roadblocks_enabled = enabled,
            FeatureFlag::Payments => self.payments_enabled = enabled,
        }
    }
}

// Manager payloads

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleTripsPayload {
    pub enabled: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleFlagPayload {
    pub flag: String,
    pub enabled: bool,
}

impl ToggleFlagPayload {
    pub fn parse_flag(&self) -> DispatchResult<FeatureFlag> {
        match self.flag.as_str() {
            "trips" => Ok(FeatureFlag::Trips),
            "roadblocks" => Ok(FeatureFlag::Roadblocks),
            "payments" => Ok(FeatureFlag::Payments),
            other => Err(DispatchError::validation_error(
                "flag",
                format!("unknown feature flag: {}", other),
            )),
        }
    }
}
