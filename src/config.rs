//! Endpoint, contract and refund settings shared by the workflows.
//!
//! Defaults cover the marketplace's standard deployment. A JSON document can
//! override any subset of fields:
//!
//! ```ignore
//! let config = SyncConfig::from_json(r#"{ "paths": { "checkAvailability": "/v2/availability" } }"#)?;
//! let config = SyncConfig::from_env()?; // LAB_BOOKING_SYNC_CONFIG=/etc/labs/sync.json
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

pub const CONFIG_ENV: &str = "LAB_BOOKING_SYNC_CONFIG";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// REST paths on the marketplace API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ApiPaths {
    pub check_availability: String,
    pub sso_reservation: String,
    pub sso_cancellation: String,
    pub provider_registration: String,
    pub provider_registration_delete: String,
    pub lab_metadata: String,
    pub lab_metadata_delete: String,
}

impl Default for ApiPaths {
    fn default() -> Self {
        Self {
            check_availability: "/api/bookings/checkAvailability".into(),
            sso_reservation: "/api/contract/reservation/reservationRequestSSO".into(),
            sso_cancellation: "/api/contract/reservation/cancelReservationSSO".into(),
            provider_registration: "/api/provider/saveRegistration".into(),
            provider_registration_delete: "/api/provider/deleteRegistration".into(),
            lab_metadata: "/api/provider/saveLabData".into(),
            lab_metadata_delete: "/api/provider/deleteLabData".into(),
        }
    }
}

/// Contract function names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ContractFunctions {
    pub reservation_request: String,
    pub cancel_reservation_request: String,
    pub cancel_booking: String,
    pub add_provider: String,
    pub add_lab: String,
}

impl Default for ContractFunctions {
    fn default() -> Self {
        Self {
            reservation_request: "reservationRequest".into(),
            cancel_reservation_request: "cancelReservationRequest".into(),
            cancel_booking: "cancelBooking".into(),
            add_provider: "addProvider".into(),
            add_lab: "addLab".into(),
        }
    }
}

/// Refund schedule for cancellations.
///
/// Cancelling at least `full_refund_hours` ahead refunds everything. Closer
/// to the start the refund falls linearly towards `min_percent`. A booking
/// that has started gets nothing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RefundPolicy {
    pub full_refund_hours: f64,
    pub min_percent: f64,
}

impl Default for RefundPolicy {
    fn default() -> Self {
        Self {
            full_refund_hours: 24.0,
            min_percent: 50.0,
        }
    }
}

impl RefundPolicy {
    /// Refund percentage for a cancellation `hours_until_start` ahead, or
    /// `None` once the booking has started.
    pub fn refund_percentage(&self, hours_until_start: f64) -> Option<f64> {
        if hours_until_start <= 0.0 {
            return None;
        }
        if hours_until_start >= self.full_refund_hours {
            return Some(100.0);
        }
        let scaled = self.min_percent
            + hours_until_start / self.full_refund_hours * (100.0 - self.min_percent);
        Some(scaled.clamp(self.min_percent, 100.0))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SyncConfig {
    pub paths: ApiPaths,
    pub contract: ContractFunctions,
    pub refund: RefundPolicy,
}

impl SyncConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&raw)
    }

    /// Load from the file named by `LAB_BOOKING_SYNC_CONFIG`, or defaults
    /// when it is unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var(CONFIG_ENV) {
            Ok(path) if !path.trim().is_empty() => {
                debug!(%path, "loading sync config");
                Self::from_file(path.trim())
            }
            _ => Ok(Self::default()),
        }
    }
}
