//! External interfaces the mutation layer talks to.
//!
//! Everything outside the cache is reached through a port: the marketplace
//! REST API, the contract writer, and the user-facing notifier. Ports are
//! bundled in [`Ports`] and handed to every step explicitly.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use lab_booking_sync::ports::{InMemoryApi, InMemoryContract, LogNotifier, Ports};
//! use lab_booking_sync::cache::InMemoryQueryCache;
//!
//! let ports = Ports::new(
//!     Arc::new(InMemoryQueryCache::new()),
//!     Arc::new(InMemoryApi::new()),
//!     Arc::new(InMemoryContract::new()),
//!     Arc::new(LogNotifier::new()),
//! );
//! ```

#[cfg(feature = "http")]
mod http;
mod in_memory;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cache::QueryCache;

#[cfg(feature = "http")]
pub use http::HttpApiClient;
pub use in_memory::{ApiCall, ContractCall, InMemoryApi, InMemoryContract, LogNotifier};

/// Error returned by an [`ApiClient`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// Non-OK HTTP status. `message` is the server's error text when present.
    #[error("{message}")]
    Status { status: u16, message: String },
    #[error("request failed: {0}")]
    Transport(String),
    #[error("invalid response body: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        ApiError::Status {
            status,
            message: message.into(),
        }
    }
}

/// Error returned by a [`ContractWriter`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContractError {
    /// The transaction was mined but reverted.
    #[error("{0}")]
    Reverted(String),
    /// The user declined to sign.
    #[error("transaction rejected: {0}")]
    Rejected(String),
    #[error("contract call failed: {0}")]
    Transport(String),
}

/// Result of a successful contract write.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxReceipt {
    pub tx_hash: String,
    /// Reservation key decoded from the transaction logs, when the call
    /// created one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reservation_key: Option<String>,
    /// Token id minted by the call, for listings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_id: Option<String>,
}

/// Marketplace REST API.
#[async_trait]
pub trait ApiClient: Send + Sync {
    async fn post(&self, path: &str, body: Value) -> Result<Value, ApiError>;

    async fn delete(&self, path: &str, body: Value) -> Result<Value, ApiError>;
}

/// Contract write interface. Signing and submission live behind it.
#[async_trait]
pub trait ContractWriter: Send + Sync {
    async fn write(&self, function: &str, args: Vec<Value>) -> Result<TxReceipt, ContractError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Success,
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

impl Notification {
    pub fn success(message: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Success, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Info, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Error, message)
    }

    fn new(level: NotificationLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }
}

/// User-facing notifications. Delivery is fire-and-forget.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// The port bundle handed to workflows and steps.
#[derive(Clone)]
pub struct Ports {
    pub cache: Arc<dyn QueryCache>,
    pub api: Arc<dyn ApiClient>,
    pub contract: Arc<dyn ContractWriter>,
    pub notifier: Arc<dyn Notifier>,
}

impl Ports {
    pub fn new(
        cache: Arc<dyn QueryCache>,
        api: Arc<dyn ApiClient>,
        contract: Arc<dyn ContractWriter>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            cache,
            api,
            contract,
            notifier,
        }
    }

    pub fn notify(&self, notification: Notification) {
        self.notifier.notify(notification);
    }
}

impl std::fmt::Debug for Ports {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ports").finish_non_exhaustive()
    }
}
