//! In-memory port implementations for tests and local development.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use super::{
    ApiClient, ApiError, ContractError, ContractWriter, Notification, NotificationLevel, Notifier,
    TxReceipt,
};

/// A recorded API request.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiCall {
    pub method: &'static str,
    pub path: String,
    pub body: Value,
}

/// Canned REST API. Unconfigured paths answer `{ "success": true }`.
#[derive(Clone, Default)]
pub struct InMemoryApi {
    responses: Arc<RwLock<HashMap<String, Result<Value, ApiError>>>>,
    calls: Arc<Mutex<Vec<ApiCall>>>,
}

impl InMemoryApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, path: &str, body: Value) -> Self {
        self.set(path, Ok(body));
        self
    }

    pub fn fail(self, path: &str, err: ApiError) -> Self {
        self.set(path, Err(err));
        self
    }

    /// Replace the canned outcome for `path` on a shared instance.
    pub fn set(&self, path: &str, outcome: Result<Value, ApiError>) {
        if let Ok(mut responses) = self.responses.write() {
            responses.insert(path.to_string(), outcome);
        }
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn calls_to(&self, path: &str) -> Vec<ApiCall> {
        self.calls().into_iter().filter(|c| c.path == path).collect()
    }

    fn answer(&self, method: &'static str, path: &str, body: Value) -> Result<Value, ApiError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(ApiCall {
                method,
                path: path.to_string(),
                body,
            });
        }
        let responses = self
            .responses
            .read()
            .map_err(|_| ApiError::Transport("lock poisoned".into()))?;
        responses
            .get(path)
            .cloned()
            .unwrap_or_else(|| Ok(json!({ "success": true })))
    }
}

#[async_trait]
impl ApiClient for InMemoryApi {
    async fn post(&self, path: &str, body: Value) -> Result<Value, ApiError> {
        self.answer("POST", path, body)
    }

    async fn delete(&self, path: &str, body: Value) -> Result<Value, ApiError> {
        self.answer("DELETE", path, body)
    }
}

/// A recorded contract write.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractCall {
    pub function: String,
    pub args: Vec<Value>,
}

/// Contract writer with per-function outcomes.
///
/// Unconfigured functions succeed with a generated tx hash and no reservation
/// key.
#[derive(Clone, Default)]
pub struct InMemoryContract {
    outcomes: Arc<RwLock<HashMap<String, Result<TxReceipt, ContractError>>>>,
    calls: Arc<Mutex<Vec<ContractCall>>>,
}

impl InMemoryContract {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn receipt(self, function: &str, receipt: TxReceipt) -> Self {
        self.set(function, Ok(receipt));
        self
    }

    pub fn revert(self, function: &str, reason: &str) -> Self {
        self.set(function, Err(ContractError::Reverted(reason.to_string())));
        self
    }

    pub fn set(&self, function: &str, outcome: Result<TxReceipt, ContractError>) {
        if let Ok(mut outcomes) = self.outcomes.write() {
            outcomes.insert(function.to_string(), outcome);
        }
    }

    pub fn calls(&self) -> Vec<ContractCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn calls_to(&self, function: &str) -> Vec<ContractCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.function == function)
            .collect()
    }
}

#[async_trait]
impl ContractWriter for InMemoryContract {
    async fn write(&self, function: &str, args: Vec<Value>) -> Result<TxReceipt, ContractError> {
        let sequence = {
            let mut calls = self
                .calls
                .lock()
                .map_err(|_| ContractError::Transport("lock poisoned".into()))?;
            calls.push(ContractCall {
                function: function.to_string(),
                args,
            });
            calls.len()
        };
        let outcomes = self
            .outcomes
            .read()
            .map_err(|_| ContractError::Transport("lock poisoned".into()))?;
        outcomes.get(function).cloned().unwrap_or_else(|| {
            Ok(TxReceipt {
                tx_hash: format!("0x{:064x}", sequence),
                ..Default::default()
            })
        })
    }
}

/// Notifier that logs through `tracing` and can keep what it received.
#[derive(Clone, Default)]
pub struct LogNotifier {
    buffer: Option<Arc<Mutex<Vec<Notification>>>>,
}

impl LogNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn buffered() -> Self {
        Self {
            buffer: Some(Arc::new(Mutex::new(Vec::new()))),
        }
    }

    /// Buffered notifications, oldest first. Always empty when unbuffered.
    pub fn received(&self) -> Vec<Notification> {
        self.buffer
            .as_ref()
            .and_then(|b| b.lock().ok().map(|n| n.clone()))
            .unwrap_or_default()
    }
}

impl Notifier for LogNotifier {
    fn notify(&self, notification: Notification) {
        match notification.level {
            NotificationLevel::Error => error!(message = %notification.message, "notify"),
            NotificationLevel::Warning => warn!(message = %notification.message, "notify"),
            NotificationLevel::Success | NotificationLevel::Info => {
                info!(message = %notification.message, "notify")
            }
        }
        if let Some(buffer) = &self.buffer {
            if let Ok(mut buffer) = buffer.lock() {
                buffer.push(notification);
            }
        }
    }
}
