//! Compensating actions.
//!
//! A compensation is plain data describing how to undo a step. Steps register
//! them while running; on failure the engine applies them in reverse order
//! through [`Compensation::apply`]. Because they are data they can be logged,
//! compared in tests, and serialized.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::error::StepError;
use crate::booking::BookingCacheExt;
use crate::keys::QueryKey;
use crate::lab::LabCacheExt;
use crate::ports::Ports;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ApiMethod {
    Post,
    #[default]
    Delete,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Compensation {
    /// Put back what a key held before an optimistic patch. `None` drops the
    /// entry.
    RestoreCache {
        key: QueryKey,
        snapshot: Option<Value>,
    },
    RemoveOptimisticBooking {
        temp_id: String,
    },
    RemoveOptimisticLab {
        temp_id: String,
    },
    InvalidateQueries {
        keys: Vec<QueryKey>,
    },
    CallApi {
        #[serde(default)]
        method: ApiMethod,
        path: String,
        body: Value,
    },
    ContractCall {
        function: String,
        args: Vec<Value>,
    },
}

impl Compensation {
    pub fn restore(key: QueryKey, snapshot: Option<Value>) -> Self {
        Compensation::RestoreCache { key, snapshot }
    }

    pub fn delete(path: impl Into<String>, body: Value) -> Self {
        Compensation::CallApi {
            method: ApiMethod::Delete,
            path: path.into(),
            body,
        }
    }

    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Compensation::RestoreCache { .. } => "restore-cache",
            Compensation::RemoveOptimisticBooking { .. } => "remove-optimistic-booking",
            Compensation::RemoveOptimisticLab { .. } => "remove-optimistic-lab",
            Compensation::InvalidateQueries { .. } => "invalidate-queries",
            Compensation::CallApi { .. } => "call-api",
            Compensation::ContractCall { .. } => "contract-call",
        }
    }

    pub async fn apply(&self, ports: &Ports) -> Result<Value, StepError> {
        match self {
            Compensation::RestoreCache { key, snapshot } => {
                match snapshot {
                    Some(data) => ports.cache.set_query_data(key, data.clone())?,
                    None => {
                        ports.cache.remove_query_data(key)?;
                    }
                }
                Ok(json!({ "restored": key.to_string() }))
            }
            Compensation::RemoveOptimisticBooking { temp_id } => {
                ports.cache.bookings().remove_optimistic_booking(temp_id)?;
                Ok(json!({ "removed": temp_id }))
            }
            Compensation::RemoveOptimisticLab { temp_id } => {
                ports.cache.labs().remove_optimistic_lab(temp_id)?;
                Ok(json!({ "removed": temp_id }))
            }
            Compensation::InvalidateQueries { keys } => {
                let mut invalidated = 0;
                for key in keys {
                    invalidated += ports.cache.invalidate_queries(key)?;
                }
                Ok(json!({ "invalidated": invalidated }))
            }
            Compensation::CallApi { method, path, body } => {
                let response = match method {
                    ApiMethod::Post => ports.api.post(path, body.clone()).await?,
                    ApiMethod::Delete => ports.api.delete(path, body.clone()).await?,
                };
                Ok(response)
            }
            Compensation::ContractCall { function, args } => {
                let receipt = ports.contract.write(function, args.clone()).await?;
                Ok(serde_json::to_value(receipt)?)
            }
        }
    }
}
