use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cache::CacheError;
use crate::ports::{ApiError, ContractError};

/// Failure of a single step. The `Display` text is what users see.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StepError {
    /// Input or business-rule rejection.
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Contract(#[from] ContractError),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error("serialization failed: {0}")]
    Serde(String),
    #[error("{0}")]
    Other(String),
}

impl StepError {
    pub fn validation(message: impl Into<String>) -> Self {
        StepError::Validation(message.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, StepError::Validation(_))
    }
}

impl From<serde_json::Error> for StepError {
    fn from(err: serde_json::Error) -> Self {
        StepError::Serde(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedStep {
    pub step: String,
    pub result: Value,
}

/// Outcome of one compensation during rollback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollbackResult {
    pub step: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A failed composed mutation.
///
/// Displays as the failing step's message; the step name, rollback report
/// and completed steps are kept for callers that want them.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{cause}")]
pub struct ComposedMutationError {
    pub step: String,
    pub cause: StepError,
    pub rollback_results: Vec<RollbackResult>,
    pub completed_steps: Vec<CompletedStep>,
}

impl ComposedMutationError {
    /// Whether every compensation that ran succeeded.
    pub fn rolled_back_cleanly(&self) -> bool {
        self.rollback_results.iter().all(|r| r.success)
    }
}
