use serde_json::Value;
use tracing::{debug, error};

use super::compensation::Compensation;
use super::error::{CompletedStep, RollbackResult};
use crate::ports::Ports;

/// A compensation tagged with the step that registered it.
#[derive(Debug, Clone, PartialEq)]
pub struct RollbackAction {
    pub step: String,
    pub compensation: Compensation,
}

/// Per-run bookkeeping: completed steps in order and the rollback stack.
#[derive(Debug, Default)]
pub struct ExecutionRecord {
    completed_steps: Vec<CompletedStep>,
    rollback_stack: Vec<RollbackAction>,
}

impl ExecutionRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a finished step and push its compensations.
    pub fn complete(&mut self, step: &str, result: Value, rollbacks: Vec<Compensation>) {
        self.rollback_stack
            .extend(rollbacks.into_iter().map(|compensation| RollbackAction {
                step: step.to_string(),
                compensation,
            }));
        self.completed_steps.push(CompletedStep {
            step: step.to_string(),
            result,
        });
    }

    pub fn results(&self) -> Vec<Value> {
        self.completed_steps.iter().map(|s| s.result.clone()).collect()
    }

    pub fn completed_steps(&self) -> &[CompletedStep] {
        &self.completed_steps
    }

    pub fn rollback_stack(&self) -> &[RollbackAction] {
        &self.rollback_stack
    }

    pub fn into_completed_steps(self) -> Vec<CompletedStep> {
        self.completed_steps
    }

    /// Apply every registered compensation, last registered first.
    ///
    /// A failing compensation is logged and recorded; the rest still run.
    pub async fn unwind(&mut self, ports: &Ports) -> Vec<RollbackResult> {
        let mut results = Vec::with_capacity(self.rollback_stack.len());
        while let Some(action) = self.rollback_stack.pop() {
            match action.compensation.apply(ports).await {
                Ok(result) => {
                    debug!(step = %action.step, kind = action.compensation.kind(), "rollback applied");
                    results.push(RollbackResult {
                        step: action.step,
                        success: true,
                        result: Some(result),
                        error: None,
                    });
                }
                Err(err) => {
                    error!(step = %action.step, kind = action.compensation.kind(), error = %err, "rollback failed");
                    results.push(RollbackResult {
                        step: action.step,
                        success: false,
                        result: None,
                        error: Some(err.to_string()),
                    });
                }
            }
        }
        results
    }
}
