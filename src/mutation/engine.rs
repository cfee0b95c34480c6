use std::sync::Arc;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::error::{CompletedStep, ComposedMutationError, StepError};
use super::record::ExecutionRecord;
use super::step::{Step, StepHandle};
use crate::ports::Ports;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationOutcome {
    pub success: bool,
    pub results: Vec<Value>,
    pub completed_steps: Vec<CompletedStep>,
}

enum Plan<V> {
    Sequential(Vec<Box<dyn Step<V>>>),
    Parallel(Vec<Vec<Box<dyn Step<V>>>>),
}

/// An ordered set of steps that either all complete or are compensated.
pub struct ComposedMutation<V> {
    name: String,
    ports: Ports,
    plan: Plan<V>,
}

impl<V: Send + Sync + 'static> ComposedMutation<V> {
    /// Run `steps` one after another; a failure stops the run.
    pub fn sequential(ports: Ports, steps: Vec<Box<dyn Step<V>>>) -> Self {
        Self {
            name: "composed-mutation".to_string(),
            ports,
            plan: Plan::Sequential(steps),
        }
    }

    /// Run groups in order, the steps inside a group concurrently.
    pub fn parallel(ports: Ports, groups: Vec<Vec<Box<dyn Step<V>>>>) -> Self {
        Self {
            name: "composed-mutation".to_string(),
            ports,
            plan: Plan::Parallel(groups),
        }
    }

    /// Name used in log events.
    pub fn named(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn ports(&self) -> &Ports {
        &self.ports
    }

    pub async fn run(&self, variables: V) -> Result<MutationOutcome, ComposedMutationError> {
        let variables = Arc::new(variables);
        let mut record = ExecutionRecord::new();

        match &self.plan {
            Plan::Sequential(steps) => {
                for step in steps {
                    let mut handle = StepHandle::new(self.ports.clone());
                    debug!(mutation = %self.name, step = step.name(), "step started");
                    match step
                        .execute(Arc::clone(&variables), record.results(), &mut handle)
                        .await
                    {
                        Ok(result) => {
                            debug!(mutation = %self.name, step = step.name(), "step finished");
                            record.complete(step.name(), result, handle.into_rollbacks());
                        }
                        Err(cause) => return Err(self.fail(record, step.name(), cause).await),
                    }
                }
            }
            Plan::Parallel(groups) => {
                for group in groups {
                    let prior = record.results();
                    let runs = group.iter().map(|step| {
                        let variables = Arc::clone(&variables);
                        let prior = prior.clone();
                        let mut handle = StepHandle::new(self.ports.clone());
                        async move {
                            debug!(mutation = %self.name, step = step.name(), "step started");
                            let outcome = step.execute(variables, prior, &mut handle).await;
                            (step.name(), outcome, handle)
                        }
                    });

                    let mut failure: Option<(&str, StepError)> = None;
                    for (name, outcome, handle) in join_all(runs).await {
                        match outcome {
                            Ok(result) => record.complete(name, result, handle.into_rollbacks()),
                            Err(cause) => {
                                if failure.is_none() {
                                    failure = Some((name, cause));
                                }
                            }
                        }
                    }
                    if let Some((name, cause)) = failure {
                        return Err(self.fail(record, name, cause).await);
                    }
                }
            }
        }

        info!(mutation = %self.name, steps = record.completed_steps().len(), "mutation completed");
        let results = record.results();
        Ok(MutationOutcome {
            success: true,
            results,
            completed_steps: record.into_completed_steps(),
        })
    }

    async fn fail(
        &self,
        mut record: ExecutionRecord,
        step: &str,
        cause: StepError,
    ) -> ComposedMutationError {
        warn!(
            mutation = %self.name,
            step,
            error = %cause,
            rollbacks = record.rollback_stack().len(),
            "step failed, rolling back"
        );
        let rollback_results = record.unwind(&self.ports).await;
        ComposedMutationError {
            step: step.to_string(),
            cause,
            rollback_results,
            completed_steps: record.into_completed_steps(),
        }
    }
}
