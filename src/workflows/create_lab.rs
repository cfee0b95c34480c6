//! List a new lab: store its metadata, show it optimistically, mint it.

use serde_json::{json, Value};
use tracing::debug;

use super::{run_workflow, text_field, Job};
use crate::config::SyncConfig;
use crate::keys::{lab_keys, metadata_keys};
use crate::lab::{Lab, LabCacheExt, LabMetadata};
use crate::mutation::{
    api_step, invalidation_step, step, step_with_rollback, Compensation, ComposedMutation,
    ComposedMutationError, MutationOutcome, StepContext, StepError,
};
use crate::ports::{Ports, TxReceipt};

const OPTIMISTIC_INSERT: usize = 2;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreateLabRequest {
    /// Listing fields. `id` is assigned on-chain and ignored here.
    pub lab: Lab,
    pub metadata: LabMetadata,
    pub provider_address: String,
}

type Ctx = StepContext<Job<CreateLabRequest>>;

pub async fn create_lab(
    ports: &Ports,
    config: &SyncConfig,
    request: CreateLabRequest,
) -> Result<MutationOutcome, ComposedMutationError> {
    let success = format!("Lab {} listed", request.metadata.name);
    let mutation = ComposedMutation::sequential(
        ports.clone(),
        vec![
            step("validate-lab", validate_lab),
            api_step(
                "save-metadata",
                &config.paths.lab_metadata,
                |job: &Job<CreateLabRequest>, _: &[Value]| {
                    json!({ "uri": job.request.lab.uri, "data": job.request.metadata })
                },
                Some(config.paths.lab_metadata_delete.as_str()),
            ),
            step_with_rollback(
                "optimistic-insert",
                optimistic_insert,
                |_: &Job<CreateLabRequest>, result: &Value| {
                    Some(Compensation::RemoveOptimisticLab {
                        temp_id: text_field(result, "id")?,
                    })
                },
            ),
            step("contract-add-lab", add_lab),
            invalidation_step("invalidate-caches", |job: &Job<CreateLabRequest>| {
                vec![lab_keys::all(), metadata_keys::by_uri(&job.request.lab.uri)]
            }),
        ],
    )
    .named("create-lab");

    run_workflow(mutation, Job::new(request, config), success).await
}

async fn validate_lab(ctx: Ctx) -> Result<Value, StepError> {
    let request = &ctx.vars.request;
    if request.metadata.name.trim().is_empty() {
        return Err(StepError::validation("Lab name is required"));
    }
    if request.lab.uri.trim().is_empty() {
        return Err(StepError::validation("Lab metadata URI is required"));
    }
    if request.lab.price.trim().parse::<u128>().is_err() {
        return Err(StepError::validation("Lab price must be a whole number of token units"));
    }
    if request.lab.access_uri.trim().is_empty() {
        return Err(StepError::validation("Lab access URI is required"));
    }
    if request.provider_address.trim().is_empty() {
        return Err(StepError::validation("Provider wallet address is required"));
    }
    Ok(json!({ "valid": true }))
}

async fn optimistic_insert(ctx: Ctx) -> Result<Value, StepError> {
    let request = &ctx.vars.request;
    let draft = Lab {
        provider_address: Some(request.provider_address.clone()),
        ..request.lab.clone()
    };
    let lab = ctx.ports.cache.labs().add_optimistic_lab(&draft)?;
    Ok(serde_json::to_value(lab)?)
}

async fn add_lab(ctx: Ctx) -> Result<Value, StepError> {
    let lab = &ctx.vars.request.lab;
    let receipt: TxReceipt = ctx
        .ports
        .contract
        .write(
            &ctx.vars.config.contract.add_lab,
            vec![
                json!(lab.uri),
                json!(lab.price),
                json!(lab.auth),
                json!(lab.access_uri),
                json!(lab.access_key),
            ],
        )
        .await?;

    let labs = ctx.ports.cache.labs();
    if let Some(temp_id) = text_field(ctx.prior_result(OPTIMISTIC_INSERT), "id") {
        match &receipt.token_id {
            Some(token_id) => {
                let listed = Lab {
                    id: token_id.clone(),
                    provider_address: Some(ctx.vars.request.provider_address.clone()),
                    ..lab.clone()
                };
                labs.replace_optimistic_lab(&temp_id, &listed)?;
            }
            None => {
                debug!(%temp_id, "no token id returned, dropping optimistic lab");
                labs.remove_optimistic_lab(&temp_id)?;
            }
        }
    }
    Ok(serde_json::to_value(receipt)?)
}
