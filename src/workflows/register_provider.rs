//! Provider registration: stored off-chain first, then added on-chain.

use serde_json::{json, Value};

use super::{run_workflow, Job};
use crate::config::SyncConfig;
use crate::keys::{provider_keys, user_keys};
use crate::lab::Provider;
use crate::mutation::{
    api_step, invalidation_step, optimistic_step, step, ComposedMutation, ComposedMutationError,
    MutationOutcome, StepContext, StepError,
};
use crate::ports::Ports;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegisterProviderRequest {
    pub name: String,
    pub email: String,
    pub country: String,
    /// Provider wallet.
    pub account: String,
}

impl RegisterProviderRequest {
    fn provider(&self) -> Provider {
        Provider {
            account: self.account.trim().to_string(),
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            country: self.country.trim().to_string(),
        }
    }
}

type Ctx = StepContext<Job<RegisterProviderRequest>>;

pub async fn register_provider(
    ports: &Ports,
    config: &SyncConfig,
    request: RegisterProviderRequest,
) -> Result<MutationOutcome, ComposedMutationError> {
    let success = format!("Provider {} registered", request.name.trim());
    let mutation = ComposedMutation::sequential(
        ports.clone(),
        vec![
            step("validate-provider", validate_provider),
            api_step(
                "save-registration",
                &config.paths.provider_registration,
                |job: &Job<RegisterProviderRequest>, _: &[Value]| {
                    let provider = job.request.provider();
                    json!({
                        "name": provider.name,
                        "email": provider.email,
                        "country": provider.country,
                        "wallet": provider.account,
                    })
                },
                Some(config.paths.provider_registration_delete.as_str()),
            ),
            step("contract-add-provider", add_provider),
            optimistic_step(
                "optimistic-provider-list",
                |_: &Job<RegisterProviderRequest>| provider_keys::list(),
                |job: &Job<RegisterProviderRequest>, current: Option<Value>| {
                    with_provider(current, &job.request.provider())
                },
            ),
            invalidation_step("invalidate-caches", |job: &Job<RegisterProviderRequest>| {
                vec![provider_keys::all(), user_keys::is_provider(job.request.account.trim())]
            }),
        ],
    )
    .named("register-provider");

    run_workflow(mutation, Job::new(request, config), success).await
}

async fn validate_provider(ctx: Ctx) -> Result<Value, StepError> {
    let provider = ctx.vars.request.provider();
    if provider.name.is_empty() {
        return Err(StepError::validation("Provider name is required"));
    }
    if !is_email(&provider.email) {
        return Err(StepError::validation("A valid email address is required"));
    }
    if provider.country.is_empty() {
        return Err(StepError::validation("Country is required"));
    }
    if provider.account.is_empty() {
        return Err(StepError::validation("Provider wallet address is required"));
    }
    Ok(serde_json::to_value(provider)?)
}

fn is_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && !domain.is_empty() && !domain.contains('@'),
        None => false,
    }
}

async fn add_provider(ctx: Ctx) -> Result<Value, StepError> {
    let provider = ctx.vars.request.provider();
    let receipt = ctx
        .ports
        .contract
        .write(
            &ctx.vars.config.contract.add_provider,
            vec![
                json!(provider.name),
                json!(provider.account),
                json!(provider.email),
                json!(provider.country),
            ],
        )
        .await?;
    Ok(serde_json::to_value(receipt)?)
}

/// Append `provider` to a cached provider list, replacing any entry for the
/// same account.
fn with_provider(current: Option<Value>, provider: &Provider) -> Value {
    let mut providers: Vec<Provider> = current
        .and_then(|value| serde_json::from_value(value).ok())
        .unwrap_or_default();
    providers.retain(|p| !p.account.eq_ignore_ascii_case(&provider.account));
    providers.push(provider.clone());
    serde_json::to_value(providers).unwrap_or(Value::Array(Vec::new()))
}
