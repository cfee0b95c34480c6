//! Cancel a booking with a time-scaled refund.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{cancel_function, patch_views, resolve_owned_booking, run_workflow, text_field, Channel, Job};
use crate::booking::{hours_until_start, Booking, BookingPatch, BookingStatus};
use crate::config::SyncConfig;
use crate::keys::booking_keys;
use crate::mutation::{
    step, Compensation, ComposedMutation, ComposedMutationError, MutationOutcome, Step,
    StepContext, StepError, StepHandle,
};
use crate::ports::{Notification, Ports};

const VALIDATE: usize = 0;
const REFUND: usize = 1;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CancelBookingRequest {
    pub reservation_key: String,
    pub caller_address: Option<String>,
    pub channel: Channel,
    /// The booking as the caller sees it. Looked up in the cache when absent.
    pub booking: Option<Booking>,
}

type Ctx = StepContext<Job<CancelBookingRequest>>;

pub async fn cancel_booking(
    ports: &Ports,
    config: &SyncConfig,
    request: CancelBookingRequest,
) -> Result<MutationOutcome, ComposedMutationError> {
    let success = format!("Booking {} cancelled", request.reservation_key);
    let mutation = ComposedMutation::sequential(
        ports.clone(),
        vec![
            step("validate-cancellation", validate_cancellation),
            step("calculate-refund", calculate_refund),
            optimistic_cancel(),
            step("blockchain-cancel", blockchain_cancel),
            step("send-notifications", send_notifications),
            step("invalidate-caches", invalidate_caches),
        ],
    )
    .named("cancel-booking");

    run_workflow(mutation, Job::new(request, config), success).await
}

fn resolved(prior: &[Value]) -> Result<Booking, StepError> {
    Ok(serde_json::from_value(prior.get(VALIDATE).cloned().unwrap_or(Value::Null))?)
}

async fn validate_cancellation(ctx: Ctx) -> Result<Value, StepError> {
    let request = &ctx.vars.request;
    let booking = resolve_owned_booking(
        ctx.ports.cache.as_ref(),
        &request.reservation_key,
        request.booking.as_ref(),
        request.caller_address.as_deref(),
        request.channel,
    )?;
    Ok(serde_json::to_value(booking)?)
}

async fn calculate_refund(ctx: Ctx) -> Result<Value, StepError> {
    let booking = resolved(&ctx.prior)?;
    let hours = hours_until_start(&booking, ctx.vars.now)
        .ok_or_else(|| StepError::validation("Booking has no start time"))?;
    let percentage = ctx
        .vars
        .config
        .refund
        .refund_percentage(hours)
        .ok_or_else(|| StepError::validation("Bookings that have already started cannot be cancelled"))?;
    Ok(json!({ "hoursUntilStart": hours, "refundPercentage": percentage }))
}

/// Marks the booking cancelled and pending in every cached view, restoring
/// the snapshots on rollback.
struct OptimisticCancel;

fn optimistic_cancel() -> Box<dyn Step<Job<CancelBookingRequest>>> {
    Box::new(OptimisticCancel)
}

#[async_trait]
impl Step<Job<CancelBookingRequest>> for OptimisticCancel {
    fn name(&self) -> &str {
        "optimistic-cancel"
    }

    async fn execute(
        &self,
        _variables: Arc<Job<CancelBookingRequest>>,
        prior: Vec<Value>,
        handle: &mut StepHandle,
    ) -> Result<Value, StepError> {
        let booking = resolved(&prior)?;
        let patch = BookingPatch {
            is_pending: Some(true),
            ..BookingPatch::status(BookingStatus::Cancelled)
        };
        let snapshots = patch_views(handle.ports().cache.as_ref(), &booking, &patch)?;
        let patched = snapshots.len();
        for (key, snapshot) in snapshots {
            handle.register_rollback(Compensation::restore(key, snapshot));
        }
        Ok(json!({ "patchedViews": patched }))
    }
}

async fn blockchain_cancel(ctx: Ctx) -> Result<Value, StepError> {
    let request = &ctx.vars.request;
    let config = &ctx.vars.config;
    let booking = resolved(&ctx.prior)?;
    let key = request.reservation_key.clone();

    let tx_hash = match request.channel {
        Channel::Wallet => {
            let function = cancel_function(config, &booking);
            let receipt = ctx.ports.contract.write(function, vec![json!(key)]).await?;
            Some(receipt.tx_hash)
        }
        Channel::Sso => {
            let response = ctx
                .ports
                .api
                .post(
                    &config.paths.sso_cancellation,
                    json!({ "reservationKey": key, "userAddress": booking.user_address }),
                )
                .await?;
            text_field(&response, "txHash")
        }
    };

    let confirmed = BookingPatch {
        is_pending: Some(false),
        tx_hash: tx_hash.clone(),
        ..BookingPatch::status(BookingStatus::Cancelled)
    };
    patch_views(ctx.ports.cache.as_ref(), &booking, &confirmed)?;
    Ok(json!({ "txHash": tx_hash, "reservationKey": key }))
}

async fn send_notifications(ctx: Ctx) -> Result<Value, StepError> {
    let percentage = ctx
        .prior_result(REFUND)
        .get("refundPercentage")
        .and_then(Value::as_f64)
        .unwrap_or(0.0);
    let message = format!("Cancellation submitted, refund {:.0}%", percentage);
    ctx.ports.notify(Notification::info(message.clone()));
    Ok(json!({ "notified": message }))
}

async fn invalidate_caches(ctx: Ctx) -> Result<Value, StepError> {
    let booking = resolved(&ctx.prior)?;
    let mut keys = vec![booking_keys::by_reservation_key(&ctx.vars.request.reservation_key)];
    if let Some(owner) = &booking.user_address {
        keys.push(booking_keys::by_user(owner));
        keys.push(booking_keys::has_active_booking(owner));
    }
    if let Some(lab_id) = &booking.lab_id {
        keys.push(booking_keys::by_lab(lab_id));
    }
    let mut invalidated = 0;
    for key in &keys {
        invalidated += ctx.ports.cache.invalidate_queries(key)?;
    }
    Ok(json!({ "invalidated": invalidated }))
}
