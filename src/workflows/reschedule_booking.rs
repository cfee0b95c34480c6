//! Move a booking to a new slot: reserve the new slot first, then cancel the
//! old reservation. If cancelling the old one fails, the new reservation is
//! cancelled again.

use serde_json::{json, Value};

use super::{
    cancel_function, check_window, conflicts, is_available, patch_views, resolve_owned_booking,
    run_workflow, text_field, Channel, Job, SLOT_UNAVAILABLE,
};
use crate::booking::{Booking, BookingCacheExt, BookingPatch, BookingStatus, OptimisticBookingInput};
use crate::cache::read_list;
use crate::config::SyncConfig;
use crate::keys::booking_keys;
use crate::mutation::{
    step, step_with_rollback, ApiMethod, Compensation, ComposedMutation,
    ComposedMutationError, MutationOutcome, StepContext, StepError,
};
use crate::ports::Ports;

const VALIDATE: usize = 0;
const OPTIMISTIC_INSERT: usize = 2;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RescheduleBookingRequest {
    pub reservation_key: String,
    pub caller_address: Option<String>,
    pub channel: Channel,
    pub booking: Option<Booking>,
    pub new_start: i64,
    pub new_end: i64,
}

type Ctx = StepContext<Job<RescheduleBookingRequest>>;

pub async fn reschedule_booking(
    ports: &Ports,
    config: &SyncConfig,
    request: RescheduleBookingRequest,
) -> Result<MutationOutcome, ComposedMutationError> {
    let success = format!("Booking {} rescheduled", request.reservation_key);
    let mutation = ComposedMutation::sequential(
        ports.clone(),
        vec![
            step("validate-reschedule", validate_reschedule),
            step("check-availability", check_availability),
            step_with_rollback(
                "optimistic-insert",
                optimistic_insert,
                |_: &Job<RescheduleBookingRequest>, result: &Value| {
                    Some(Compensation::RemoveOptimisticBooking {
                        temp_id: text_field(result, "id")?,
                    })
                },
            ),
            step_with_rollback("create-reservation", create_reservation, undo_reservation),
            step("cancel-old-reservation", cancel_old_reservation),
            step("invalidate-caches", invalidate_caches),
        ],
    )
    .named("reschedule-booking");

    run_workflow(mutation, Job::new(request, config), success).await
}

fn old_booking(prior: &[Value]) -> Result<Booking, StepError> {
    Ok(serde_json::from_value(prior.get(VALIDATE).cloned().unwrap_or(Value::Null))?)
}

fn lab_of(booking: &Booking) -> Result<&str, StepError> {
    booking
        .lab_id
        .as_deref()
        .ok_or_else(|| StepError::validation("Booking has no lab"))
}

async fn validate_reschedule(ctx: Ctx) -> Result<Value, StepError> {
    let request = &ctx.vars.request;
    check_window(request.new_start, request.new_end)?;
    if request.new_start <= ctx.vars.now {
        return Err(StepError::validation("The new slot must start in the future"));
    }

    let booking = resolve_owned_booking(
        ctx.ports.cache.as_ref(),
        &request.reservation_key,
        request.booking.as_ref(),
        request.caller_address.as_deref(),
        request.channel,
    )?;
    lab_of(&booking)?;
    if booking.start == Some(request.new_start) && booking.end == Some(request.new_end) {
        return Err(StepError::validation("The booking already uses this time slot"));
    }
    Ok(serde_json::to_value(booking)?)
}

async fn check_availability(ctx: Ctx) -> Result<Value, StepError> {
    let request = &ctx.vars.request;
    let old = old_booking(&ctx.prior)?;
    let lab_id = lab_of(&old)?;

    let cached: Vec<Booking> = read_list(ctx.ports.cache.as_ref(), &booking_keys::by_lab(lab_id))?;
    if conflicts(&cached, request.new_start, request.new_end, Some(&request.reservation_key))
        .next()
        .is_some()
    {
        return Err(StepError::validation(SLOT_UNAVAILABLE));
    }

    let response = ctx
        .ports
        .api
        .post(
            &ctx.vars.config.paths.check_availability,
            json!({ "labId": lab_id, "start": request.new_start, "end": request.new_end }),
        )
        .await?;
    if !is_available(&response) {
        return Err(StepError::validation(SLOT_UNAVAILABLE));
    }
    Ok(response)
}

async fn optimistic_insert(ctx: Ctx) -> Result<Value, StepError> {
    let request = &ctx.vars.request;
    let old = old_booking(&ctx.prior)?;
    let booking = ctx.ports.cache.bookings().add_optimistic_booking(&OptimisticBookingInput {
        lab_id: lab_of(&old)?.to_string(),
        user_address: old.user_address.clone(),
        start: request.new_start,
        end: request.new_end,
    })?;
    Ok(serde_json::to_value(booking)?)
}

async fn create_reservation(ctx: Ctx) -> Result<Value, StepError> {
    let request = &ctx.vars.request;
    let config = &ctx.vars.config;
    let old = old_booking(&ctx.prior)?;
    let lab_id = lab_of(&old)?;

    let (tx_hash, reservation_key) = match request.channel {
        Channel::Wallet => {
            let receipt = ctx
                .ports
                .contract
                .write(
                    &config.contract.reservation_request,
                    vec![json!(lab_id), json!(request.new_start), json!(request.new_end)],
                )
                .await?;
            (Some(receipt.tx_hash), receipt.reservation_key)
        }
        Channel::Sso => {
            let response = ctx
                .ports
                .api
                .post(
                    &config.paths.sso_reservation,
                    json!({
                        "labId": lab_id,
                        "start": request.new_start,
                        "end": request.new_end,
                        "userAddress": old.user_address,
                    }),
                )
                .await?;
            (text_field(&response, "txHash"), text_field(&response, "reservationKey"))
        }
    };

    let bookings = ctx.ports.cache.bookings();
    if let Some(temp_id) = text_field(ctx.prior_result(OPTIMISTIC_INSERT), "id") {
        match &reservation_key {
            Some(key) => {
                let mut real = Booking::confirmed(
                    key.clone(),
                    lab_id,
                    old.user_address.clone(),
                    request.new_start,
                    request.new_end,
                    BookingStatus::Pending,
                );
                real.tx_hash = tx_hash.clone();
                bookings.replace_optimistic_booking(&temp_id, &real)?;
            }
            None => bookings.remove_optimistic_booking(&temp_id)?,
        }
    }

    Ok(json!({ "txHash": tx_hash, "reservationKey": reservation_key }))
}

/// Cancel the freshly created reservation and drop its cached record.
/// Nothing to undo without a key.
fn undo_reservation(job: &Job<RescheduleBookingRequest>, result: &Value) -> Vec<Compensation> {
    let Some(key) = text_field(result, "reservationKey") else {
        return Vec::new();
    };
    let cancel = match job.request.channel {
        Channel::Wallet => Compensation::ContractCall {
            function: job.config.contract.cancel_reservation_request.clone(),
            args: vec![json!(key)],
        },
        Channel::Sso => Compensation::CallApi {
            method: ApiMethod::Post,
            path: job.config.paths.sso_cancellation.clone(),
            body: json!({ "reservationKey": key }),
        },
    };
    vec![Compensation::RemoveOptimisticBooking { temp_id: key }, cancel]
}

async fn cancel_old_reservation(ctx: Ctx) -> Result<Value, StepError> {
    let request = &ctx.vars.request;
    let config = &ctx.vars.config;
    let old = old_booking(&ctx.prior)?;

    let tx_hash = match request.channel {
        Channel::Wallet => {
            let receipt = ctx
                .ports
                .contract
                .write(cancel_function(config, &old), vec![json!(request.reservation_key)])
                .await?;
            Some(receipt.tx_hash)
        }
        Channel::Sso => {
            let response = ctx
                .ports
                .api
                .post(
                    &config.paths.sso_cancellation,
                    json!({ "reservationKey": request.reservation_key, "userAddress": old.user_address }),
                )
                .await?;
            text_field(&response, "txHash")
        }
    };

    let cancelled = BookingPatch {
        tx_hash: tx_hash.clone(),
        ..BookingPatch::status(BookingStatus::Cancelled)
    };
    patch_views(ctx.ports.cache.as_ref(), &old, &cancelled)?;
    Ok(json!({ "txHash": tx_hash, "cancelled": request.reservation_key }))
}

async fn invalidate_caches(ctx: Ctx) -> Result<Value, StepError> {
    let old = old_booking(&ctx.prior)?;
    let mut keys = vec![booking_keys::by_reservation_key(&ctx.vars.request.reservation_key)];
    if let Some(owner) = &old.user_address {
        keys.push(booking_keys::by_user(owner));
        keys.push(booking_keys::has_active_booking(owner));
    }
    keys.push(booking_keys::by_lab(lab_of(&old)?));

    let mut invalidated = 0;
    for key in &keys {
        invalidated += ctx.ports.cache.invalidate_queries(key)?;
    }
    Ok(json!({ "invalidated": invalidated }))
}
