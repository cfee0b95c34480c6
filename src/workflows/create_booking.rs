//! Create a booking: validate funds, check availability, insert optimistically,
//! write the reservation, notify, invalidate.

use serde_json::{json, Value};
use tracing::debug;

use super::{
    check_window, conflicts, is_available, run_workflow, text_field, Channel, Job,
    SLOT_UNAVAILABLE,
};
use crate::booking::{Booking, BookingCacheExt, BookingStatus, OptimisticBookingInput};
use crate::cache::read_list;
use crate::config::SyncConfig;
use crate::keys::booking_keys;
use crate::mutation::{
    invalidation_step, step, step_with_rollback, Compensation, ComposedMutation,
    ComposedMutationError, MutationOutcome, StepContext, StepError,
};
use crate::ports::{Notification, Ports};

const OPTIMISTIC_INSERT: usize = 2;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateBookingRequest {
    pub lab_id: String,
    /// Booking wallet. May be absent on the SSO channel.
    pub user_address: Option<String>,
    pub start: i64,
    pub end: i64,
    pub channel: Channel,
    /// Token balance and booking cost, in the token's smallest unit. Only
    /// checked on the wallet channel.
    pub balance: u128,
    pub cost: u128,
}

type Ctx = StepContext<Job<CreateBookingRequest>>;

pub async fn create_booking(
    ports: &Ports,
    config: &SyncConfig,
    request: CreateBookingRequest,
) -> Result<MutationOutcome, ComposedMutationError> {
    let success = format!("Booking requested for lab {}", request.lab_id);
    let mutation = ComposedMutation::sequential(
        ports.clone(),
        vec![
            step("validate-funds", validate_funds),
            step("check-availability", check_availability),
            step_with_rollback(
                "optimistic-insert",
                optimistic_insert,
                |_: &Job<CreateBookingRequest>, result: &Value| {
                    Some(Compensation::RemoveOptimisticBooking {
                        temp_id: text_field(result, "id")?,
                    })
                },
            ),
            step("blockchain-write", blockchain_write),
            step("send-notifications", send_notifications),
            invalidation_step("invalidate-caches", |job: &Job<CreateBookingRequest>| {
                let request = &job.request;
                let mut keys = vec![booking_keys::by_lab(&request.lab_id)];
                if let Some(user) = &request.user_address {
                    keys.push(booking_keys::by_user(user));
                    keys.push(booking_keys::has_active_booking(user));
                }
                keys
            }),
        ],
    )
    .named("create-booking");

    run_workflow(mutation, Job::new(request, config), success).await
}

async fn validate_funds(ctx: Ctx) -> Result<Value, StepError> {
    let request = &ctx.vars.request;
    check_window(request.start, request.end)?;
    match request.channel {
        Channel::Sso => Ok(json!({ "skipped": true })),
        Channel::Wallet => {
            if request.user_address.is_none() {
                return Err(StepError::validation("Connect a wallet to book with tokens"));
            }
            if request.balance < request.cost {
                return Err(StepError::validation("Insufficient funds"));
            }
            Ok(json!({
                "balance": request.balance.to_string(),
                "cost": request.cost.to_string(),
            }))
        }
    }
}

async fn check_availability(ctx: Ctx) -> Result<Value, StepError> {
    let request = &ctx.vars.request;
    let cached: Vec<Booking> = read_list(ctx.ports.cache.as_ref(), &booking_keys::by_lab(&request.lab_id))?;
    if conflicts(&cached, request.start, request.end, None).next().is_some() {
        return Err(StepError::validation(SLOT_UNAVAILABLE));
    }

    let response = ctx
        .ports
        .api
        .post(
            &ctx.vars.config.paths.check_availability,
            json!({
                "labId": request.lab_id,
                "start": request.start,
                "end": request.end,
            }),
        )
        .await?;
    if !is_available(&response) {
        return Err(StepError::validation(SLOT_UNAVAILABLE));
    }
    Ok(response)
}

async fn optimistic_insert(ctx: Ctx) -> Result<Value, StepError> {
    let request = &ctx.vars.request;
    let booking = ctx.ports.cache.bookings().add_optimistic_booking(&OptimisticBookingInput {
        lab_id: request.lab_id.clone(),
        user_address: request.user_address.clone(),
        start: request.start,
        end: request.end,
    })?;
    Ok(serde_json::to_value(booking)?)
}

async fn blockchain_write(ctx: Ctx) -> Result<Value, StepError> {
    let request = &ctx.vars.request;
    let config = &ctx.vars.config;

    let (tx_hash, reservation_key) = match request.channel {
        Channel::Wallet => {
            let receipt = ctx
                .ports
                .contract
                .write(
                    &config.contract.reservation_request,
                    vec![json!(request.lab_id), json!(request.start), json!(request.end)],
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
                        "labId": request.lab_id,
                        "start": request.start,
                        "end": request.end,
                        "userAddress": request.user_address,
                    }),
                )
                .await?;
            (text_field(&response, "txHash"), text_field(&response, "reservationKey"))
        }
    };

    let bookings = ctx.ports.cache.bookings();
    match (text_field(ctx.prior_result(OPTIMISTIC_INSERT), "id"), &reservation_key) {
        (Some(temp_id), Some(key)) => {
            let mut real = Booking::confirmed(
                key.clone(),
                request.lab_id.clone(),
                request.user_address.clone(),
                request.start,
                request.end,
                BookingStatus::Pending,
            );
            real.tx_hash = tx_hash.clone();
            bookings.replace_optimistic_booking(&temp_id, &real)?;
        }
        (Some(temp_id), None) => {
            debug!(%temp_id, "no reservation key returned, dropping optimistic booking");
            bookings.remove_optimistic_booking(&temp_id)?;
        }
        (None, _) => {}
    }

    Ok(json!({ "txHash": tx_hash, "reservationKey": reservation_key }))
}

async fn send_notifications(ctx: Ctx) -> Result<Value, StepError> {
    let write = ctx.prior_result(OPTIMISTIC_INSERT + 1);
    let message = match text_field(write, "txHash") {
        Some(tx) => format!("Reservation request submitted (tx {})", tx),
        None => "Reservation request submitted".to_string(),
    };
    ctx.ports.notify(Notification::info(message.clone()));
    Ok(json!({ "notified": message }))
}
