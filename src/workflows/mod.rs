//! Marketplace workflows built on [`ComposedMutation`].
//!
//! Each workflow is a fixed sequence of named steps. On failure the error
//! message of the failing step is sent to the notifier and returned; every
//! compensation registered so far has already been applied by then.

mod cancel_booking;
mod create_booking;
mod create_lab;
mod register_provider;
mod reschedule_booking;

use chrono::Utc;
use serde_json::Value;

use crate::booking::{Booking, BookingPatch, BookingStatus};
use crate::cache::{patch_existing_list, read_list, CacheError, QueryCache, QueryCacheExt};
use crate::config::SyncConfig;
use crate::keys::{booking_keys, QueryKey};
use crate::mutation::{ComposedMutation, ComposedMutationError, MutationOutcome, StepError};
use crate::ports::Notification;

pub use cancel_booking::{cancel_booking, CancelBookingRequest};
pub use create_booking::{create_booking, CreateBookingRequest};
pub use create_lab::{create_lab, CreateLabRequest};
pub use register_provider::{register_provider, RegisterProviderRequest};
pub use reschedule_booking::{reschedule_booking, RescheduleBookingRequest};

/// How the user pays and signs: their own wallet, or the institution's SSO
/// backend acting on their behalf.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Channel {
    #[default]
    Wallet,
    Sso,
}

/// Variables shared by every step of a workflow run.
pub(crate) struct Job<R> {
    pub request: R,
    pub config: SyncConfig,
    /// Unix seconds at workflow start.
    pub now: i64,
}

impl<R> Job<R> {
    fn new(request: R, config: &SyncConfig) -> Self {
        Self {
            request,
            config: config.clone(),
            now: Utc::now().timestamp(),
        }
    }
}

async fn run_workflow<R: Send + Sync + 'static>(
    mutation: ComposedMutation<Job<R>>,
    job: Job<R>,
    success_message: String,
) -> Result<MutationOutcome, ComposedMutationError> {
    match mutation.run(job).await {
        Ok(outcome) => {
            mutation.ports().notify(Notification::success(success_message));
            Ok(outcome)
        }
        Err(err) => {
            mutation.ports().notify(Notification::error(err.to_string()));
            Err(err)
        }
    }
}

fn check_window(start: i64, end: i64) -> Result<(), StepError> {
    if start >= end {
        return Err(StepError::validation("Booking end must be after its start"));
    }
    Ok(())
}

/// Live bookings in `cached` that collide with `[start, end)`.
fn conflicts<'a>(
    cached: &'a [Booking],
    start: i64,
    end: i64,
    ignore_key: Option<&'a str>,
) -> impl Iterator<Item = &'a Booking> {
    cached.iter().filter(move |b| {
        b.status != Some(BookingStatus::Cancelled.code())
            && !ignore_key.map(|key| b.matches_key(key)).unwrap_or(false)
            && b.overlaps(start, end)
    })
}

/// Server verdict of an availability check. Anything but an explicit
/// `false` counts as available.
fn is_available(response: &Value) -> bool {
    response.get("available").and_then(Value::as_bool).unwrap_or(true)
}

fn text_field(value: &Value, name: &str) -> Option<String> {
    value
        .get(name)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn same_address(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

pub(crate) const SLOT_UNAVAILABLE: &str = "Lab is not available for the selected time slot";

/// Look a booking up by key: the by-key entry first, then the all list, then
/// the caller's list.
fn find_cached(
    cache: &dyn QueryCache,
    key: &str,
    caller: Option<&str>,
) -> Result<Option<Booking>, CacheError> {
    if let Some(booking) = cache.get_typed::<Booking>(&booking_keys::by_reservation_key(key))? {
        if booking.matches_key(key) {
            return Ok(Some(booking));
        }
    }
    let mut views = vec![booking_keys::all()];
    if let Some(caller) = caller {
        views.push(booking_keys::by_user(caller));
    }
    for view in views {
        let list: Vec<Booking> = read_list(cache, &view)?;
        if let Some(found) = list.into_iter().find(|b| b.matches_key(key)) {
            return Ok(Some(found));
        }
    }
    Ok(None)
}

/// Resolve the booking behind `key` and check the caller may change it.
///
/// SSO bookings carry no wallet address; those are only reachable through
/// the SSO channel.
fn resolve_owned_booking(
    cache: &dyn QueryCache,
    key: &str,
    supplied: Option<&Booking>,
    caller: Option<&str>,
    channel: Channel,
) -> Result<Booking, StepError> {
    let booking = match supplied {
        Some(booking) => booking.clone(),
        None => find_cached(cache, key, caller)?
            .ok_or_else(|| StepError::validation("Booking not found"))?,
    };

    let owned = match (booking.user_address.as_deref(), caller) {
        (Some(owner), Some(caller)) => same_address(owner, caller),
        (None, _) => channel == Channel::Sso,
        (Some(_), None) => false,
    };
    if !owned {
        return Err(StepError::validation("You can only cancel your own bookings"));
    }

    match booking.booking_status() {
        Some(BookingStatus::Cancelled) => Err(StepError::validation("Booking is already cancelled")),
        Some(status) if !status.is_cancellable() => {
            Err(StepError::validation("Completed bookings cannot be cancelled"))
        }
        _ => Ok(booking),
    }
}

/// Contract function that cancels `booking`: unconfirmed requests and
/// confirmed bookings go through different calls.
fn cancel_function<'a>(config: &'a SyncConfig, booking: &Booking) -> &'a str {
    if booking.booking_status() == Some(BookingStatus::Pending) {
        &config.contract.cancel_reservation_request
    } else {
        &config.contract.cancel_booking
    }
}

/// Patch the record in every cached list view it belongs to.
///
/// Returns the pre-patch snapshot of each view that existed.
fn patch_views(
    cache: &dyn QueryCache,
    booking: &Booking,
    patch: &BookingPatch,
) -> Result<Vec<(QueryKey, Option<Value>)>, CacheError> {
    let Some(key) = booking.key() else {
        return Ok(Vec::new());
    };
    let mut views = vec![booking_keys::all()];
    if let Some(owner) = &booking.user_address {
        views.push(booking_keys::by_user(owner));
    }
    if let Some(lab_id) = &booking.lab_id {
        views.push(booking_keys::by_lab(lab_id));
    }

    let mut snapshots = Vec::new();
    for view in views {
        let snapshot = cache.get_query_data(&view)?;
        if snapshot.is_none() {
            continue;
        }
        patch_existing_list::<Booking, _>(cache, &view, |list| {
            list.into_iter()
                .map(|b| if b.matches_key(key) { patch.apply_to(&b) } else { b })
                .collect()
        })?;
        snapshots.push((view, snapshot));
    }
    Ok(snapshots)
}
