//! Booking records as they live in the cache.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::status::StatusCategory;

/// Prefixes marking a client-only, not yet confirmed booking key.
pub const TEMP_PREFIXES: [&str; 2] = ["temp-", "temp_"];

/// Raw contract status code of a reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BookingStatus {
    Pending,
    Booked,
    InUse,
    Completed,
    Collected,
    Cancelled,
    Unknown(u8),
}

impl BookingStatus {
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => BookingStatus::Pending,
            1 => BookingStatus::Booked,
            2 => BookingStatus::InUse,
            3 => BookingStatus::Completed,
            4 => BookingStatus::Collected,
            5 => BookingStatus::Cancelled,
            other => BookingStatus::Unknown(other),
        }
    }

    pub fn code(self) -> u8 {
        match self {
            BookingStatus::Pending => 0,
            BookingStatus::Booked => 1,
            BookingStatus::InUse => 2,
            BookingStatus::Completed => 3,
            BookingStatus::Collected => 4,
            BookingStatus::Cancelled => 5,
            BookingStatus::Unknown(code) => code,
        }
    }

    /// Only requested or confirmed reservations can still be cancelled.
    pub fn is_cancellable(self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::Booked)
    }
}

/// A reservation of lab time.
///
/// Confirmed bookings are addressed by `reservation_key`. Optimistic records
/// carry a `temp-` prefixed `id` (and the same value as `reservation_key`)
/// until the server record replaces them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reservation_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lab_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_category: Option<StatusCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_optimistic: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_pending: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_processing: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl Booking {
    /// Confirmed booking as returned by the server.
    pub fn confirmed(
        reservation_key: impl Into<String>,
        lab_id: impl Into<String>,
        user_address: Option<String>,
        start: i64,
        end: i64,
        status: BookingStatus,
    ) -> Self {
        Booking {
            reservation_key: Some(reservation_key.into()),
            lab_id: Some(lab_id.into()),
            user_address,
            start: Some(start),
            end: Some(end),
            status: Some(status.code()),
            ..Default::default()
        }
    }

    /// Reservation key if known, otherwise the transient id.
    pub fn key(&self) -> Option<&str> {
        self.reservation_key.as_deref().or(self.id.as_deref())
    }

    /// True if either identifier equals `key`.
    pub fn matches_key(&self, key: &str) -> bool {
        self.reservation_key.as_deref() == Some(key) || self.id.as_deref() == Some(key)
    }

    pub fn booking_status(&self) -> Option<BookingStatus> {
        self.status.map(BookingStatus::from_code)
    }

    pub fn is_temp(&self) -> bool {
        self.id.as_deref().map(is_temp_key).unwrap_or(false)
            || self.reservation_key.as_deref().map(is_temp_key).unwrap_or(false)
    }

    /// True if `[start, end)` intersects this booking's window.
    pub fn overlaps(&self, start: i64, end: i64) -> bool {
        match (self.start, self.end) {
            (Some(s), Some(e)) => s < end && start < e,
            _ => false,
        }
    }
}

/// Partial booking update. Absent fields are left untouched by a merge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reservation_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lab_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_category: Option<StatusCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_optimistic: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_pending: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_processing: Option<bool>,
}

impl BookingPatch {
    pub fn status(status: BookingStatus) -> Self {
        BookingPatch {
            status: Some(status.code()),
            ..Default::default()
        }
    }

    /// JSON object holding only the present fields.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| Value::Object(Default::default()))
    }

    /// Shallow merge: every present patch field overwrites the record's.
    pub fn apply_to(&self, booking: &Booking) -> Booking {
        let mut base = serde_json::to_value(booking).unwrap_or(Value::Null);
        if let (Value::Object(target), Value::Object(fields)) = (&mut base, self.to_value()) {
            for (name, value) in fields {
                target.insert(name, value);
            }
        }
        serde_json::from_value(base).unwrap_or_else(|_| booking.clone())
    }
}

/// Input for an optimistic booking insert.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimisticBookingInput {
    pub lab_id: String,
    pub user_address: Option<String>,
    pub start: i64,
    pub end: i64,
}

pub fn is_temp_key(key: &str) -> bool {
    TEMP_PREFIXES.iter().any(|prefix| key.starts_with(prefix))
}

static LAST_TEMP_MILLIS: AtomicI64 = AtomicI64::new(0);

/// Time-based temporary key, `temp-<millis>`.
///
/// The millisecond value is strictly increasing within the process, so keys
/// minted in the same millisecond still differ.
pub fn next_temp_key() -> String {
    let now = Utc::now().timestamp_millis();
    let mut last = LAST_TEMP_MILLIS.load(Ordering::Relaxed);
    loop {
        let next = if now > last { now } else { last + 1 };
        match LAST_TEMP_MILLIS.compare_exchange_weak(last, next, Ordering::SeqCst, Ordering::Relaxed)
        {
            Ok(_) => return format!("{}{}", TEMP_PREFIXES[0], next),
            Err(actual) => last = actual,
        }
    }
}
