//! Status derivation: raw contract status + time window -> display category.

use serde::{Deserialize, Serialize};

use super::model::{Booking, BookingStatus};

/// Display-oriented classification of a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusCategory {
    Pending,
    Active,
    Upcoming,
    Completed,
    Cancelled,
    Expired,
    Unknown,
}

impl StatusCategory {
    pub fn label(self) -> &'static str {
        match self {
            StatusCategory::Pending => "Pending",
            StatusCategory::Active => "Active",
            StatusCategory::Upcoming => "Upcoming",
            StatusCategory::Completed => "Completed",
            StatusCategory::Cancelled => "Cancelled",
            StatusCategory::Expired => "Expired",
            StatusCategory::Unknown => "Unknown",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            StatusCategory::Completed | StatusCategory::Cancelled | StatusCategory::Expired
        )
    }
}

fn by_time_window(start: i64, end: i64, now: i64) -> StatusCategory {
    if now < start {
        StatusCategory::Upcoming
    } else if now <= end {
        StatusCategory::Active
    } else {
        StatusCategory::Completed
    }
}

/// Classify `booking` at Unix time `now`.
///
/// Statuses 2, 3 and 4 all display as completed; the contract distinguishes
/// them but the marketplace never shows the difference.
pub fn status_category(booking: &Booking, now: i64) -> StatusCategory {
    let window = booking.start.zip(booking.end);
    match booking.booking_status() {
        Some(BookingStatus::Cancelled) => StatusCategory::Cancelled,
        Some(BookingStatus::Pending) => match booking.end {
            Some(end) if now > end => StatusCategory::Expired,
            _ => StatusCategory::Pending,
        },
        Some(BookingStatus::InUse | BookingStatus::Completed | BookingStatus::Collected) => {
            StatusCategory::Completed
        }
        Some(BookingStatus::Booked) | Some(BookingStatus::Unknown(_)) | None => match window {
            Some((start, end)) => by_time_window(start, end, now),
            None => StatusCategory::Unknown,
        },
    }
}

/// Copy of `booking` with `status_category` filled in.
pub fn with_derived_status(booking: &Booking, now: i64) -> Booking {
    let mut derived = booking.clone();
    derived.status_category = Some(status_category(booking, now));
    derived
}

/// Inclusion toggles for [`calculate_booking_summary`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SummaryOptions {
    pub include_upcoming: bool,
    pub include_cancelled: bool,
}

impl Default for SummaryOptions {
    fn default() -> Self {
        SummaryOptions {
            include_upcoming: true,
            include_cancelled: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingSummary {
    pub total_bookings: usize,
    pub active_bookings: usize,
    pub upcoming_bookings: usize,
    pub completed_bookings: usize,
    pub cancelled_bookings: usize,
    pub pending_bookings: usize,
}

/// Count bookings per category.
///
/// Every booking is classified and counted in its bucket; the toggles only
/// decide whether upcoming and cancelled buckets add to `total_bookings`.
/// Pending bookings whose window already ended are left out entirely, and
/// unclassifiable bookings count as completed.
pub fn calculate_booking_summary(
    bookings: &[Booking],
    now: i64,
    options: SummaryOptions,
) -> BookingSummary {
    let mut summary = BookingSummary::default();
    for booking in bookings {
        match status_category(booking, now) {
            StatusCategory::Expired => continue,
            StatusCategory::Pending => {
                summary.pending_bookings += 1;
                summary.total_bookings += 1;
            }
            StatusCategory::Active => {
                summary.active_bookings += 1;
                summary.total_bookings += 1;
            }
            StatusCategory::Upcoming => {
                summary.upcoming_bookings += 1;
                if options.include_upcoming {
                    summary.total_bookings += 1;
                }
            }
            StatusCategory::Completed | StatusCategory::Unknown => {
                summary.completed_bookings += 1;
                summary.total_bookings += 1;
            }
            StatusCategory::Cancelled => {
                summary.cancelled_bookings += 1;
                if options.include_cancelled {
                    summary.total_bookings += 1;
                }
            }
        }
    }
    summary
}

pub fn filter_by_category(bookings: &[Booking], category: StatusCategory, now: i64) -> Vec<Booking> {
    bookings
        .iter()
        .filter(|b| status_category(b, now) == category)
        .cloned()
        .collect()
}

pub fn active_bookings(bookings: &[Booking], now: i64) -> Vec<Booking> {
    filter_by_category(bookings, StatusCategory::Active, now)
}

/// Upcoming bookings, soonest first.
pub fn upcoming_bookings(bookings: &[Booking], now: i64) -> Vec<Booking> {
    let mut upcoming = filter_by_category(bookings, StatusCategory::Upcoming, now);
    upcoming.sort_by_key(|b| b.start.unwrap_or(i64::MAX));
    upcoming
}

pub fn has_active_booking(bookings: &[Booking], user_address: &str, now: i64) -> bool {
    bookings.iter().any(|b| {
        b.user_address
            .as_deref()
            .map(|addr| addr.eq_ignore_ascii_case(user_address))
            .unwrap_or(false)
            && status_category(b, now) == StatusCategory::Active
    })
}

/// Hours from `now` until the booking starts; negative once started.
pub fn hours_until_start(booking: &Booking, now: i64) -> Option<f64> {
    booking.start.map(|start| (start - now) as f64 / 3600.0)
}
