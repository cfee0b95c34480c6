//! Bookings - the cached reservation records, their derived display status,
//! and the cache primitives that keep every booking view consistent.

mod cache;
mod model;
mod status;

pub use cache::{BookingCacheExt, BookingCacheUpdates, CacheAction};
pub use model::{
    is_temp_key, next_temp_key, Booking, BookingPatch, BookingStatus, OptimisticBookingInput,
    TEMP_PREFIXES,
};
pub use status::{
    active_bookings, calculate_booking_summary, filter_by_category, has_active_booking,
    hours_until_start, status_category, upcoming_bookings, with_derived_status, BookingSummary,
    StatusCategory, SummaryOptions,
};
