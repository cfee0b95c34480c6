//! Booking cache primitives.
//!
//! Bookings are cached in three list views plus a direct by-key entry:
//!
//! - all: `["bookings"]`
//! - by user: `["bookings","user",address]`
//! - by lab: `["bookings","lab",labId]`
//! - by key: `["bookings","reservation",key]`
//!
//! Absent cache state always reads as empty; none of these primitives fail
//! because a list has not been fetched yet.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::model::{next_temp_key, Booking, BookingPatch, BookingStatus, OptimisticBookingInput};
use crate::cache::{patch_existing_list, update_list, CacheError, QueryCache};
use crate::keys::{booking_keys, QueryKey};

/// Targeted write performed by [`BookingCacheUpdates::smart_booking_invalidation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheAction {
    Add,
    Update,
    Remove,
}

impl From<&Booking> for BookingPatch {
    fn from(booking: &Booking) -> Self {
        BookingPatch {
            reservation_key: booking.reservation_key.clone(),
            lab_id: booking.lab_id.clone(),
            user_address: booking.user_address.clone(),
            start: booking.start,
            end: booking.end,
            status: booking.status,
            status_category: booking.status_category,
            tx_hash: booking.tx_hash.clone(),
            is_optimistic: Some(booking.is_optimistic),
            is_pending: Some(booking.is_pending),
            is_processing: Some(booking.is_processing),
        }
    }
}

/// Read-modify-write operations over the booking views of a cache.
pub struct BookingCacheUpdates<'a> {
    cache: &'a dyn QueryCache,
}

impl<'a> BookingCacheUpdates<'a> {
    pub fn new(cache: &'a dyn QueryCache) -> Self {
        Self { cache }
    }

    /// Prepend `booking` to the all, by-user and by-lab lists.
    ///
    /// By-user and by-lab are skipped when the record lacks that field. A
    /// record already present under the same key is replaced, never duplicated.
    pub fn add_booking(&self, booking: &Booking) -> Result<(), CacheError> {
        for key in self.views_for(booking) {
            update_list::<Booking, _>(self.cache, &key, |list| prepend_unique(list, booking))?;
        }
        debug!(key = ?booking.key(), "added booking to cache");
        Ok(())
    }

    /// Shallow-merge `patch` into the record matching `key` in the all list,
    /// and replace the direct by-key entry with `patch`.
    ///
    /// Returns the updated all list, or an empty list without writing anything
    /// if the all list is absent or empty.
    pub fn update_booking(&self, key: &str, patch: &BookingPatch) -> Result<Vec<Booking>, CacheError> {
        let all = crate::cache::read_list::<Booking>(self.cache, &booking_keys::all())?;
        if all.is_empty() {
            return Ok(Vec::new());
        }

        let updated = update_list::<Booking, _>(self.cache, &booking_keys::all(), |list| {
            list.into_iter()
                .map(|b| if b.matches_key(key) { patch.apply_to(&b) } else { b })
                .collect()
        })?;
        self.cache
            .set_query_data(&booking_keys::by_reservation_key(key), patch.to_value())?;
        Ok(updated)
    }

    /// Drop the record matching `key` from the all list and mark its by-key
    /// entry stale.
    pub fn remove_booking(&self, key: &str) -> Result<(), CacheError> {
        patch_existing_list::<Booking, _>(self.cache, &booking_keys::all(), |list| {
            list.into_iter().filter(|b| !b.matches_key(key)).collect()
        })?;
        self.cache
            .invalidate_queries(&booking_keys::by_reservation_key(key))?;
        Ok(())
    }

    /// Insert a pending, client-only record and return it so the caller can
    /// later replace or discard it by its temp id.
    pub fn add_optimistic_booking(&self, input: &OptimisticBookingInput) -> Result<Booking, CacheError> {
        let temp_key = next_temp_key();
        let booking = Booking {
            reservation_key: Some(temp_key.clone()),
            id: Some(temp_key),
            lab_id: Some(input.lab_id.clone()),
            user_address: input.user_address.clone(),
            start: Some(input.start),
            end: Some(input.end),
            status: Some(BookingStatus::Pending.code()),
            is_optimistic: true,
            is_pending: true,
            is_processing: true,
            timestamp: Some(Utc::now().timestamp_millis()),
            ..Default::default()
        };
        self.add_booking(&booking)?;
        Ok(booking)
    }

    /// Swap the optimistic record `temp_id` for the server record in every
    /// list view, then seed the direct by-key entry.
    pub fn replace_optimistic_booking(&self, temp_id: &str, real: &Booking) -> Result<(), CacheError> {
        let mut confirmed = real.clone();
        confirmed.id = confirmed.id.filter(|id| id != temp_id);
        confirmed.is_optimistic = false;
        confirmed.is_pending = false;
        confirmed.is_processing = false;

        let real_key = confirmed.key().map(str::to_string);
        for key in self.all_list_views()? {
            patch_existing_list::<Booking, _>(self.cache, &key, |list| {
                replace_temp(list, temp_id, &confirmed, real_key.as_deref())
            })?;
        }

        if let Some(real_key) = real_key {
            self.cache.set_query_data(
                &booking_keys::by_reservation_key(&real_key),
                serde_json::to_value(&confirmed).map_err(|e| CacheError::Serde {
                    key: real_key.clone(),
                    message: e.to_string(),
                })?,
            )?;
        }
        debug!(temp_id, real_key = ?confirmed.key(), "replaced optimistic booking");
        Ok(())
    }

    /// Remove the optimistic record `temp_id` from the all list and from every
    /// cached by-user and by-lab list.
    pub fn remove_optimistic_booking(&self, temp_id: &str) -> Result<(), CacheError> {
        for key in self.all_list_views()? {
            patch_existing_list::<Booking, _>(self.cache, &key, |list| {
                list.into_iter().filter(|b| !b.matches_key(temp_id)).collect()
            })?;
        }
        debug!(temp_id, "removed optimistic booking");
        Ok(())
    }

    /// Apply the targeted write for `action`, then invalidate the by-user and
    /// by-lab lists regardless of whether that write succeeded.
    pub fn smart_booking_invalidation(
        &self,
        user_address: Option<&str>,
        lab_id: Option<&str>,
        data: Option<&Booking>,
        action: CacheAction,
    ) -> Result<(), CacheError> {
        if let Some(booking) = data {
            let outcome = match (action, booking.key()) {
                (CacheAction::Add, _) => self.add_booking(booking),
                (CacheAction::Update, Some(key)) => {
                    self.update_booking(key, &BookingPatch::from(booking)).map(|_| ())
                }
                (CacheAction::Remove, Some(key)) => self.remove_booking(key),
                (_, None) => Ok(()),
            };
            if let Err(err) = outcome {
                warn!(?action, error = %err, "targeted booking cache write failed, falling back to invalidation");
            }
        }

        if let Some(address) = user_address {
            self.cache.invalidate_queries(&booking_keys::by_user(address))?;
        }
        if let Some(lab_id) = lab_id {
            self.cache.invalidate_queries(&booking_keys::by_lab(lab_id))?;
        }
        Ok(())
    }

    fn views_for(&self, booking: &Booking) -> Vec<QueryKey> {
        let mut keys = vec![booking_keys::all()];
        if let Some(address) = &booking.user_address {
            keys.push(booking_keys::by_user(address));
        }
        if let Some(lab_id) = &booking.lab_id {
            keys.push(booking_keys::by_lab(lab_id));
        }
        keys
    }

    /// The all list plus every cached by-user and by-lab list.
    fn all_list_views(&self) -> Result<Vec<QueryKey>, CacheError> {
        let mut keys = vec![booking_keys::all()];
        keys.extend(self.cache.keys_matching(&booking_keys::all_by_user())?);
        keys.extend(self.cache.keys_matching(&booking_keys::all_by_lab())?);
        Ok(keys)
    }
}

fn prepend_unique(list: Vec<Booking>, booking: &Booking) -> Vec<Booking> {
    let mut next = Vec::with_capacity(list.len() + 1);
    next.push(booking.clone());
    next.extend(list.into_iter().filter(|b| match booking.key() {
        Some(key) => !b.matches_key(key),
        None => true,
    }));
    next
}

fn replace_temp(
    list: Vec<Booking>,
    temp_id: &str,
    confirmed: &Booking,
    real_key: Option<&str>,
) -> Vec<Booking> {
    let already_present = real_key
        .map(|key| list.iter().any(|b| b.matches_key(key) && !b.matches_key(temp_id)))
        .unwrap_or(false);
    list.into_iter()
        .filter_map(|b| {
            if b.id.as_deref() == Some(temp_id) {
                if already_present {
                    None
                } else {
                    Some(confirmed.clone())
                }
            } else {
                Some(b)
            }
        })
        .collect()
}

/// Entry point to booking cache primitives from any cache.
pub trait BookingCacheExt {
    fn bookings(&self) -> BookingCacheUpdates<'_>;
}

impl<C: QueryCache> BookingCacheExt for C {
    fn bookings(&self) -> BookingCacheUpdates<'_> {
        BookingCacheUpdates::new(self)
    }
}

impl BookingCacheExt for dyn QueryCache {
    fn bookings(&self) -> BookingCacheUpdates<'_> {
        BookingCacheUpdates::new(self)
    }
}
