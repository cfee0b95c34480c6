//! Shared fixtures: in-memory ports plus handles to inspect them.

use std::sync::Arc;

use chrono::Utc;
use lab_booking_sync::booking::{Booking, BookingStatus};
use lab_booking_sync::cache::{InMemoryQueryCache, QueryCacheExt};
use lab_booking_sync::config::SyncConfig;
use lab_booking_sync::keys::{booking_keys, QueryKey};
use lab_booking_sync::ports::{InMemoryApi, InMemoryContract, LogNotifier, Notification, Ports};

pub const OWNER: &str = "0xA11CE";
pub const LAB: &str = "7";
pub const HOUR: i64 = 3600;

pub struct Harness {
    pub cache: InMemoryQueryCache,
    pub api: InMemoryApi,
    pub contract: InMemoryContract,
    pub notifier: LogNotifier,
    pub config: SyncConfig,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            cache: InMemoryQueryCache::new(),
            api: InMemoryApi::new(),
            contract: InMemoryContract::new(),
            notifier: LogNotifier::buffered(),
            config: SyncConfig::default(),
        }
    }

    pub fn ports(&self) -> Ports {
        Ports::new(
            Arc::new(self.cache.clone()),
            Arc::new(self.api.clone()),
            Arc::new(self.contract.clone()),
            Arc::new(self.notifier.clone()),
        )
    }

    pub fn list(&self, key: &QueryKey) -> Option<Vec<Booking>> {
        self.cache.get_typed(key).unwrap()
    }

    pub fn all_bookings(&self) -> Vec<Booking> {
        self.list(&booking_keys::all()).unwrap_or_default()
    }

    /// Seed the all, by-user and by-lab views with `bookings`.
    pub fn seed(&self, bookings: &[Booking]) {
        self.cache.set_typed(&booking_keys::all(), &bookings.to_vec()).unwrap();
        self.cache
            .set_typed(&booking_keys::by_user(OWNER), &bookings.to_vec())
            .unwrap();
        self.cache
            .set_typed(&booking_keys::by_lab(LAB), &bookings.to_vec())
            .unwrap();
    }

    pub fn last_notification(&self) -> Notification {
        self.notifier.received().pop().expect("a notification")
    }
}

pub fn now() -> i64 {
    Utc::now().timestamp()
}

/// A confirmed booking owned by [`OWNER`] on [`LAB`], `hours_ahead` from now.
pub fn owned_booking(key: &str, hours_ahead: i64, status: BookingStatus) -> Booking {
    let start = now() + hours_ahead * HOUR;
    Booking::confirmed(key, LAB, Some(OWNER.to_string()), start, start + HOUR, status)
}
