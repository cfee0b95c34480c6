use std::sync::Arc;

use lab_booking_sync::cache::InMemoryQueryCache;
use lab_booking_sync::keys::QueryKey;
use lab_booking_sync::ports::{InMemoryApi, InMemoryContract, LogNotifier, Ports};

pub struct Fixture {
    pub cache: InMemoryQueryCache,
    pub api: InMemoryApi,
    pub ports: Ports,
}

pub fn fixture() -> Fixture {
    let cache = InMemoryQueryCache::new();
    let api = InMemoryApi::new();
    let ports = Ports::new(
        Arc::new(cache.clone()),
        Arc::new(api.clone()),
        Arc::new(InMemoryContract::new()),
        Arc::new(LogNotifier::new()),
    );
    Fixture { cache, api, ports }
}

pub fn slot(name: &str) -> QueryKey {
    QueryKey::root("test").with(name)
}
