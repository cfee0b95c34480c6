//! InMemoryQueryCache - HashMap-backed cache for tests and single-process use.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::Utc;
use serde_json::Value;

use super::{CacheError, QueryCache};
use crate::keys::QueryKey;

/// Internal stored representation of a cache entry.
#[derive(Debug, Clone)]
struct CacheEntry {
    data: Option<Value>,
    stale: bool,
    updated_at: i64,
    fetching: bool,
}

impl CacheEntry {
    fn with_data(data: Value) -> Self {
        CacheEntry {
            data: Some(data),
            stale: false,
            updated_at: Utc::now().timestamp_millis(),
            fetching: false,
        }
    }
}

/// In-memory query cache backed by a HashMap.
///
/// Clone-friendly via Arc; clones share storage.
#[derive(Clone, Default)]
pub struct InMemoryQueryCache {
    storage: Arc<RwLock<HashMap<QueryKey, CacheEntry>>>,
}

impl InMemoryQueryCache {
    /// Create a new empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a fetch as in flight for `key`, creating an empty entry if needed.
    pub fn begin_fetch(&self, key: &QueryKey) -> Result<(), CacheError> {
        let mut storage = self
            .storage
            .write()
            .map_err(|_| CacheError::Storage("lock poisoned".into()))?;
        let entry = storage.entry(key.clone()).or_insert(CacheEntry {
            data: None,
            stale: true,
            updated_at: 0,
            fetching: false,
        });
        entry.fetching = true;
        Ok(())
    }

    /// Whether a fetch is marked in flight for `key`.
    pub fn is_fetching(&self, key: &QueryKey) -> Result<bool, CacheError> {
        let storage = self
            .storage
            .read()
            .map_err(|_| CacheError::Storage("lock poisoned".into()))?;
        Ok(storage.get(key).map(|e| e.fetching).unwrap_or(false))
    }

    /// Millisecond timestamp of the last write to `key`.
    pub fn updated_at(&self, key: &QueryKey) -> Result<Option<i64>, CacheError> {
        let storage = self
            .storage
            .read()
            .map_err(|_| CacheError::Storage("lock poisoned".into()))?;
        Ok(storage
            .get(key)
            .filter(|e| e.data.is_some())
            .map(|e| e.updated_at))
    }

    /// Number of entries holding data.
    pub fn len(&self) -> usize {
        self.storage
            .read()
            .map(|s| s.values().filter(|e| e.data.is_some()).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl QueryCache for InMemoryQueryCache {
    fn get_query_data(&self, key: &QueryKey) -> Result<Option<Value>, CacheError> {
        let storage = self
            .storage
            .read()
            .map_err(|_| CacheError::Storage("lock poisoned".into()))?;
        Ok(storage.get(key).and_then(|e| e.data.clone()))
    }

    fn set_query_data(&self, key: &QueryKey, data: Value) -> Result<(), CacheError> {
        let mut storage = self
            .storage
            .write()
            .map_err(|_| CacheError::Storage("lock poisoned".into()))?;
        storage.insert(key.clone(), CacheEntry::with_data(data));
        Ok(())
    }

    fn update_query_data(
        &self,
        key: &QueryKey,
        updater: &mut dyn FnMut(Option<Value>) -> Option<Value>,
    ) -> Result<(), CacheError> {
        let mut storage = self
            .storage
            .write()
            .map_err(|_| CacheError::Storage("lock poisoned".into()))?;
        let current = storage.get(key).and_then(|e| e.data.clone());
        if let Some(next) = updater(current) {
            storage.insert(key.clone(), CacheEntry::with_data(next));
        }
        Ok(())
    }

    fn invalidate_queries(&self, prefix: &QueryKey) -> Result<usize, CacheError> {
        let mut storage = self
            .storage
            .write()
            .map_err(|_| CacheError::Storage("lock poisoned".into()))?;
        let mut count = 0;
        for (key, entry) in storage.iter_mut() {
            if key.starts_with(prefix) {
                entry.stale = true;
                count += 1;
            }
        }
        Ok(count)
    }

    fn cancel_queries(&self, prefix: &QueryKey) -> Result<usize, CacheError> {
        let mut storage = self
            .storage
            .write()
            .map_err(|_| CacheError::Storage("lock poisoned".into()))?;
        let mut count = 0;
        for (key, entry) in storage.iter_mut() {
            if key.starts_with(prefix) && entry.fetching {
                entry.fetching = false;
                count += 1;
            }
        }
        Ok(count)
    }

    fn remove_queries(&self, prefix: &QueryKey) -> Result<usize, CacheError> {
        let mut storage = self
            .storage
            .write()
            .map_err(|_| CacheError::Storage("lock poisoned".into()))?;
        let before = storage.len();
        storage.retain(|key, _| !key.starts_with(prefix));
        Ok(before - storage.len())
    }

    fn remove_query_data(&self, key: &QueryKey) -> Result<bool, CacheError> {
        let mut storage = self
            .storage
            .write()
            .map_err(|_| CacheError::Storage("lock poisoned".into()))?;
        Ok(storage.remove(key).is_some())
    }

    fn keys_matching(&self, prefix: &QueryKey) -> Result<Vec<QueryKey>, CacheError> {
        let storage = self
            .storage
            .read()
            .map_err(|_| CacheError::Storage("lock poisoned".into()))?;
        let mut keys: Vec<QueryKey> = storage
            .iter()
            .filter(|(key, entry)| key.starts_with(prefix) && entry.data.is_some())
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    fn is_stale(&self, key: &QueryKey) -> Result<bool, CacheError> {
        let storage = self
            .storage
            .read()
            .map_err(|_| CacheError::Storage("lock poisoned".into()))?;
        Ok(storage.get(key).map(|e| e.stale).unwrap_or(false))
    }
}
