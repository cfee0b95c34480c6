//! Query cache port.
//!
//! The cache is a keyed store of JSON values addressed by [`QueryKey`]. It is
//! always injected, never global: every primitive and workflow in this crate
//! receives the cache it works on.
//!
//! ## Example
//!
//! ```ignore
//! use lab_booking_sync::cache::{InMemoryQueryCache, QueryCache, QueryCacheExt};
//! use lab_booking_sync::keys::lab_keys;
//!
//! let cache = InMemoryQueryCache::new();
//! cache.set_typed(&lab_keys::list(), &Vec::<Lab>::new())?;
//! cache.invalidate_queries(&lab_keys::all())?;
//! assert!(cache.is_stale(&lab_keys::list())?);
//! ```

mod in_memory;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::keys::QueryKey;

pub use in_memory::InMemoryQueryCache;

/// Error type for cache operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    /// Backing storage failed (e.g. a poisoned lock).
    #[error("cache storage error: {0}")]
    Storage(String),
    /// A cached value could not be (de)serialized into the requested type.
    #[error("cache serialization error at {key}: {message}")]
    Serde { key: String, message: String },
}

/// Minimal cache-library surface the crate depends on.
///
/// Prefix arguments match hierarchically: a prefix selects every key that
/// starts with it, including the prefix key itself.
pub trait QueryCache: Send + Sync {
    /// Current data for an exact key.
    fn get_query_data(&self, key: &QueryKey) -> Result<Option<Value>, CacheError>;

    /// Replace the data stored at an exact key. Clears the stale flag.
    fn set_query_data(&self, key: &QueryKey, data: Value) -> Result<(), CacheError>;

    /// Read-modify-write an exact key under a single lock.
    ///
    /// The updater receives the current data (or `None`); returning `None`
    /// leaves the entry untouched.
    fn update_query_data(
        &self,
        key: &QueryKey,
        updater: &mut dyn FnMut(Option<Value>) -> Option<Value>,
    ) -> Result<(), CacheError>;

    /// Mark every entry under `prefix` stale. Entries are kept.
    fn invalidate_queries(&self, prefix: &QueryKey) -> Result<usize, CacheError>;

    /// Abort in-flight fetches under `prefix`.
    fn cancel_queries(&self, prefix: &QueryKey) -> Result<usize, CacheError>;

    /// Drop every entry under `prefix`.
    fn remove_queries(&self, prefix: &QueryKey) -> Result<usize, CacheError>;

    /// Drop the entry at an exact key. Keys below it are left alone.
    ///
    /// Returns whether an entry was removed.
    fn remove_query_data(&self, key: &QueryKey) -> Result<bool, CacheError>;

    /// Keys currently present under `prefix`.
    fn keys_matching(&self, prefix: &QueryKey) -> Result<Vec<QueryKey>, CacheError>;

    /// Whether the entry at `key` is marked stale. Absent entries are not stale.
    fn is_stale(&self, key: &QueryKey) -> Result<bool, CacheError>;
}

/// Typed accessors over any [`QueryCache`].
pub trait QueryCacheExt: QueryCache {
    fn get_typed<T: DeserializeOwned>(&self, key: &QueryKey) -> Result<Option<T>, CacheError> {
        match self.get_query_data(key)? {
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| CacheError::Serde {
                    key: key.to_string(),
                    message: e.to_string(),
                }),
            None => Ok(None),
        }
    }

    fn set_typed<T: Serialize>(&self, key: &QueryKey, data: &T) -> Result<(), CacheError> {
        let value = serde_json::to_value(data).map_err(|e| CacheError::Serde {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        self.set_query_data(key, value)
    }
}

impl<C: QueryCache + ?Sized> QueryCacheExt for C {}

/// Read a keyed list. Absent or non-array data reads as empty.
pub(crate) fn read_list<T: DeserializeOwned>(
    cache: &dyn QueryCache,
    key: &QueryKey,
) -> Result<Vec<T>, CacheError> {
    Ok(cache
        .get_query_data(key)?
        .and_then(|value| serde_json::from_value::<Vec<T>>(value).ok())
        .unwrap_or_default())
}

/// Read-modify-write a keyed list of `T`. An absent entry starts empty.
///
/// Cached data that does not decode as a list of `T` is left untouched and
/// reported as [`CacheError::Serde`]. Returns the list as written.
pub(crate) fn update_list<T, F>(
    cache: &dyn QueryCache,
    key: &QueryKey,
    mut f: F,
) -> Result<Vec<T>, CacheError>
where
    T: Serialize + DeserializeOwned,
    F: FnMut(Vec<T>) -> Vec<T>,
{
    let mut written: Option<Result<Vec<T>, CacheError>> = None;
    cache.update_query_data(key, &mut |current| {
        let list: Vec<T> = match current {
            None => Vec::new(),
            Some(value) => match serde_json::from_value(value) {
                Ok(list) => list,
                Err(e) => {
                    written = Some(Err(CacheError::Serde {
                        key: key.to_string(),
                        message: e.to_string(),
                    }));
                    return None;
                }
            },
        };
        let next = f(list);
        match serde_json::to_value(&next) {
            Ok(value) => {
                written = Some(Ok(next));
                Some(value)
            }
            Err(e) => {
                written = Some(Err(CacheError::Serde {
                    key: key.to_string(),
                    message: e.to_string(),
                }));
                None
            }
        }
    })?;
    written.unwrap_or_else(|| Ok(Vec::new()))
}

/// Like [`update_list`] but skips the write entirely when the entry is absent.
pub(crate) fn patch_existing_list<T, F>(
    cache: &dyn QueryCache,
    key: &QueryKey,
    mut f: F,
) -> Result<Vec<T>, CacheError>
where
    T: Serialize + DeserializeOwned,
    F: FnMut(Vec<T>) -> Vec<T>,
{
    let mut written: Vec<T> = Vec::new();
    let mut failure: Option<CacheError> = None;
    cache.update_query_data(key, &mut |current| {
        let list: Vec<T> = serde_json::from_value(current?).ok()?;
        let next = f(list);
        match serde_json::to_value(&next) {
            Ok(value) => {
                written = next;
                Some(value)
            }
            Err(e) => {
                failure = Some(CacheError::Serde {
                    key: key.to_string(),
                    message: e.to_string(),
                });
                None
            }
        }
    })?;
    match failure {
        Some(err) => Err(err),
        None => Ok(written),
    }
}
