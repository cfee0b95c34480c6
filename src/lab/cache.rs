//! Lab cache updates. Labs are only ever replaced whole.

use tracing::debug;

use super::model::Lab;
use crate::booking::next_temp_key;
use crate::cache::{patch_existing_list, update_list, CacheError, QueryCache, QueryCacheExt};
use crate::keys::lab_keys;

pub struct LabCacheUpdates<'a> {
    cache: &'a dyn QueryCache,
}

impl<'a> LabCacheUpdates<'a> {
    pub fn new(cache: &'a dyn QueryCache) -> Self {
        Self { cache }
    }

    /// Append to the lab list and seed the by-id entry.
    pub fn add_lab(&self, lab: &Lab) -> Result<(), CacheError> {
        update_list::<Lab, _>(self.cache, &lab_keys::list(), |mut list| {
            list.retain(|l| l.id != lab.id);
            list.push(lab.clone());
            list
        })?;
        self.cache.set_typed(&lab_keys::by_id(&lab.id), lab)
    }

    /// Replace the lab with the same id. No-op if the list was never fetched.
    pub fn update_lab(&self, lab: &Lab) -> Result<(), CacheError> {
        patch_existing_list::<Lab, _>(self.cache, &lab_keys::list(), |list| {
            list.into_iter()
                .map(|l| if l.id == lab.id { lab.clone() } else { l })
                .collect()
        })?;
        self.cache.set_typed(&lab_keys::by_id(&lab.id), lab)
    }

    pub fn remove_lab(&self, lab_id: &str) -> Result<(), CacheError> {
        patch_existing_list::<Lab, _>(self.cache, &lab_keys::list(), |list| {
            list.into_iter().filter(|l| l.id != lab_id).collect()
        })?;
        self.cache.remove_query_data(&lab_keys::by_id(lab_id))?;
        Ok(())
    }

    /// Insert a placeholder lab under a temp id and return it.
    pub fn add_optimistic_lab(&self, lab: &Lab) -> Result<Lab, CacheError> {
        let optimistic = Lab {
            id: next_temp_key(),
            is_optimistic: true,
            is_pending: true,
            ..lab.clone()
        };
        update_list::<Lab, _>(self.cache, &lab_keys::list(), |mut list| {
            list.push(optimistic.clone());
            list
        })?;
        debug!(temp_id = %optimistic.id, "added optimistic lab");
        Ok(optimistic)
    }

    pub fn replace_optimistic_lab(&self, temp_id: &str, real: &Lab) -> Result<(), CacheError> {
        let confirmed = Lab {
            is_optimistic: false,
            is_pending: false,
            ..real.clone()
        };
        patch_existing_list::<Lab, _>(self.cache, &lab_keys::list(), |list| {
            let already_present = list.iter().any(|l| l.id == confirmed.id);
            list.into_iter()
                .filter_map(|l| {
                    if l.id == temp_id {
                        (!already_present).then(|| confirmed.clone())
                    } else {
                        Some(l)
                    }
                })
                .collect()
        })?;
        self.cache.set_typed(&lab_keys::by_id(&confirmed.id), &confirmed)
    }

    pub fn remove_optimistic_lab(&self, temp_id: &str) -> Result<(), CacheError> {
        patch_existing_list::<Lab, _>(self.cache, &lab_keys::list(), |list| {
            list.into_iter().filter(|l| l.id != temp_id).collect()
        })?;
        Ok(())
    }
}

pub trait LabCacheExt {
    fn labs(&self) -> LabCacheUpdates<'_>;
}

impl<C: QueryCache> LabCacheExt for C {
    fn labs(&self) -> LabCacheUpdates<'_> {
        LabCacheUpdates::new(self)
    }
}

impl LabCacheExt for dyn QueryCache {
    fn labs(&self) -> LabCacheUpdates<'_> {
        LabCacheUpdates::new(self)
    }
}
