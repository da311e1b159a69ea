//! In-process tariff cache for development and tests

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;

use crate::application::ports::{CacheError, TariffCache};
use crate::domain::{CachedTariff, TariffPatch};

struct Entry {
    value: CachedTariff,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| at <= Instant::now())
    }
}

#[derive(Default)]
pub struct InMemoryTariffCache {
    entries: DashMap<i32, Entry>,
}

impl InMemoryTariffCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| !e.is_expired()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: i32) -> bool {
        self.entries.get(&id).is_some_and(|e| !e.is_expired())
    }
}

#[async_trait]
impl TariffCache for InMemoryTariffCache {
    async fn get(&self, id: i32) -> Result<Option<CachedTariff>, CacheError> {
        if let Some(entry) = self.entries.get(&id) {
            if !entry.is_expired() {
                return Ok(Some(entry.value.clone()));
            }
        }
        // Re-checked under the shard lock: a fresh `set` since the read survives.
        self.entries.remove_if(&id, |_, entry| entry.is_expired());
        Ok(None)
    }

    async fn set(
        &self,
        id: i32,
        value: &CachedTariff,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        self.entries.insert(
            id,
            Entry {
                value: value.clone(),
                expires_at: ttl.map(|ttl| Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn merge_update(&self, id: i32, patch: &TariffPatch) -> Result<(), CacheError> {
        if let Some(mut entry) = self.entries.get_mut(&id) {
            if !entry.is_expired() {
                patch.apply_to(&mut entry.value, Utc::now());
            }
        }
        Ok(())
    }

    async fn delete(&self, id: i32) -> Result<(), CacheError> {
        self.entries.remove(&id);
        Ok(())
    }
}
