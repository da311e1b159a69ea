//! Outbound ports: the tariff cache and the event channels
//!
//! Failures of these collaborators are side effects of a mutation that has
//! already been committed, so they have their own error types and are
//! never turned into a `DomainError`.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{CachedTariff, MutationEvent, TariffPatch};

/// Expiry of a freshly written cache entry
pub const CACHE_TTL: Duration = Duration::from_secs(86_400);

// ── Cache ──────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Backend(String),

    #[error("cache entry is not valid: {0}")]
    Decode(String),
}

/// Key-value mirror of individual tariffs keyed by tariff id
#[async_trait]
pub trait TariffCache: Send + Sync {
    async fn get(&self, id: i32) -> Result<Option<CachedTariff>, CacheError>;

    /// Overwrite the entry. `None` keeps it until deleted.
    async fn set(
        &self,
        id: i32,
        value: &CachedTariff,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError>;

    /// Merge the set fields of `patch` into an existing entry, keeping its
    /// expiry. Does nothing if the entry is absent.
    async fn merge_update(&self, id: i32, patch: &TariffPatch) -> Result<(), CacheError>;

    async fn delete(&self, id: i32) -> Result<(), CacheError>;

    /// Cheap liveness check for the health endpoint
    async fn ping(&self) -> Result<(), CacheError> {
        Ok(())
    }
}

// ── Event channels ─────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("broker connection failed: {0}")]
    Connection(String),

    #[error("publish failed: {0}")]
    Publish(String),

    #[error("event encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

impl ChannelError {
    /// Encoding errors repeat on every attempt.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ChannelError::Encode(_))
    }
}

/// A downstream destination for mutation events
#[async_trait]
pub trait EventChannel: Send + Sync {
    /// Short label used in logs and metrics
    fn name(&self) -> &'static str;

    async fn deliver(&self, event: &MutationEvent) -> Result<(), ChannelError>;

    /// Push out anything still buffered.
    async fn flush(&self) -> Result<(), ChannelError> {
        Ok(())
    }
}
