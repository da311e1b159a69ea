//! Ports to infrastructure collaborators

pub mod outbound;

pub use outbound::{CacheError, ChannelError, EventChannel, TariffCache, CACHE_TTL};
