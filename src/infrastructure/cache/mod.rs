//! Tariff cache backends

pub mod memory;
pub mod redis;

pub use memory::InMemoryTariffCache;
pub use self::redis::RedisTariffCache;
