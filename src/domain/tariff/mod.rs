//! Tariff aggregate
//!
//! Tariffs grouped under accession-date batches, the cached mirror of a
//! tariff, and insurance cost calculation.

pub mod model;
pub mod repository;

pub use model::{
    insurance_cost, rate_to_decimal, validate_category, validate_rate, CachedTariff, NewTariff,
    Tariff, TariffBatch, TariffPatch, MAX_CATEGORY_LEN,
};
pub use repository::{TariffPage, TariffRepository};
