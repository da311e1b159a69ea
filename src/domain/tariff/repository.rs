//! Tariff repository interface

use async_trait::async_trait;
use chrono::NaiveDate;

use super::model::{NewTariff, Tariff, TariffBatch, TariffPatch};
use crate::domain::DomainResult;

/// One page of tariffs ordered by id
#[derive(Debug, Clone)]
pub struct TariffPage {
    pub items: Vec<Tariff>,
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
}

#[async_trait]
pub trait TariffRepository: Send + Sync {
    /// Insert a batch header and all of its tariffs in one transaction.
    async fn create_batch(
        &self,
        accession_date: NaiveDate,
        tariffs: Vec<NewTariff>,
    ) -> DomainResult<TariffBatch>;

    async fn find_by_id(&self, id: i32) -> DomainResult<Option<Tariff>>;
    async fn list(&self, page: u64, page_size: u64) -> DomainResult<TariffPage>;

    /// Returns `None` when no row has this id.
    async fn update_partial(&self, id: i32, patch: TariffPatch) -> DomainResult<Option<Tariff>>;

    /// Returns whether a row was removed.
    async fn delete(&self, id: i32) -> DomainResult<bool>;

    /// Remove a batch with its tariffs, returning the ids of the removed
    /// tariffs, or `None` when the batch does not exist.
    async fn delete_batch(&self, id: i32) -> DomainResult<Option<Vec<i32>>>;
}
