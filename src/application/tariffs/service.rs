//! Tariff workflow
//!
//! Each mutation writes the store first. Once that commits, cache upkeep
//! and event fan-out run concurrently, and their failures are logged
//! without failing the request.

use std::sync::Arc;

use futures_util::future::join_all;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use super::ingest::BatchPayload;
use crate::application::notifications::NotificationDispatcher;
use crate::application::ports::{TariffCache, CACHE_TTL};
use crate::domain::tariff::insurance_cost;
use crate::domain::{
    CachedTariff, DomainError, DomainResult, MutationEvent, Tariff, TariffBatch, TariffPage,
    TariffPatch, TariffRepository,
};

/// Result of a cost calculation
#[derive(Debug, Clone, PartialEq)]
pub struct CostQuote {
    pub tariff_id: i32,
    pub declared_value: Decimal,
    pub rate: f64,
    pub insurance_cost: Decimal,
}

pub struct TariffService {
    repo: Arc<dyn TariffRepository>,
    cache: Arc<dyn TariffCache>,
    notifier: Arc<NotificationDispatcher>,
}

impl TariffService {
    pub fn new(
        repo: Arc<dyn TariffRepository>,
        cache: Arc<dyn TariffCache>,
        notifier: Arc<NotificationDispatcher>,
    ) -> Self {
        Self {
            repo,
            cache,
            notifier,
        }
    }

    /// Create one batch per date key, in payload order. A store failure
    /// stops processing; batches created before it stay.
    pub async fn create_batches(&self, payload: BatchPayload) -> DomainResult<Vec<TariffBatch>> {
        let inputs = payload.validate()?;
        let mut created = Vec::with_capacity(inputs.len());

        for input in inputs {
            let date = input.accession_date;
            let count = input.tariffs.len();
            let batch = self
                .repo
                .create_batch(date, input.tariffs)
                .await
                .map_err(|e| {
                    warn!(
                        accession_date = %date,
                        committed = created.len(),
                        error = %e,
                        "Batch creation stopped"
                    );
                    e
                })?;

            info!(
                batch_id = batch.id,
                accession_date = %date,
                count,
                "Tariff batch created"
            );
            self.notifier
                .dispatch(MutationEvent::created(batch.id, batch.updated_at))
                .await;
            created.push(batch);
        }

        Ok(created)
    }

    /// Cache first; a miss reads the store and fills the cache.
    pub async fn get_tariff(&self, id: i32) -> DomainResult<Tariff> {
        match self.cache.get(id).await {
            Ok(Some(cached)) => {
                metrics::counter!("tariff_cache_requests_total", "outcome" => "hit").increment(1);
                debug!(tariff_id = id, "Cache hit");
                return Ok(cached.into_tariff(id));
            }
            Ok(None) => {
                metrics::counter!("tariff_cache_requests_total", "outcome" => "miss").increment(1);
            }
            Err(e) => {
                metrics::counter!("tariff_cache_requests_total", "outcome" => "error").increment(1);
                warn!(tariff_id = id, error = %e, "Cache read failed, using store");
            }
        }

        let tariff = self
            .repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::tariff_not_found(id))?;

        if let Err(e) = self
            .cache
            .set(id, &CachedTariff::from(&tariff), Some(CACHE_TTL))
            .await
        {
            warn!(tariff_id = id, error = %e, "Cache write failed");
        }
        Ok(tariff)
    }

    pub async fn list_tariffs(&self, page: u64, page_size: u64) -> DomainResult<TariffPage> {
        self.repo.list(page.max(1), page_size).await
    }

    /// Apply a partial update and return the fields that changed.
    pub async fn update_tariff(&self, id: i32, patch: TariffPatch) -> DomainResult<TariffPatch> {
        patch.validate()?;

        self.repo
            .update_partial(id, patch.clone())
            .await?
            .ok_or_else(|| DomainError::tariff_not_found(id))?;
        info!(tariff_id = id, "Tariff updated");

        let (cached, ()) = tokio::join!(
            self.cache.merge_update(id, &patch),
            self.notifier
                .dispatch(MutationEvent::updated(id, patch.clone())),
        );
        if let Err(e) = cached {
            warn!(tariff_id = id, error = %e, "Cache merge failed");
        }

        Ok(patch)
    }

    pub async fn delete_tariff(&self, id: i32) -> DomainResult<()> {
        if self.repo.find_by_id(id).await?.is_none() {
            return Err(DomainError::tariff_not_found(id));
        }

        if !self.repo.delete(id).await? {
            return Err(DomainError::tariff_not_found(id));
        }
        info!(tariff_id = id, "Tariff deleted");

        let (cached, ()) = tokio::join!(
            self.cache.delete(id),
            self.notifier.dispatch(MutationEvent::deleted(id)),
        );
        if let Err(e) = cached {
            warn!(tariff_id = id, error = %e, "Cache invalidation failed");
        }
        Ok(())
    }

    /// Delete a batch with all its tariffs. Returns the removed tariff ids.
    pub async fn delete_batch(&self, id: i32) -> DomainResult<Vec<i32>> {
        let removed = self
            .repo
            .delete_batch(id)
            .await?
            .ok_or_else(|| DomainError::batch_not_found(id))?;
        info!(batch_id = id, count = removed.len(), "Tariff batch deleted");

        let invalidate = join_all(removed.iter().map(|&tariff_id| async move {
            if let Err(e) = self.cache.delete(tariff_id).await {
                warn!(tariff_id, error = %e, "Cache invalidation failed");
            }
        }));
        let notify = async {
            for &tariff_id in &removed {
                self.notifier.dispatch(MutationEvent::deleted(tariff_id)).await;
            }
        };
        tokio::join!(invalidate, notify);

        Ok(removed)
    }

    /// Price a declared value under a stored tariff. Reads the store only.
    pub async fn calculate_cost(
        &self,
        tariff_id: i32,
        declared_value: Decimal,
    ) -> DomainResult<CostQuote> {
        let tariff = self
            .repo
            .find_by_id(tariff_id)
            .await?
            .ok_or_else(|| DomainError::tariff_not_found(tariff_id))?;

        let cost = insurance_cost(declared_value, tariff.rate)?;
        self.notifier
            .dispatch(MutationEvent::calculated(tariff_id))
            .await;

        Ok(CostQuote {
            tariff_id,
            declared_value,
            rate: tariff.rate,
            insurance_cost: cost,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::notifications::{DispatchMode, DispatcherOptions};
    use crate::application::ports::CacheError;
    use crate::domain::{ActionType, NewTariff};
    use crate::infrastructure::cache::InMemoryTariffCache;
    use crate::infrastructure::messaging::RecordingChannel;
    use crate::shared::RetryConfig;
    use async_trait::async_trait;
    use chrono::{NaiveDate, Utc};
    use std::str::FromStr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Store double that can refuse one accession date and counts reads.
    #[derive(Default)]
    struct FakeRepo {
        batches: Mutex<Vec<TariffBatch>>,
        next_id: AtomicUsize,
        reads: AtomicUsize,
        fail_on: Option<NaiveDate>,
    }

    impl FakeRepo {
        fn failing_on(date: NaiveDate) -> Self {
            Self {
                fail_on: Some(date),
                ..Self::default()
            }
        }

        fn id(&self) -> i32 {
            self.next_id.fetch_add(1, Ordering::SeqCst) as i32 + 1
        }

        fn all(&self) -> Vec<Tariff> {
            self.batches
                .lock()
                .unwrap()
                .iter()
                .flat_map(|b| b.tariffs.clone())
                .collect()
        }
    }

    #[async_trait]
    impl TariffRepository for FakeRepo {
        async fn create_batch(
            &self,
            accession_date: NaiveDate,
            tariffs: Vec<NewTariff>,
        ) -> DomainResult<TariffBatch> {
            if self.fail_on == Some(accession_date) {
                return Err(DomainError::Storage("disk full".into()));
            }
            let now = Utc::now();
            let batch_id = self.id();
            let batch = TariffBatch {
                id: batch_id,
                accession_date,
                created_at: now,
                updated_at: now,
                tariffs: tariffs
                    .into_iter()
                    .map(|t| Tariff {
                        id: self.id(),
                        category_type: t.category_type,
                        rate: t.rate,
                        date_accession_id: batch_id,
                        created_at: now,
                        updated_at: now,
                    })
                    .collect(),
            };
            self.batches.lock().unwrap().push(batch.clone());
            Ok(batch)
        }

        async fn find_by_id(&self, id: i32) -> DomainResult<Option<Tariff>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            Ok(self.all().into_iter().find(|t| t.id == id))
        }

        async fn list(&self, page: u64, page_size: u64) -> DomainResult<TariffPage> {
            let all = self.all();
            Ok(TariffPage {
                total: all.len() as u64,
                items: all,
                page,
                page_size,
            })
        }

        async fn update_partial(&self, id: i32, patch: TariffPatch) -> DomainResult<Option<Tariff>> {
            let mut batches = self.batches.lock().unwrap();
            let found = batches
                .iter_mut()
                .flat_map(|b| b.tariffs.iter_mut())
                .find(|t| t.id == id);
            Ok(found.map(|t| {
                if let Some(c) = &patch.category_type {
                    t.category_type = c.clone();
                }
                if let Some(r) = patch.rate {
                    t.rate = r;
                }
                t.clone()
            }))
        }

        async fn delete(&self, id: i32) -> DomainResult<bool> {
            let mut batches = self.batches.lock().unwrap();
            let mut removed = false;
            for b in batches.iter_mut() {
                let before = b.tariffs.len();
                b.tariffs.retain(|t| t.id != id);
                removed |= b.tariffs.len() != before;
            }
            Ok(removed)
        }

        async fn delete_batch(&self, id: i32) -> DomainResult<Option<Vec<i32>>> {
            let mut batches = self.batches.lock().unwrap();
            let Some(pos) = batches.iter().position(|b| b.id == id) else {
                return Ok(None);
            };
            let batch = batches.remove(pos);
            Ok(Some(batch.tariffs.iter().map(|t| t.id).collect()))
        }
    }

    /// Cache whose every call fails
    struct BrokenCache;

    #[async_trait]
    impl TariffCache for BrokenCache {
        async fn get(&self, _id: i32) -> Result<Option<CachedTariff>, CacheError> {
            Err(CacheError::Backend("connection refused".into()))
        }
        async fn set(&self, _: i32, _: &CachedTariff, _: Option<Duration>) -> Result<(), CacheError> {
            Err(CacheError::Backend("connection refused".into()))
        }
        async fn merge_update(&self, _: i32, _: &TariffPatch) -> Result<(), CacheError> {
            Err(CacheError::Backend("connection refused".into()))
        }
        async fn delete(&self, _: i32) -> Result<(), CacheError> {
            Err(CacheError::Backend("connection refused".into()))
        }
    }

    struct Harness {
        service: TariffService,
        repo: Arc<FakeRepo>,
        cache: Arc<InMemoryTariffCache>,
        kafka: Arc<RecordingChannel>,
        rabbit: Arc<RecordingChannel>,
    }

    fn dispatcher(kafka: Arc<RecordingChannel>, rabbit: Arc<RecordingChannel>) -> Arc<NotificationDispatcher> {
        Arc::new(NotificationDispatcher::new(
            kafka,
            rabbit,
            DispatcherOptions {
                mode: DispatchMode::Inline,
                queue_capacity: 8,
                retry: RetryConfig::none(),
            },
        ))
    }

    fn harness(repo: FakeRepo) -> Harness {
        let repo = Arc::new(repo);
        let cache = Arc::new(InMemoryTariffCache::new());
        let kafka = Arc::new(RecordingChannel::new("kafka"));
        let rabbit = Arc::new(RecordingChannel::new("rabbitmq"));
        let service = TariffService::new(
            repo.clone(),
            cache.clone(),
            dispatcher(kafka.clone(), rabbit.clone()),
        );
        Harness {
            service,
            repo,
            cache,
            kafka,
            rabbit,
        }
    }

    fn payload(json: &str) -> BatchPayload {
        BatchPayload::from_slice(json.as_bytes()).unwrap()
    }

    fn glass() -> BatchPayload {
        payload(r#"{"2020-07-01": [{"category_type": "Glass", "rate": 0.04}]}"#)
    }

    #[tokio::test]
    async fn create_emits_one_event_per_date() {
        let h = harness(FakeRepo::default());
        let batches = h
            .service
            .create_batches(payload(
                r#"{
                    "2020-07-01": [{"category_type": "Glass", "rate": 0.04},
                                   {"category_type": "Other", "rate": 0.01}],
                    "2020-08-01": [{"category_type": "Glass", "rate": 0.035}]
                }"#,
            ))
            .await
            .unwrap();

        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].tariffs.len(), 2);
        let events = h.kafka.events();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.action == ActionType::Create));
        assert_eq!(events[0].date_accession_id, Some(batches[0].id));
        assert_eq!(h.rabbit.events().len(), 2);
    }

    #[tokio::test]
    async fn invalid_payload_touches_nothing() {
        let h = harness(FakeRepo::default());
        let result = h
            .service
            .create_batches(payload(
                r#"{
                    "2020-07-01": [{"category_type": "Glass", "rate": 0.04}],
                    "2020-08-01": [{"category_type": "Glass", "rate": 2.0}]
                }"#,
            ))
            .await;

        assert!(matches!(result, Err(DomainError::Validation(_))));
        assert!(h.repo.all().is_empty());
        assert!(h.kafka.events().is_empty());
    }

    #[tokio::test]
    async fn storage_failure_keeps_earlier_dates() {
        let h = harness(FakeRepo::failing_on(NaiveDate::from_ymd_opt(2020, 8, 1).unwrap()));
        let result = h
            .service
            .create_batches(payload(
                r#"{
                    "2020-07-01": [{"category_type": "Glass", "rate": 0.04}],
                    "2020-08-01": [{"category_type": "Glass", "rate": 0.05}],
                    "2020-09-01": [{"category_type": "Glass", "rate": 0.06}]
                }"#,
            ))
            .await;

        assert!(matches!(result, Err(DomainError::Storage(_))));
        assert_eq!(h.repo.all().len(), 1);
        assert_eq!(h.kafka.events().len(), 1);
    }

    #[tokio::test]
    async fn read_fills_cache_then_hits_it() {
        let h = harness(FakeRepo::default());
        let id = h.service.create_batches(glass()).await.unwrap()[0].tariffs[0].id;

        let first = h.service.get_tariff(id).await.unwrap();
        assert!(h.cache.contains(id));
        let reads = h.repo.reads.load(Ordering::SeqCst);

        let second = h.service.get_tariff(id).await.unwrap();
        assert_eq!(h.repo.reads.load(Ordering::SeqCst), reads);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn broken_cache_does_not_fail_reads_or_writes() {
        let repo = Arc::new(FakeRepo::default());
        let kafka = Arc::new(RecordingChannel::new("kafka"));
        let rabbit = Arc::new(RecordingChannel::new("rabbitmq"));
        let service = TariffService::new(
            repo.clone(),
            Arc::new(BrokenCache),
            dispatcher(kafka.clone(), rabbit),
        );
        let id = service.create_batches(glass()).await.unwrap()[0].tariffs[0].id;

        assert_eq!(service.get_tariff(id).await.unwrap().rate, 0.04);
        let patch = TariffPatch {
            category_type: None,
            rate: Some(0.07),
        };
        assert_eq!(service.update_tariff(id, patch.clone()).await.unwrap(), patch);
        service.delete_tariff(id).await.unwrap();
        assert_eq!(kafka.events().len(), 3);
    }

    #[tokio::test]
    async fn update_merges_cache_and_echoes_patch() {
        let h = harness(FakeRepo::default());
        let id = h.service.create_batches(glass()).await.unwrap()[0].tariffs[0].id;
        h.service.get_tariff(id).await.unwrap();

        let patch = TariffPatch {
            category_type: None,
            rate: Some(0.05),
        };
        let echoed = h.service.update_tariff(id, patch.clone()).await.unwrap();
        assert_eq!(echoed, patch);

        let cached = h.cache.get(id).await.unwrap().unwrap();
        assert_eq!(cached.rate, 0.05);
        assert_eq!(cached.category_type, "Glass");

        let last = h.rabbit.events().pop().unwrap();
        assert_eq!(last.action, ActionType::Update);
        assert_eq!(last.new_tariff, Some(patch));
    }

    #[tokio::test]
    async fn update_of_missing_tariff_has_no_side_effects() {
        let h = harness(FakeRepo::default());
        let patch = TariffPatch {
            category_type: Some("Wood".into()),
            rate: None,
        };

        let err = h.service.update_tariff(99, patch).await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
        assert!(h.kafka.events().is_empty());
    }

    #[tokio::test]
    async fn delete_invalidates_cache_and_notifies() {
        let h = harness(FakeRepo::default());
        let id = h.service.create_batches(glass()).await.unwrap()[0].tariffs[0].id;
        h.service.get_tariff(id).await.unwrap();

        h.service.delete_tariff(id).await.unwrap();

        assert!(!h.cache.contains(id));
        let last = h.kafka.events().pop().unwrap();
        assert_eq!(last.action, ActionType::Delete);
        assert_eq!(last.tariff_id, Some(id));
        assert!(matches!(
            h.service.get_tariff(id).await,
            Err(DomainError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn delete_of_missing_tariff_is_not_found() {
        let h = harness(FakeRepo::default());
        assert!(matches!(
            h.service.delete_tariff(5).await,
            Err(DomainError::NotFound { .. })
        ));
        assert!(h.rabbit.events().is_empty());
    }

    #[tokio::test]
    async fn failing_channels_do_not_fail_mutations() {
        let h = harness(FakeRepo::default());
        h.kafka.set_failing(true);
        h.rabbit.set_failing(true);

        let batches = h.service.create_batches(glass()).await.unwrap();
        assert_eq!(batches.len(), 1);
        h.service.delete_tariff(batches[0].tariffs[0].id).await.unwrap();
    }

    #[tokio::test]
    async fn delete_batch_notifies_per_tariff() {
        let h = harness(FakeRepo::default());
        let batch = h
            .service
            .create_batches(payload(
                r#"{"2020-07-01": [{"category_type": "A", "rate": 0.1},
                                   {"category_type": "B", "rate": 0.2}]}"#,
            ))
            .await
            .unwrap()
            .remove(0);

        let removed = h.service.delete_batch(batch.id).await.unwrap();
        assert_eq!(removed.len(), 2);

        let deletes: Vec<_> = h
            .kafka
            .events()
            .into_iter()
            .filter(|e| e.action == ActionType::Delete)
            .filter_map(|e| e.tariff_id)
            .collect();
        assert_eq!(deletes, removed);
        assert!(matches!(
            h.service.delete_batch(batch.id).await,
            Err(DomainError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn calculate_is_exact_and_store_only() {
        let h = harness(FakeRepo::default());
        let id = h.service.create_batches(glass()).await.unwrap()[0].tariffs[0].id;

        let quote = h
            .service
            .calculate_cost(id, Decimal::from_str("1000.0").unwrap())
            .await
            .unwrap();

        assert_eq!(quote.insurance_cost, Decimal::from(40));
        assert!(!h.cache.contains(id));
        assert_eq!(h.rabbit.events().pop().unwrap().action, ActionType::Calculate);
    }

    #[tokio::test]
    async fn calculate_for_missing_tariff_is_not_found() {
        let h = harness(FakeRepo::default());
        assert!(matches!(
            h.service.calculate_cost(1, Decimal::ONE).await,
            Err(DomainError::NotFound { .. })
        ));
    }
}
