//! Tariff workflow against the SeaORM store (in-memory SQLite), the
//! in-process cache and recording channels.

use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;

use tariff_service::application::{
    BatchPayload, DispatchMode, DispatcherOptions, NotificationDispatcher, TariffService,
};
use tariff_service::domain::{
    ActionType, DomainError, DomainResult, NewTariff, Tariff, TariffBatch, TariffPage,
    TariffPatch, TariffRepository,
};
use tariff_service::infrastructure::database::repositories::SeaOrmTariffRepository;
use tariff_service::infrastructure::{connect_in_memory, InMemoryTariffCache, RecordingChannel};
use tariff_service::shared::RetryConfig;

/// SeaORM store that counts single-tariff reads.
struct CountingRepo {
    inner: SeaOrmTariffRepository,
    reads: AtomicUsize,
}

impl CountingRepo {
    fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TariffRepository for CountingRepo {
    async fn create_batch(
        &self,
        accession_date: NaiveDate,
        tariffs: Vec<NewTariff>,
    ) -> DomainResult<TariffBatch> {
        self.inner.create_batch(accession_date, tariffs).await
    }

    async fn find_by_id(&self, id: i32) -> DomainResult<Option<Tariff>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.find_by_id(id).await
    }

    async fn list(&self, page: u64, page_size: u64) -> DomainResult<TariffPage> {
        self.inner.list(page, page_size).await
    }

    async fn update_partial(&self, id: i32, patch: TariffPatch) -> DomainResult<Option<Tariff>> {
        self.inner.update_partial(id, patch).await
    }

    async fn delete(&self, id: i32) -> DomainResult<bool> {
        self.inner.delete(id).await
    }

    async fn delete_batch(&self, id: i32) -> DomainResult<Option<Vec<i32>>> {
        self.inner.delete_batch(id).await
    }
}

struct Harness {
    service: TariffService,
    repo: Arc<CountingRepo>,
    cache: Arc<InMemoryTariffCache>,
    kafka: Arc<RecordingChannel>,
    rabbit: Arc<RecordingChannel>,
    notifier: Arc<NotificationDispatcher>,
}

async fn harness(mode: DispatchMode) -> Harness {
    let db = connect_in_memory().await.unwrap();
    let repo = Arc::new(CountingRepo {
        inner: SeaOrmTariffRepository::new(db),
        reads: AtomicUsize::new(0),
    });
    let cache = Arc::new(InMemoryTariffCache::new());
    let kafka = Arc::new(RecordingChannel::new("kafka"));
    let rabbit = Arc::new(RecordingChannel::new("rabbitmq"));
    let notifier = Arc::new(NotificationDispatcher::new(
        kafka.clone(),
        rabbit.clone(),
        DispatcherOptions {
            mode,
            queue_capacity: 64,
            retry: RetryConfig::none(),
        },
    ));
    let service = TariffService::new(repo.clone(), cache.clone(), notifier.clone());

    Harness {
        service,
        repo,
        cache,
        kafka,
        rabbit,
        notifier,
    }
}

fn payload(json: &str) -> BatchPayload {
    BatchPayload::from_slice(json.as_bytes()).unwrap()
}

const TWO_DATES: &str = r#"{
    "2020-06-01": [{"category_type": "Glass", "rate": "0.04"},
                   {"category_type": "Other", "rate": "0.01"}],
    "2020-07-01": [{"category_type": "Glass", "rate": 0.035},
                   {"category_type": "Other", "rate": 0.015}]
}"#;

#[tokio::test]
async fn batch_creation_persists_in_key_order() {
    let h = harness(DispatchMode::Inline).await;

    let batches = h.service.create_batches(payload(TWO_DATES)).await.unwrap();

    assert_eq!(batches.len(), 2);
    assert_eq!(batches[0].accession_date.to_string(), "2020-06-01");
    assert_eq!(batches[1].accession_date.to_string(), "2020-07-01");
    assert!(batches[0].id < batches[1].id);
    assert_eq!(batches[0].tariffs[0].rate, 0.04);
    assert!(batches[1]
        .tariffs
        .iter()
        .all(|t| t.date_accession_id == batches[1].id));

    let page = h.service.list_tariffs(1, 10).await.unwrap();
    assert_eq!(page.total, 4);

    let created: Vec<_> = h.kafka.events();
    assert_eq!(created.len(), 2);
    assert_eq!(created[0].action, ActionType::Create);
    assert_eq!(created[0].routing_key(), "event.created");
    assert_eq!(created[1].date_accession_id, Some(batches[1].id));
    assert_eq!(h.rabbit.events().len(), 2);
}

#[tokio::test]
async fn invalid_rate_anywhere_rejects_whole_payload() {
    let h = harness(DispatchMode::Inline).await;

    let err = h
        .service
        .create_batches(payload(
            r#"{
                "2020-06-01": [{"category_type": "Glass", "rate": 0.04}],
                "2020-07-01": [{"category_type": "Glass", "rate": 0.04},
                               {"category_type": "Other", "rate": 1.5}]
            }"#,
        ))
        .await
        .unwrap_err();

    match err {
        DomainError::Validation(msg) => {
            assert!(msg.contains("2020-07-01[1].rate"), "{}", msg)
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(h.service.list_tariffs(1, 10).await.unwrap().total, 0);
    assert!(h.kafka.events().is_empty());
}

#[tokio::test]
async fn read_through_cache_never_hits_store_twice() {
    let h = harness(DispatchMode::Inline).await;
    let batches = h.service.create_batches(payload(TWO_DATES)).await.unwrap();
    let id = batches[0].tariffs[0].id;

    assert!(!h.cache.contains(id));
    let first = h.service.get_tariff(id).await.unwrap();
    assert!(h.cache.contains(id));

    // Remove the row behind the cache's back: a hit must not consult the store.
    assert!(h.repo.delete(id).await.unwrap());
    let second = h.service.get_tariff(id).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn update_merges_into_cache_and_notifies() {
    let h = harness(DispatchMode::Inline).await;
    let batches = h.service.create_batches(payload(TWO_DATES)).await.unwrap();
    let id = batches[0].tariffs[0].id;
    h.service.get_tariff(id).await.unwrap();

    let changed = h
        .service
        .update_tariff(
            id,
            TariffPatch {
                category_type: None,
                rate: Some(0.05),
            },
        )
        .await
        .unwrap();
    assert_eq!(changed.rate, Some(0.05));

    let cached = h.service.get_tariff(id).await.unwrap();
    assert_eq!(cached.rate, 0.05);
    assert_eq!(cached.category_type, "Glass");
    assert_eq!(h.repo.find_by_id(id).await.unwrap().unwrap().rate, 0.05);

    let last = h.rabbit.events().pop().unwrap();
    assert_eq!(last.action, ActionType::Update);
    assert_eq!(last.routing_key(), "event.updated");
    assert_eq!(last.tariff_id, Some(id));
    assert_eq!(last.new_tariff, Some(changed));
}

#[tokio::test]
async fn update_of_uncached_tariff_leaves_cache_absent() {
    let h = harness(DispatchMode::Inline).await;
    let batches = h.service.create_batches(payload(TWO_DATES)).await.unwrap();
    let id = batches[1].tariffs[1].id;

    h.service
        .update_tariff(
            id,
            TariffPatch {
                category_type: Some("Ceramic".into()),
                rate: None,
            },
        )
        .await
        .unwrap();

    assert!(!h.cache.contains(id));
    let fresh = h.service.get_tariff(id).await.unwrap();
    assert_eq!(fresh.category_type, "Ceramic");
    assert_eq!(fresh.rate, 0.015);
}

#[tokio::test]
async fn read_after_update_of_cached_tariff_skips_store() {
    let h = harness(DispatchMode::Inline).await;
    let batches = h.service.create_batches(payload(TWO_DATES)).await.unwrap();
    let id = batches[0].tariffs[1].id;
    h.service.get_tariff(id).await.unwrap();
    let reads = h.repo.reads();

    h.service
        .update_tariff(
            id,
            TariffPatch {
                category_type: None,
                rate: Some(0.02),
            },
        )
        .await
        .unwrap();
    let after = h.service.get_tariff(id).await.unwrap();

    assert_eq!(after.rate, 0.02);
    assert_eq!(h.repo.reads(), reads);
}

#[tokio::test]
async fn update_of_missing_tariff_is_not_found() {
    let h = harness(DispatchMode::Inline).await;

    let err = h
        .service
        .update_tariff(
            404,
            TariffPatch {
                category_type: Some("Glass".into()),
                rate: None,
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, DomainError::NotFound { .. }));
    assert!(h.kafka.events().is_empty());
}

#[tokio::test]
async fn delete_invalidates_cache_then_reads_fail() {
    let h = harness(DispatchMode::Inline).await;
    let batches = h.service.create_batches(payload(TWO_DATES)).await.unwrap();
    let id = batches[1].tariffs[0].id;
    h.service.get_tariff(id).await.unwrap();

    h.service.delete_tariff(id).await.unwrap();

    assert!(!h.cache.contains(id));
    assert!(matches!(
        h.service.get_tariff(id).await,
        Err(DomainError::NotFound { .. })
    ));
    let last = h.kafka.events().pop().unwrap();
    assert_eq!(last.action, ActionType::Delete);
    assert_eq!(last.tariff_id, Some(id));

    // Second delete: not found, and no further event
    let events_before = h.kafka.events().len();
    assert!(matches!(
        h.service.delete_tariff(id).await,
        Err(DomainError::NotFound { .. })
    ));
    assert_eq!(h.kafka.events().len(), events_before);
}

#[tokio::test]
async fn batch_delete_removes_its_tariffs_only() {
    let h = harness(DispatchMode::Inline).await;
    let batches = h.service.create_batches(payload(TWO_DATES)).await.unwrap();
    let doomed: Vec<i32> = batches[0].tariffs.iter().map(|t| t.id).collect();
    for id in &doomed {
        h.service.get_tariff(*id).await.unwrap();
    }

    let mut removed = h.service.delete_batch(batches[0].id).await.unwrap();
    removed.sort();

    assert_eq!(removed, doomed);
    assert!(doomed.iter().all(|id| !h.cache.contains(*id)));
    assert_eq!(h.service.list_tariffs(1, 10).await.unwrap().total, 2);

    let deletes = h
        .kafka
        .events()
        .into_iter()
        .filter(|e| e.action == ActionType::Delete)
        .count();
    assert_eq!(deletes, doomed.len());

    assert!(matches!(
        h.service.delete_batch(batches[0].id).await,
        Err(DomainError::NotFound { .. })
    ));
}

#[tokio::test]
async fn cost_is_exact_decimal_product() {
    let h = harness(DispatchMode::Inline).await;
    let batches = h.service.create_batches(payload(TWO_DATES)).await.unwrap();
    let glass = batches[0].tariffs[0].id;

    let quote = h
        .service
        .calculate_cost(glass, Decimal::from_str("1000.0").unwrap())
        .await
        .unwrap();

    assert_eq!(quote.insurance_cost, Decimal::from(40));
    assert_eq!(quote.rate, 0.04);
    let last = h.kafka.events().pop().unwrap();
    assert_eq!(last.action, ActionType::Calculate);
    assert_eq!(last.routing_key(), "event.calculated");

    assert!(matches!(
        h.service.calculate_cost(9999, Decimal::ONE).await,
        Err(DomainError::NotFound { .. })
    ));
}

#[tokio::test]
async fn broken_channel_does_not_fail_mutations() {
    let h = harness(DispatchMode::Inline).await;
    h.rabbit.set_failing(true);

    let batches = h.service.create_batches(payload(TWO_DATES)).await.unwrap();
    let id = batches[0].tariffs[0].id;
    h.service.delete_tariff(id).await.unwrap();

    assert!(h.rabbit.events().is_empty());
    assert!(h.rabbit.attempts() >= 3);
    // The other channel is unaffected
    assert_eq!(h.kafka.events().len(), 3);
}

#[tokio::test]
async fn background_dispatch_drains_on_shutdown() {
    let h = harness(DispatchMode::Background).await;

    let batches = h.service.create_batches(payload(TWO_DATES)).await.unwrap();
    h.service
        .delete_tariff(batches[0].tariffs[1].id)
        .await
        .unwrap();

    tokio::time::timeout(Duration::from_secs(5), h.notifier.shutdown())
        .await
        .unwrap();

    assert_eq!(h.kafka.events().len(), 3);
    assert_eq!(h.rabbit.events().len(), 3);
    assert_eq!(h.kafka.flushes(), 1);
    assert_eq!(h.rabbit.flushes(), 1);
}
