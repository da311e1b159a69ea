//! SeaORM implementation of TariffRepository

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use log::info;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};

use crate::domain::{
    DomainError, DomainResult, NewTariff, Tariff, TariffBatch, TariffPage, TariffPatch,
    TariffRepository,
};
use crate::infrastructure::database::entities::{date_accession, tariff};

// ── Conversion helpers ──────────────────────────────────────────

fn db_err(e: sea_orm::DbErr) -> DomainError {
    DomainError::Storage(format!("Database error: {}", e))
}

fn entity_to_domain(t: tariff::Model) -> Tariff {
    Tariff {
        id: t.id,
        category_type: t.category_type,
        rate: t.rate,
        date_accession_id: t.date_accession_id,
        created_at: t.created_at,
        updated_at: t.updated_at,
    }
}

// ── SeaOrmTariffRepository ──────────────────────────────────────

pub struct SeaOrmTariffRepository {
    db: DatabaseConnection,
}

impl SeaOrmTariffRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TariffRepository for SeaOrmTariffRepository {
    async fn create_batch(
        &self,
        accession_date: NaiveDate,
        tariffs: Vec<NewTariff>,
    ) -> DomainResult<TariffBatch> {
        let now = Utc::now();
        // Rolled back on drop if any step below fails.
        let txn = self.db.begin().await.map_err(db_err)?;

        let header = date_accession::ActiveModel {
            accession_date: Set(accession_date),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(db_err)?;

        if !tariffs.is_empty() {
            let rows = tariffs.into_iter().map(|t| tariff::ActiveModel {
                category_type: Set(t.category_type),
                rate: Set(t.rate),
                date_accession_id: Set(header.id),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            });
            tariff::Entity::insert_many(rows)
                .exec(&txn)
                .await
                .map_err(db_err)?;
        }

        let models = tariff::Entity::find()
            .filter(tariff::Column::DateAccessionId.eq(header.id))
            .order_by_asc(tariff::Column::Id)
            .all(&txn)
            .await
            .map_err(db_err)?;

        txn.commit().await.map_err(db_err)?;

        info!(
            "Created tariff batch {} for {} with {} tariffs",
            header.id,
            accession_date,
            models.len()
        );
        Ok(TariffBatch {
            id: header.id,
            accession_date: header.accession_date,
            created_at: header.created_at,
            updated_at: header.updated_at,
            tariffs: models.into_iter().map(entity_to_domain).collect(),
        })
    }

    async fn find_by_id(&self, id: i32) -> DomainResult<Option<Tariff>> {
        let model = tariff::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_err)?;
        Ok(model.map(entity_to_domain))
    }

    async fn list(&self, page: u64, page_size: u64) -> DomainResult<TariffPage> {
        let page = page.max(1);
        let page_size = page_size.max(1);
        let paginator = tariff::Entity::find()
            .order_by_asc(tariff::Column::Id)
            .paginate(&self.db, page_size);

        let total = paginator.num_items().await.map_err(db_err)?;
        let models = paginator.fetch_page(page - 1).await.map_err(db_err)?;

        Ok(TariffPage {
            items: models.into_iter().map(entity_to_domain).collect(),
            total,
            page,
            page_size,
        })
    }

    async fn update_partial(&self, id: i32, patch: TariffPatch) -> DomainResult<Option<Tariff>> {
        let Some(existing) = tariff::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_err)?
        else {
            return Ok(None);
        };

        let mut active: tariff::ActiveModel = existing.into();
        if let Some(category_type) = patch.category_type {
            active.category_type = Set(category_type);
        }
        if let Some(rate) = patch.rate {
            active.rate = Set(rate);
        }
        active.updated_at = Set(Utc::now());

        let updated = active.update(&self.db).await.map_err(db_err)?;
        info!("Updated tariff {}", id);
        Ok(Some(entity_to_domain(updated)))
    }

    async fn delete(&self, id: i32) -> DomainResult<bool> {
        let result = tariff::Entity::delete_by_id(id)
            .exec(&self.db)
            .await
            .map_err(db_err)?;
        if result.rows_affected > 0 {
            info!("Deleted tariff {}", id);
        }
        Ok(result.rows_affected > 0)
    }

    async fn delete_batch(&self, id: i32) -> DomainResult<Option<Vec<i32>>> {
        let txn = self.db.begin().await.map_err(db_err)?;

        let exists = date_accession::Entity::find_by_id(id)
            .one(&txn)
            .await
            .map_err(db_err)?
            .is_some();
        if !exists {
            return Ok(None);
        }

        let tariff_ids: Vec<i32> = tariff::Entity::find()
            .select_only()
            .column(tariff::Column::Id)
            .filter(tariff::Column::DateAccessionId.eq(id))
            .order_by_asc(tariff::Column::Id)
            .into_tuple()
            .all(&txn)
            .await
            .map_err(db_err)?;

        // The foreign key cascades as well; deleting the children first
        // keeps this correct on connections with foreign keys disabled.
        tariff::Entity::delete_many()
            .filter(tariff::Column::DateAccessionId.eq(id))
            .exec(&txn)
            .await
            .map_err(db_err)?;
        date_accession::Entity::delete_by_id(id)
            .exec(&txn)
            .await
            .map_err(db_err)?;

        txn.commit().await.map_err(db_err)?;
        info!("Deleted tariff batch {} with {} tariffs", id, tariff_ids.len());
        Ok(Some(tariff_ids))
    }
}

// ── Tests ──────────────────────────────────────────────────────
