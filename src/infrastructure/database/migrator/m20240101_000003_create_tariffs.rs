//! Create tariffs table

use sea_orm_migration::prelude::*;

use super::m20240101_000002_create_date_accessions::DateAccessions;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Tariffs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Tariffs::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Tariffs::CategoryType).string_len(20).not_null())
                    .col(ColumnDef::new(Tariffs::Rate).double().not_null())
                    .col(ColumnDef::new(Tariffs::DateAccessionId).integer().not_null())
                    .col(
                        ColumnDef::new(Tariffs::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Tariffs::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tariffs_date_accession")
                            .from(Tariffs::Table, Tariffs::DateAccessionId)
                            .to(DateAccessions::Table, DateAccessions::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_tariffs_date_accession_id")
                    .table(Tariffs::Table)
                    .col(Tariffs::DateAccessionId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Tariffs::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Tariffs {
    Table,
    Id,
    CategoryType,
    Rate,
    DateAccessionId,
    CreatedAt,
    UpdatedAt,
}
