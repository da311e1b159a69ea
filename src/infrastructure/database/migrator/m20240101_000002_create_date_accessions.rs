//! Create date_accessions table (tariff batch headers)

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(DateAccessions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DateAccessions::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(DateAccessions::AccessionDate).date().not_null())
                    .col(
                        ColumnDef::new(DateAccessions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DateAccessions::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // Dates repeat across uploads, so the index is not unique.
        manager
            .create_index(
                Index::create()
                    .name("idx_date_accessions_date")
                    .table(DateAccessions::Table)
                    .col(DateAccessions::AccessionDate)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(DateAccessions::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum DateAccessions {
    Table,
    Id,
    AccessionDate,
    CreatedAt,
    UpdatedAt,
}
