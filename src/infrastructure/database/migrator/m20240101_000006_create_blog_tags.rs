//! Create blog_tags link table

use sea_orm_migration::prelude::*;

use super::m20240101_000004_create_blogs::Blogs;
use super::m20240101_000005_create_tags::Tags;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(BlogTags::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(BlogTags::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(BlogTags::BlogId).integer().not_null())
                    .col(ColumnDef::new(BlogTags::TagId).integer().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_blog_tags_blog")
                            .from(BlogTags::Table, BlogTags::BlogId)
                            .to(Blogs::Table, Blogs::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_blog_tags_tag")
                            .from(BlogTags::Table, BlogTags::TagId)
                            .to(Tags::Table, Tags::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_blog_tags_pair")
                    .table(BlogTags::Table)
                    .col(BlogTags::BlogId)
                    .col(BlogTags::TagId)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(BlogTags::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum BlogTags {
    Table,
    Id,
    BlogId,
    TagId,
}
