//! Database migrations module

pub use sea_orm_migration::prelude::*;

mod m20240101_000001_create_users;
mod m20240101_000002_create_date_accessions;
mod m20240101_000003_create_tariffs;
mod m20240101_000004_create_blogs;
mod m20240101_000005_create_tags;
mod m20240101_000006_create_blog_tags;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_users::Migration),
            Box::new(m20240101_000002_create_date_accessions::Migration),
            Box::new(m20240101_000003_create_tariffs::Migration),
            Box::new(m20240101_000004_create_blogs::Migration),
            Box::new(m20240101_000005_create_tags::Migration),
            Box::new(m20240101_000006_create_blog_tags::Migration),
        ]
    }
}
