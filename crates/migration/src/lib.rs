//! Database schema migrations for ClassData

pub use sea_orm_migration::prelude::*;

mod migrations;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(migrations::m20250801_000001_create_submissions::Migration),
            Box::new(migrations::m20250801_000002_create_submission_events::Migration),
            Box::new(migrations::m20250801_000003_create_cache_entries::Migration),
        ]
    }
}
