pub use sea_orm_migration::prelude::*;

mod m20250901_000001_create_enum_types;
mod m20250901_000002_create_catalog;
mod m20250901_000003_create_carts_and_orders;
mod m20250901_000004_create_rewards;
mod m20250901_000005_create_notifications;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250901_000001_create_enum_types::Migration),
            Box::new(m20250901_000002_create_catalog::Migration),
            Box::new(m20250901_000003_create_carts_and_orders::Migration),
            Box::new(m20250901_000004_create_rewards::Migration),
            Box::new(m20250901_000005_create_notifications::Migration),
        ]
    }
}
