//! Database migrations module

pub use sea_orm_migration::prelude::*;

mod m20240101_000001_create_package_plans;
mod m20240101_000002_create_subscriptions;
mod m20240101_000003_create_bookings;
mod m20240101_000004_create_swap_transactions;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_package_plans::Migration),
            Box::new(m20240101_000002_create_subscriptions::Migration),
            Box::new(m20240101_000003_create_bookings::Migration),
            Box::new(m20240101_000004_create_swap_transactions::Migration),
        ]
    }
}
