//! Create package_plans table
//!
//! Catalog of prepaid swap packages drivers can subscribe to.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PackagePlans::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PackagePlans::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PackagePlans::Name).string().not_null())
                    .col(ColumnDef::new(PackagePlans::Description).text())
                    .col(
                        ColumnDef::new(PackagePlans::MaxSwapPerMonth)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PackagePlans::Price)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(PackagePlans::PlanType)
                            .string()
                            .not_null()
                            .default("MONTHLY"),
                    )
                    .col(
                        ColumnDef::new(PackagePlans::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(PackagePlans::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PackagePlans::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum PackagePlans {
    Table,
    Id,
    Name,
    Description,
    MaxSwapPerMonth,
    Price,
    PlanType,
    IsActive,
    CreatedAt,
}
