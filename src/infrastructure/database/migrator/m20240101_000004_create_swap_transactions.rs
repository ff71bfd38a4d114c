//! Create swap_transactions table
//!
//! One transaction per booking (unique booking_id).

use sea_orm_migration::prelude::*;

use super::m20240101_000003_create_bookings::Bookings;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SwapTransactions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SwapTransactions::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(SwapTransactions::BookingId)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(SwapTransactions::StationId).string().not_null())
                    .col(ColumnDef::new(SwapTransactions::DriverId).string().not_null())
                    .col(
                        ColumnDef::new(SwapTransactions::OldBatteryId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SwapTransactions::NewBatteryId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SwapTransactions::Amount)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SwapTransactions::PaymentMethod)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(SwapTransactions::SubscriptionId).integer())
                    .col(
                        ColumnDef::new(SwapTransactions::Status)
                            .string()
                            .not_null()
                            .default("PENDING"),
                    )
                    .col(
                        ColumnDef::new(SwapTransactions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SwapTransactions::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_swap_transactions_booking")
                            .from(SwapTransactions::Table, SwapTransactions::BookingId)
                            .to(Bookings::Table, Bookings::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("uq_swap_transactions_booking")
                    .table(SwapTransactions::Table)
                    .col(SwapTransactions::BookingId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_swap_transactions_status_created")
                    .table(SwapTransactions::Table)
                    .col(SwapTransactions::Status)
                    .col(SwapTransactions::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_swap_transactions_old_battery")
                    .table(SwapTransactions::Table)
                    .col(SwapTransactions::OldBatteryId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_swap_transactions_new_battery")
                    .table(SwapTransactions::Table)
                    .col(SwapTransactions::NewBatteryId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_swap_transactions_subscription")
                    .table(SwapTransactions::Table)
                    .col(SwapTransactions::SubscriptionId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SwapTransactions::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum SwapTransactions {
    Table,
    Id,
    BookingId,
    StationId,
    DriverId,
    OldBatteryId,
    NewBatteryId,
    Amount,
    PaymentMethod,
    SubscriptionId,
    Status,
    CreatedAt,
    UpdatedAt,
}
