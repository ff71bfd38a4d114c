//! Create bookings table
//!
//! At most one PENDING booking per driver, enforced by a partial unique index.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Bookings::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Bookings::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Bookings::DriverId).string().not_null())
                    .col(ColumnDef::new(Bookings::StationId).string().not_null())
                    .col(ColumnDef::new(Bookings::BatteryModelId).string().not_null())
                    .col(
                        ColumnDef::new(Bookings::BookingTime)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Bookings::ScheduledTime)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Bookings::PaymentType)
                            .string()
                            .not_null()
                            .default("PER_SWAP"),
                    )
                    .col(ColumnDef::new(Bookings::PackageId).integer())
                    .col(ColumnDef::new(Bookings::PaymentId).string())
                    .col(
                        ColumnDef::new(Bookings::IsPaid)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Bookings::Notes).text())
                    .col(
                        ColumnDef::new(Bookings::Status)
                            .string()
                            .not_null()
                            .default("PENDING"),
                    )
                    .col(
                        ColumnDef::new(Bookings::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Bookings::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_bookings_driver")
                    .table(Bookings::Table)
                    .col(Bookings::DriverId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_bookings_station")
                    .table(Bookings::Table)
                    .col(Bookings::StationId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_bookings_status_scheduled")
                    .table(Bookings::Table)
                    .col(Bookings::Status)
                    .col(Bookings::ScheduledTime)
                    .to_owned(),
            )
            .await?;

        manager
            .get_connection()
            .execute_unprepared(
                "CREATE UNIQUE INDEX IF NOT EXISTS uq_bookings_pending_driver \
                 ON bookings (driver_id) WHERE status = 'PENDING'",
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Bookings::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Bookings {
    Table,
    Id,
    DriverId,
    StationId,
    BatteryModelId,
    BookingTime,
    ScheduledTime,
    PaymentType,
    PackageId,
    PaymentId,
    IsPaid,
    Notes,
    Status,
    CreatedAt,
    UpdatedAt,
}
