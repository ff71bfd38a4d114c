//! SeaORM implementation of SwapTransactionRepository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};

use super::{corrupt_column, db_err, is_unique_violation};
use crate::domain::swap_transaction::{
    AmountScope, SwapTransaction, SwapTransactionRepository, SwapTransactionStatus,
};
use crate::domain::{DomainError, DomainResult};
use crate::infrastructure::database::entities::swap_transaction;

pub struct SeaOrmSwapTransactionRepository {
    db: DatabaseConnection,
}

impl SeaOrmSwapTransactionRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn model_to_domain(m: swap_transaction::Model) -> DomainResult<SwapTransaction> {
    let status = SwapTransactionStatus::from_str(&m.status)
        .ok_or_else(|| corrupt_column("swap_transaction", "status", &m.status))?;
    Ok(SwapTransaction {
        id: m.id,
        booking_id: m.booking_id,
        station_id: m.station_id,
        driver_id: m.driver_id,
        old_battery_id: m.old_battery_id,
        new_battery_id: m.new_battery_id,
        amount: m.amount,
        payment_method: m.payment_method,
        subscription_id: m.subscription_id,
        status,
        created_at: m.created_at,
        updated_at: m.updated_at,
    })
}

fn models_to_domain(models: Vec<swap_transaction::Model>) -> DomainResult<Vec<SwapTransaction>> {
    models.into_iter().map(model_to_domain).collect()
}

#[async_trait]
impl SwapTransactionRepository for SeaOrmSwapTransactionRepository {
    async fn insert(&self, tx: SwapTransaction) -> DomainResult<SwapTransaction> {
        debug!("Inserting swap transaction for booking {}", tx.booking_id);

        let booking_id = tx.booking_id;
        let model = swap_transaction::ActiveModel {
            booking_id: Set(tx.booking_id),
            station_id: Set(tx.station_id),
            driver_id: Set(tx.driver_id),
            old_battery_id: Set(tx.old_battery_id),
            new_battery_id: Set(tx.new_battery_id),
            amount: Set(tx.amount),
            payment_method: Set(tx.payment_method),
            subscription_id: Set(tx.subscription_id),
            status: Set(tx.status.as_str().to_string()),
            created_at: Set(tx.created_at),
            updated_at: Set(tx.updated_at),
            ..Default::default()
        };

        match model.insert(&self.db).await {
            Ok(m) => model_to_domain(m),
            Err(e) if is_unique_violation(&e) => Err(DomainError::DuplicateTransaction(booking_id)),
            Err(e) => Err(db_err(e)),
        }
    }

    async fn find_by_id(&self, id: i32) -> DomainResult<Option<SwapTransaction>> {
        swap_transaction::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_err)?
            .map(model_to_domain)
            .transpose()
    }

    async fn find_by_booking(&self, booking_id: i32) -> DomainResult<Option<SwapTransaction>> {
        swap_transaction::Entity::find()
            .filter(swap_transaction::Column::BookingId.eq(booking_id))
            .one(&self.db)
            .await
            .map_err(db_err)?
            .map(model_to_domain)
            .transpose()
    }

    async fn update_if_status(
        &self,
        tx: &SwapTransaction,
        expected: SwapTransactionStatus,
    ) -> DomainResult<bool> {
        debug!("Updating swap transaction {} ({} -> {})", tx.id, expected, tx.status);

        let changes = swap_transaction::ActiveModel {
            status: Set(tx.status.as_str().to_string()),
            amount: Set(tx.amount),
            updated_at: Set(tx.updated_at),
            ..Default::default()
        };
        let result = swap_transaction::Entity::update_many()
            .set(changes)
            .filter(swap_transaction::Column::Id.eq(tx.id))
            .filter(swap_transaction::Column::Status.eq(expected.as_str()))
            .exec(&self.db)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected == 1)
    }

    async fn sum_successful(&self, scope: &AmountScope) -> DomainResult<i64> {
        let mut query = swap_transaction::Entity::find()
            .filter(swap_transaction::Column::Status.eq(SwapTransactionStatus::Success.as_str()));
        query = match scope {
            AmountScope::Driver(id) => query.filter(swap_transaction::Column::DriverId.eq(id.as_str())),
            AmountScope::Station(id) => {
                query.filter(swap_transaction::Column::StationId.eq(id.as_str()))
            }
        };

        let total: Option<Option<i64>> = query
            .select_only()
            .column_as(swap_transaction::Column::Amount.sum(), "total")
            .into_tuple()
            .one(&self.db)
            .await
            .map_err(db_err)?;
        Ok(total.flatten().unwrap_or(0))
    }

    async fn battery_history(&self, battery_id: &str) -> DomainResult<Vec<SwapTransaction>> {
        let models = swap_transaction::Entity::find()
            .filter(
                Condition::any()
                    .add(swap_transaction::Column::OldBatteryId.eq(battery_id))
                    .add(swap_transaction::Column::NewBatteryId.eq(battery_id)),
            )
            .order_by_desc(swap_transaction::Column::CreatedAt)
            .order_by_desc(swap_transaction::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        models_to_domain(models)
    }

    async fn find_pending_before(
        &self,
        cutoff: DateTime<Utc>,
        limit: u64,
    ) -> DomainResult<Vec<SwapTransaction>> {
        let models = swap_transaction::Entity::find()
            .filter(swap_transaction::Column::Status.eq(SwapTransactionStatus::Pending.as_str()))
            .filter(swap_transaction::Column::CreatedAt.lt(cutoff))
            .order_by_asc(swap_transaction::Column::CreatedAt)
            .order_by_asc(swap_transaction::Column::Id)
            .limit(limit)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        models_to_domain(models)
    }

    async fn count_successful_for_subscription(&self, subscription_id: i32) -> DomainResult<u64> {
        swap_transaction::Entity::find()
            .filter(swap_transaction::Column::SubscriptionId.eq(subscription_id))
            .filter(swap_transaction::Column::Status.eq(SwapTransactionStatus::Success.as_str()))
            .count(&self.db)
            .await
            .map_err(db_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::booking::{Booking, BookingRepository, NewBooking, PaymentType};
    use crate::domain::swap_transaction::NewSwapTransaction;
    use crate::infrastructure::database::repositories::booking_repository::SeaOrmBookingRepository;
    use crate::infrastructure::database::repositories::test_support::test_db;
    use chrono::Duration;

    async fn seed_booking(db: &DatabaseConnection, driver: &str) -> i32 {
        let repo = SeaOrmBookingRepository::new(db.clone());
        let booking = Booking::new(
            NewBooking {
                driver_id: driver.into(),
                station_id: "station-1".into(),
                battery_model_id: "BM-48V".into(),
                scheduled_time: Utc::now(),
                payment_type: PaymentType::PerSwap,
                package_id: None,
                notes: None,
            },
            Utc::now(),
        );
        repo.insert(booking).await.unwrap().id
    }

    fn tx(booking_id: i32, driver: &str, old: &str, new: &str, amount: i64) -> SwapTransaction {
        SwapTransaction::new(
            NewSwapTransaction {
                booking_id,
                station_id: "station-1".into(),
                driver_id: driver.into(),
                old_battery_id: old.into(),
                new_battery_id: new.into(),
                amount,
                payment_method: "CASH".into(),
            },
            None,
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn second_transaction_for_booking_is_rejected() {
        let db = test_db().await;
        let booking_id = seed_booking(&db, "driver-1").await;
        let repo = SeaOrmSwapTransactionRepository::new(db);

        repo.insert(tx(booking_id, "driver-1", "B1", "B2", 5_000)).await.unwrap();
        let err = repo
            .insert(tx(booking_id, "driver-1", "B1", "B3", 5_000))
            .await
            .unwrap_err();
        assert_eq!(err, DomainError::DuplicateTransaction(booking_id));
    }

    #[tokio::test]
    async fn status_compare_and_set() {
        let db = test_db().await;
        let booking_id = seed_booking(&db, "driver-1").await;
        let repo = SeaOrmSwapTransactionRepository::new(db);
        let stored = repo.insert(tx(booking_id, "driver-1", "B1", "B2", 5_000)).await.unwrap();

        let mut ok = stored.clone();
        ok.succeed(Utc::now()).unwrap();
        let mut failed = stored.clone();
        failed.fail(Utc::now()).unwrap();

        assert!(repo.update_if_status(&ok, SwapTransactionStatus::Pending).await.unwrap());
        assert!(!repo.update_if_status(&failed, SwapTransactionStatus::Pending).await.unwrap());
        let current = repo.find_by_booking(booking_id).await.unwrap().unwrap();
        assert_eq!(current.status, SwapTransactionStatus::Success);
    }

    #[tokio::test]
    async fn sums_only_successful_amounts() {
        let db = test_db().await;
        let b1 = seed_booking(&db, "driver-1").await;
        let b2 = seed_booking(&db, "driver-2").await;
        let b3 = seed_booking(&db, "driver-3").await;
        let repo = SeaOrmSwapTransactionRepository::new(db);

        for (booking_id, driver, amount, succeed) in [
            (b1, "driver-1", 5_000, true),
            (b2, "driver-1", 7_000, true),
            (b3, "driver-1", 9_000, false),
        ] {
            let mut stored = repo.insert(tx(booking_id, driver, "B1", "B2", amount)).await.unwrap();
            if succeed {
                stored.succeed(Utc::now()).unwrap();
                repo.update_if_status(&stored, SwapTransactionStatus::Pending).await.unwrap();
            }
        }

        let driver_total = repo
            .sum_successful(&AmountScope::Driver("driver-1".into()))
            .await
            .unwrap();
        assert_eq!(driver_total, 12_000);
        let nobody = repo
            .sum_successful(&AmountScope::Station("station-9".into()))
            .await
            .unwrap();
        assert_eq!(nobody, 0);
    }

    #[tokio::test]
    async fn battery_history_matches_either_side() {
        let db = test_db().await;
        let b1 = seed_booking(&db, "driver-1").await;
        let b2 = seed_booking(&db, "driver-2").await;
        let b3 = seed_booking(&db, "driver-3").await;
        let repo = SeaOrmSwapTransactionRepository::new(db);

        let first = repo.insert(tx(b1, "driver-1", "B1", "B2", 1)).await.unwrap();
        let second = repo.insert(tx(b2, "driver-2", "B2", "B3", 1)).await.unwrap();
        repo.insert(tx(b3, "driver-3", "B4", "B5", 1)).await.unwrap();

        let history = repo.battery_history("B2").await.unwrap();
        let ids: Vec<i32> = history.iter().map(|t| t.id).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&first.id) && ids.contains(&second.id));
        assert!(repo.battery_history("B9").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn pending_before_cutoff_oldest_first() {
        let db = test_db().await;
        let b1 = seed_booking(&db, "driver-1").await;
        let b2 = seed_booking(&db, "driver-2").await;
        let repo = SeaOrmSwapTransactionRepository::new(db);

        let mut old = tx(b1, "driver-1", "B1", "B2", 1);
        old.created_at = Utc::now() - Duration::hours(5);
        let old = repo.insert(old).await.unwrap();
        repo.insert(tx(b2, "driver-2", "B3", "B4", 1)).await.unwrap();

        let stuck = repo
            .find_pending_before(Utc::now() - Duration::hours(2), 10)
            .await
            .unwrap();
        assert_eq!(stuck.iter().map(|t| t.id).collect::<Vec<_>>(), vec![old.id]);
    }
}
