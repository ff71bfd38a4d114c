//! SeaORM implementation of BookingRepository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Select, Set,
};

use super::{corrupt_column, db_err, is_unique_violation};
use crate::domain::booking::{Booking, BookingFilter, BookingRepository, BookingStatus, PaymentType};
use crate::domain::{DomainError, DomainResult};
use crate::infrastructure::database::entities::booking;
use crate::shared::PaginationParams;

pub struct SeaOrmBookingRepository {
    db: DatabaseConnection,
}

impl SeaOrmBookingRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

// ── Conversion helpers ──────────────────────────────────────────

fn model_to_domain(m: booking::Model) -> DomainResult<Booking> {
    let status = BookingStatus::from_str(&m.status)
        .ok_or_else(|| corrupt_column("booking", "status", &m.status))?;
    let payment_type = PaymentType::from_str(&m.payment_type)
        .ok_or_else(|| corrupt_column("booking", "payment_type", &m.payment_type))?;
    Ok(Booking {
        id: m.id,
        driver_id: m.driver_id,
        station_id: m.station_id,
        battery_model_id: m.battery_model_id,
        booking_time: m.booking_time,
        scheduled_time: m.scheduled_time,
        payment_type,
        package_id: m.package_id,
        payment_id: m.payment_id,
        is_paid: m.is_paid,
        notes: m.notes,
        status,
        created_at: m.created_at,
        updated_at: m.updated_at,
    })
}

fn models_to_domain(models: Vec<booking::Model>) -> DomainResult<Vec<Booking>> {
    models.into_iter().map(model_to_domain).collect()
}

fn apply_filter(mut query: Select<booking::Entity>, filter: &BookingFilter) -> Select<booking::Entity> {
    if let Some(driver_id) = &filter.driver_id {
        query = query.filter(booking::Column::DriverId.eq(driver_id.as_str()));
    }
    if let Some(station_id) = &filter.station_id {
        query = query.filter(booking::Column::StationId.eq(station_id.as_str()));
    }
    if let Some(status) = filter.status {
        query = query.filter(booking::Column::Status.eq(status.as_str()));
    }
    if let Some(from) = filter.from_time {
        query = query.filter(booking::Column::ScheduledTime.gte(from));
    }
    if let Some(to) = filter.to_time {
        query = query.filter(booking::Column::ScheduledTime.lte(to));
    }
    query
}

// ── BookingRepository impl ──────────────────────────────────────

#[async_trait]
impl BookingRepository for SeaOrmBookingRepository {
    async fn insert(&self, b: Booking) -> DomainResult<Booking> {
        debug!("Inserting booking for driver {}", b.driver_id);

        let driver_id = b.driver_id.clone();
        let model = booking::ActiveModel {
            driver_id: Set(b.driver_id),
            station_id: Set(b.station_id),
            battery_model_id: Set(b.battery_model_id),
            booking_time: Set(b.booking_time),
            scheduled_time: Set(b.scheduled_time),
            payment_type: Set(b.payment_type.as_str().to_string()),
            package_id: Set(b.package_id),
            payment_id: Set(b.payment_id),
            is_paid: Set(b.is_paid),
            notes: Set(b.notes),
            status: Set(b.status.as_str().to_string()),
            created_at: Set(b.created_at),
            updated_at: Set(b.updated_at),
            ..Default::default()
        };

        match model.insert(&self.db).await {
            Ok(m) => model_to_domain(m),
            Err(e) if is_unique_violation(&e) => Err(DomainError::DriverHasPendingBooking(driver_id)),
            Err(e) => Err(db_err(e)),
        }
    }

    async fn find_by_id(&self, id: i32) -> DomainResult<Option<Booking>> {
        booking::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_err)?
            .map(model_to_domain)
            .transpose()
    }

    async fn find_pending_for_driver(&self, driver_id: &str) -> DomainResult<Option<Booking>> {
        booking::Entity::find()
            .filter(booking::Column::DriverId.eq(driver_id))
            .filter(booking::Column::Status.eq(BookingStatus::Pending.as_str()))
            .one(&self.db)
            .await
            .map_err(db_err)?
            .map(model_to_domain)
            .transpose()
    }

    async fn update_if_status(
        &self,
        b: &Booking,
        expected: BookingStatus,
    ) -> DomainResult<bool> {
        debug!("Updating booking {} ({} -> {})", b.id, expected, b.status);

        // is_paid is owned by mark_paid and never written here.
        let changes = booking::ActiveModel {
            status: Set(b.status.as_str().to_string()),
            notes: Set(b.notes.clone()),
            payment_id: Set(b.payment_id.clone()),
            updated_at: Set(b.updated_at),
            ..Default::default()
        };
        let result = booking::Entity::update_many()
            .set(changes)
            .filter(booking::Column::Id.eq(b.id))
            .filter(booking::Column::Status.eq(expected.as_str()))
            .exec(&self.db)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected == 1)
    }

    async fn mark_paid(&self, id: i32, now: DateTime<Utc>) -> DomainResult<bool> {
        let changes = booking::ActiveModel {
            is_paid: Set(true),
            updated_at: Set(now),
            ..Default::default()
        };
        let result = booking::Entity::update_many()
            .set(changes)
            .filter(booking::Column::Id.eq(id))
            .filter(booking::Column::IsPaid.eq(false))
            .exec(&self.db)
            .await
            .map_err(db_err)?;
        if result.rows_affected > 0 {
            return Ok(true);
        }
        match self.find_by_id(id).await? {
            Some(_) => Ok(false),
            None => Err(DomainError::not_found("Booking", id)),
        }
    }

    async fn search(
        &self,
        filter: &BookingFilter,
        pagination: PaginationParams,
    ) -> DomainResult<(Vec<Booking>, u64)> {
        let query = apply_filter(booking::Entity::find(), filter);
        let total = query.clone().count(&self.db).await.map_err(db_err)?;
        let models = query
            .order_by_desc(booking::Column::ScheduledTime)
            .order_by_desc(booking::Column::Id)
            .offset(pagination.offset())
            .limit(pagination.limit as u64)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        Ok((models_to_domain(models)?, total))
    }

    async fn find_overdue(&self, now: DateTime<Utc>, limit: u64) -> DomainResult<Vec<Booking>> {
        let models = booking::Entity::find()
            .filter(booking::Column::Status.is_in([
                BookingStatus::Pending.as_str(),
                BookingStatus::Confirm.as_str(),
            ]))
            .filter(booking::Column::ScheduledTime.lt(now))
            .order_by_asc(booking::Column::ScheduledTime)
            .order_by_asc(booking::Column::Id)
            .limit(limit)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        models_to_domain(models)
    }

    async fn find_upcoming(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> DomainResult<Vec<Booking>> {
        let models = booking::Entity::find()
            .filter(booking::Column::Status.eq(BookingStatus::Confirm.as_str()))
            .filter(booking::Column::ScheduledTime.gte(from))
            .filter(booking::Column::ScheduledTime.lte(until))
            .order_by_asc(booking::Column::ScheduledTime)
            .order_by_asc(booking::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        models_to_domain(models)
    }

    async fn delete(&self, id: i32) -> DomainResult<bool> {
        debug!("Deleting booking {}", id);
        let result = booking::Entity::delete_by_id(id)
            .exec(&self.db)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::booking::NewBooking;
    use crate::infrastructure::database::repositories::test_support::test_db;
    use chrono::Duration;

    fn new_booking(driver: &str, scheduled: DateTime<Utc>) -> Booking {
        Booking::new(
            NewBooking {
                driver_id: driver.into(),
                station_id: "station-1".into(),
                battery_model_id: "BM-48V".into(),
                scheduled_time: scheduled,
                payment_type: PaymentType::PerSwap,
                package_id: None,
                notes: Some("gate B".into()),
            },
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn pending_unique_index_rejects_second_booking() {
        let repo = SeaOrmBookingRepository::new(test_db().await);
        let first = repo.insert(new_booking("driver-1", Utc::now())).await.unwrap();
        assert!(first.id > 0);

        let err = repo.insert(new_booking("driver-1", Utc::now())).await.unwrap_err();
        assert_eq!(err, DomainError::DriverHasPendingBooking("driver-1".into()));

        // Once the first leaves PENDING the driver may book again.
        let mut confirmed = first.clone();
        confirmed.confirm(Utc::now()).unwrap();
        assert!(repo.update_if_status(&confirmed, BookingStatus::Pending).await.unwrap());
        assert!(repo.insert(new_booking("driver-1", Utc::now())).await.is_ok());
    }

    #[tokio::test]
    async fn compare_and_set_loses_against_stale_status() {
        let repo = SeaOrmBookingRepository::new(test_db().await);
        let stored = repo.insert(new_booking("driver-1", Utc::now())).await.unwrap();

        let mut a = stored.clone();
        a.confirm(Utc::now()).unwrap();
        let mut b = stored.clone();
        b.cancel("too late", Utc::now()).unwrap();

        assert!(repo.update_if_status(&a, BookingStatus::Pending).await.unwrap());
        assert!(!repo.update_if_status(&b, BookingStatus::Pending).await.unwrap());

        let current = repo.find_by_id(stored.id).await.unwrap().unwrap();
        assert_eq!(current.status, BookingStatus::Confirm);
        assert_eq!(current.notes.as_deref(), Some("gate B"));
    }

    #[tokio::test]
    async fn mark_paid_reports_first_change_only() {
        let repo = SeaOrmBookingRepository::new(test_db().await);
        let stored = repo.insert(new_booking("driver-1", Utc::now())).await.unwrap();

        assert!(repo.mark_paid(stored.id, Utc::now()).await.unwrap());
        assert!(!repo.mark_paid(stored.id, Utc::now()).await.unwrap());
        assert!(matches!(
            repo.mark_paid(404, Utc::now()).await.unwrap_err(),
            DomainError::NotFound { .. }
        ));
    }

    #[tokio::test]
    async fn transition_from_stale_copy_keeps_payment() {
        let repo = SeaOrmBookingRepository::new(test_db().await);
        let stored = repo.insert(new_booking("driver-1", Utc::now())).await.unwrap();
        let mut stale = repo.find_by_id(stored.id).await.unwrap().unwrap();

        assert!(repo.mark_paid(stored.id, Utc::now()).await.unwrap());
        stale.confirm(Utc::now()).unwrap();
        assert!(repo.update_if_status(&stale, BookingStatus::Pending).await.unwrap());

        let current = repo.find_by_id(stored.id).await.unwrap().unwrap();
        assert_eq!(current.status, BookingStatus::Confirm);
        assert!(current.is_paid);
    }

    #[tokio::test]
    async fn search_overdue_and_upcoming_queries() {
        let repo = SeaOrmBookingRepository::new(test_db().await);
        let now = Utc::now();

        let past = repo.insert(new_booking("driver-1", now - Duration::hours(1))).await.unwrap();
        let soon = repo.insert(new_booking("driver-2", now + Duration::hours(3))).await.unwrap();
        let mut confirmed = soon.clone();
        confirmed.confirm(now).unwrap();
        repo.update_if_status(&confirmed, BookingStatus::Pending).await.unwrap();

        let overdue = repo.find_overdue(now, 10).await.unwrap();
        assert_eq!(overdue.iter().map(|b| b.id).collect::<Vec<_>>(), vec![past.id]);

        let upcoming = repo.find_upcoming(now, now + Duration::hours(24)).await.unwrap();
        assert_eq!(upcoming.iter().map(|b| b.id).collect::<Vec<_>>(), vec![soon.id]);

        let (page, total) = repo
            .search(&BookingFilter::default(), PaginationParams::normalized(1, 1))
            .await
            .unwrap();
        assert_eq!(total, 2);
        assert_eq!(page[0].id, soon.id, "latest scheduled first");

        let filter = BookingFilter {
            status: Some(BookingStatus::Confirm),
            ..Default::default()
        };
        let (page, total) = repo.search(&filter, PaginationParams::default()).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(page[0].driver_id, "driver-2");

        assert!(repo.delete(past.id).await.unwrap());
        assert!(!repo.delete(past.id).await.unwrap());
    }
}
