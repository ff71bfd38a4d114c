//! Booking repository interface

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::model::{Booking, BookingFilter, BookingStatus};
use crate::domain::DomainResult;
use crate::shared::PaginationParams;

#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Insert a new booking and return it with its assigned id.
    ///
    /// Fails with `DriverHasPendingBooking` when the store already holds a
    /// PENDING booking for the same driver.
    async fn insert(&self, booking: Booking) -> DomainResult<Booking>;

    async fn find_by_id(&self, id: i32) -> DomainResult<Option<Booking>>;

    async fn find_pending_for_driver(&self, driver_id: &str) -> DomainResult<Option<Booking>>;

    /// Persist `booking` only if the stored status still equals `expected`.
    /// Returns false when another writer moved the booking first.
    async fn update_if_status(&self, booking: &Booking, expected: BookingStatus)
        -> DomainResult<bool>;

    /// Set `is_paid = true`. Returns false if it was already paid.
    async fn mark_paid(&self, id: i32, now: DateTime<Utc>) -> DomainResult<bool>;

    /// Filtered page ordered by scheduled time, newest first.
    async fn search(
        &self,
        filter: &BookingFilter,
        pagination: PaginationParams,
    ) -> DomainResult<(Vec<Booking>, u64)>;

    /// PENDING or CONFIRM bookings scheduled before `now`, oldest first.
    async fn find_overdue(&self, now: DateTime<Utc>, limit: u64) -> DomainResult<Vec<Booking>>;

    /// CONFIRM bookings scheduled within `[from, until]`, soonest first.
    async fn find_upcoming(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> DomainResult<Vec<Booking>>;

    /// Hard delete. Returns false if nothing was deleted.
    async fn delete(&self, id: i32) -> DomainResult<bool>;
}
