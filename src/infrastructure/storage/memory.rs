//! In-memory repositories for development and testing
//!
//! Uniqueness rules and compare-and-set updates are serialized by a
//! per-repository async mutex, mirroring the guarantees the SQL store gets
//! from its unique indexes and conditional UPDATEs.

use std::sync::atomic::{AtomicI32, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::domain::booking::{Booking, BookingFilter, BookingRepository, BookingStatus};
use crate::domain::subscription::{
    ConsumeOutcome, PackagePlan, Subscription, SubscriptionRepository, SubscriptionStatus,
};
use crate::domain::swap_transaction::{
    AmountScope, SwapTransaction, SwapTransactionRepository, SwapTransactionStatus,
};
use crate::domain::{DomainError, DomainResult, RepositoryProvider};
use crate::shared::PaginationParams;

// ── Bookings ───────────────────────────────────────────────────

#[derive(Default)]
pub struct InMemoryBookingRepository {
    rows: DashMap<i32, Booking>,
    counter: AtomicI32,
    guard: Mutex<()>,
}

#[async_trait]
impl BookingRepository for InMemoryBookingRepository {
    async fn insert(&self, mut booking: Booking) -> DomainResult<Booking> {
        let _lock = self.guard.lock().await;
        if booking.status == BookingStatus::Pending
            && self.rows.iter().any(|b| {
                b.driver_id == booking.driver_id && b.status == BookingStatus::Pending
            })
        {
            return Err(DomainError::DriverHasPendingBooking(booking.driver_id));
        }
        booking.id = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        self.rows.insert(booking.id, booking.clone());
        Ok(booking)
    }

    async fn find_by_id(&self, id: i32) -> DomainResult<Option<Booking>> {
        Ok(self.rows.get(&id).map(|b| b.clone()))
    }

    async fn find_pending_for_driver(&self, driver_id: &str) -> DomainResult<Option<Booking>> {
        Ok(self
            .rows
            .iter()
            .find(|b| b.driver_id == driver_id && b.status == BookingStatus::Pending)
            .map(|b| b.clone()))
    }

    async fn update_if_status(
        &self,
        booking: &Booking,
        expected: BookingStatus,
    ) -> DomainResult<bool> {
        let _lock = self.guard.lock().await;
        match self.rows.get_mut(&booking.id) {
            Some(mut stored) if stored.status == expected => {
                // is_paid belongs to mark_paid; a stale copy must not reset it.
                stored.status = booking.status;
                stored.notes = booking.notes.clone();
                stored.payment_id = booking.payment_id.clone();
                stored.updated_at = booking.updated_at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_paid(&self, id: i32, now: DateTime<Utc>) -> DomainResult<bool> {
        let _lock = self.guard.lock().await;
        match self.rows.get_mut(&id) {
            Some(mut stored) => Ok(stored.mark_paid(now)),
            None => Err(DomainError::not_found("Booking", id)),
        }
    }

    async fn search(
        &self,
        filter: &BookingFilter,
        pagination: PaginationParams,
    ) -> DomainResult<(Vec<Booking>, u64)> {
        let mut matched: Vec<Booking> = self
            .rows
            .iter()
            .filter(|b| filter.matches(b))
            .map(|b| b.clone())
            .collect();
        matched.sort_by(|a, b| b.scheduled_time.cmp(&a.scheduled_time).then(b.id.cmp(&a.id)));
        let total = matched.len() as u64;
        let page = matched
            .into_iter()
            .skip(pagination.offset() as usize)
            .take(pagination.limit as usize)
            .collect();
        Ok((page, total))
    }

    async fn find_overdue(&self, now: DateTime<Utc>, limit: u64) -> DomainResult<Vec<Booking>> {
        let mut overdue: Vec<Booking> = self
            .rows
            .iter()
            .filter(|b| b.is_overdue(now))
            .map(|b| b.clone())
            .collect();
        overdue.sort_by_key(|b| (b.scheduled_time, b.id));
        overdue.truncate(limit as usize);
        Ok(overdue)
    }

    async fn find_upcoming(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> DomainResult<Vec<Booking>> {
        let mut upcoming: Vec<Booking> = self
            .rows
            .iter()
            .filter(|b| {
                b.status == BookingStatus::Confirm
                    && b.scheduled_time >= from
                    && b.scheduled_time <= until
            })
            .map(|b| b.clone())
            .collect();
        upcoming.sort_by_key(|b| (b.scheduled_time, b.id));
        Ok(upcoming)
    }

    async fn delete(&self, id: i32) -> DomainResult<bool> {
        let _lock = self.guard.lock().await;
        Ok(self.rows.remove(&id).is_some())
    }
}

// ── Swap transactions ──────────────────────────────────────────

#[derive(Default)]
pub struct InMemorySwapTransactionRepository {
    rows: DashMap<i32, SwapTransaction>,
    counter: AtomicI32,
    guard: Mutex<()>,
}

#[async_trait]
impl SwapTransactionRepository for InMemorySwapTransactionRepository {
    async fn insert(&self, mut tx: SwapTransaction) -> DomainResult<SwapTransaction> {
        let _lock = self.guard.lock().await;
        if self.rows.iter().any(|t| t.booking_id == tx.booking_id) {
            return Err(DomainError::DuplicateTransaction(tx.booking_id));
        }
        tx.id = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        self.rows.insert(tx.id, tx.clone());
        Ok(tx)
    }

    async fn find_by_id(&self, id: i32) -> DomainResult<Option<SwapTransaction>> {
        Ok(self.rows.get(&id).map(|t| t.clone()))
    }

    async fn find_by_booking(&self, booking_id: i32) -> DomainResult<Option<SwapTransaction>> {
        Ok(self
            .rows
            .iter()
            .find(|t| t.booking_id == booking_id)
            .map(|t| t.clone()))
    }

    async fn update_if_status(
        &self,
        tx: &SwapTransaction,
        expected: SwapTransactionStatus,
    ) -> DomainResult<bool> {
        let _lock = self.guard.lock().await;
        match self.rows.get_mut(&tx.id) {
            Some(mut stored) if stored.status == expected => {
                *stored = tx.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn sum_successful(&self, scope: &AmountScope) -> DomainResult<i64> {
        Ok(self
            .rows
            .iter()
            .filter(|t| t.status == SwapTransactionStatus::Success && scope.matches(t))
            .map(|t| t.amount)
            .sum())
    }

    async fn battery_history(&self, battery_id: &str) -> DomainResult<Vec<SwapTransaction>> {
        let mut history: Vec<SwapTransaction> = self
            .rows
            .iter()
            .filter(|t| t.involves_battery(battery_id))
            .map(|t| t.clone())
            .collect();
        history.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(history)
    }

    async fn find_pending_before(
        &self,
        cutoff: DateTime<Utc>,
        limit: u64,
    ) -> DomainResult<Vec<SwapTransaction>> {
        let mut stuck: Vec<SwapTransaction> = self
            .rows
            .iter()
            .filter(|t| t.status == SwapTransactionStatus::Pending && t.created_at < cutoff)
            .map(|t| t.clone())
            .collect();
        stuck.sort_by_key(|t| (t.created_at, t.id));
        stuck.truncate(limit as usize);
        Ok(stuck)
    }

    async fn count_successful_for_subscription(&self, subscription_id: i32) -> DomainResult<u64> {
        Ok(self
            .rows
            .iter()
            .filter(|t| {
                t.status == SwapTransactionStatus::Success
                    && t.subscription_id == Some(subscription_id)
            })
            .count() as u64)
    }
}

// ── Subscriptions ──────────────────────────────────────────────

#[derive(Default)]
pub struct InMemorySubscriptionRepository {
    plans: DashMap<i32, PackagePlan>,
    rows: DashMap<i32, Subscription>,
    plan_counter: AtomicI32,
    counter: AtomicI32,
    guard: Mutex<()>,
}

#[async_trait]
impl SubscriptionRepository for InMemorySubscriptionRepository {
    async fn insert_plan(&self, mut plan: PackagePlan) -> DomainResult<PackagePlan> {
        plan.id = self.plan_counter.fetch_add(1, Ordering::SeqCst) + 1;
        self.plans.insert(plan.id, plan.clone());
        Ok(plan)
    }

    async fn find_plan(&self, id: i32) -> DomainResult<Option<PackagePlan>> {
        Ok(self.plans.get(&id).map(|p| p.clone()))
    }

    async fn list_plans(&self, include_inactive: bool) -> DomainResult<Vec<PackagePlan>> {
        let mut plans: Vec<PackagePlan> = self
            .plans
            .iter()
            .filter(|p| include_inactive || p.is_active)
            .map(|p| p.clone())
            .collect();
        plans.sort_by_key(|p| p.id);
        Ok(plans)
    }

    async fn set_plan_active(&self, id: i32, active: bool) -> DomainResult<bool> {
        match self.plans.get_mut(&id) {
            Some(mut plan) => {
                plan.is_active = active;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn insert(&self, mut subscription: Subscription) -> DomainResult<Subscription> {
        let _lock = self.guard.lock().await;
        if subscription.status == SubscriptionStatus::Active
            && self.rows.iter().any(|s| {
                s.user_id == subscription.user_id && s.status == SubscriptionStatus::Active
            })
        {
            return Err(DomainError::AlreadyHasActiveSubscription(subscription.user_id));
        }
        subscription.id = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        self.rows.insert(subscription.id, subscription.clone());
        Ok(subscription)
    }

    async fn find_by_id(&self, id: i32) -> DomainResult<Option<Subscription>> {
        Ok(self.rows.get(&id).map(|s| s.clone()))
    }

    async fn find_active_for_user(&self, user_id: &str) -> DomainResult<Option<Subscription>> {
        Ok(self
            .rows
            .iter()
            .find(|s| s.user_id == user_id && s.status == SubscriptionStatus::Active)
            .map(|s| s.clone()))
    }

    async fn history(&self, user_id: &str) -> DomainResult<Vec<Subscription>> {
        let mut subs: Vec<Subscription> = self
            .rows
            .iter()
            .filter(|s| s.user_id == user_id)
            .map(|s| s.clone())
            .collect();
        subs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(subs)
    }

    async fn consume_one(&self, id: i32, now: DateTime<Utc>) -> DomainResult<ConsumeOutcome> {
        let _lock = self.guard.lock().await;
        let Some(mut sub) = self.rows.get_mut(&id) else {
            return Ok(ConsumeOutcome::NotFound);
        };
        if sub.status != SubscriptionStatus::Active {
            return Ok(ConsumeOutcome::NotActive(sub.status));
        }
        if !sub.has_quota() {
            return Ok(ConsumeOutcome::Exhausted);
        }
        sub.used_swaps += 1;
        sub.updated_at = now;
        Ok(ConsumeOutcome::Consumed)
    }

    async fn update_status_if(
        &self,
        id: i32,
        expected: SubscriptionStatus,
        to: SubscriptionStatus,
        now: DateTime<Utc>,
    ) -> DomainResult<bool> {
        let _lock = self.guard.lock().await;
        match self.rows.get_mut(&id) {
            Some(mut sub) if sub.status == expected => {
                sub.status = to;
                sub.updated_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn find_due_for_expiry(
        &self,
        now: DateTime<Utc>,
        limit: u64,
    ) -> DomainResult<Vec<Subscription>> {
        let mut due: Vec<Subscription> = self
            .rows
            .iter()
            .filter(|s| s.is_due_for_expiry(now))
            .map(|s| s.clone())
            .collect();
        due.sort_by_key(|s| (s.end_date, s.id));
        due.truncate(limit as usize);
        Ok(due)
    }

    async fn list_active(&self, after_id: i32, limit: u64) -> DomainResult<Vec<Subscription>> {
        let mut active: Vec<Subscription> = self
            .rows
            .iter()
            .filter(|s| s.status == SubscriptionStatus::Active && s.id > after_id)
            .map(|s| s.clone())
            .collect();
        active.sort_by_key(|s| s.id);
        active.truncate(limit as usize);
        Ok(active)
    }
}

// ── Provider ───────────────────────────────────────────────────

/// All in-memory repositories behind a single `RepositoryProvider`
#[derive(Default)]
pub struct InMemoryRepositoryProvider {
    bookings: InMemoryBookingRepository,
    swap_transactions: InMemorySwapTransactionRepository,
    subscriptions: InMemorySubscriptionRepository,
}

impl InMemoryRepositoryProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RepositoryProvider for InMemoryRepositoryProvider {
    fn bookings(&self) -> &dyn BookingRepository {
        &self.bookings
    }

    fn swap_transactions(&self) -> &dyn SwapTransactionRepository {
        &self.swap_transactions
    }

    fn subscriptions(&self) -> &dyn SubscriptionRepository {
        &self.subscriptions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::booking::{NewBooking, PaymentType};

    fn new_booking(driver: &str) -> Booking {
        Booking::new(
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
        )
    }

    #[tokio::test]
    async fn transition_from_stale_copy_keeps_payment() {
        let repo = InMemoryBookingRepository::default();
        let stored = repo.insert(new_booking("driver-1")).await.unwrap();
        let mut stale = repo.find_by_id(stored.id).await.unwrap().unwrap();

        assert!(repo.mark_paid(stored.id, Utc::now()).await.unwrap());
        stale.confirm(Utc::now()).unwrap();
        assert!(repo.update_if_status(&stale, BookingStatus::Pending).await.unwrap());

        let current = repo.find_by_id(stored.id).await.unwrap().unwrap();
        assert_eq!(current.status, BookingStatus::Confirm);
        assert!(current.is_paid);
    }

    #[tokio::test]
    async fn second_pending_booking_is_rejected() {
        let repo = InMemoryBookingRepository::default();
        repo.insert(new_booking("driver-1")).await.unwrap();
        let err = repo.insert(new_booking("driver-1")).await.unwrap_err();
        assert_eq!(err, DomainError::DriverHasPendingBooking("driver-1".into()));
    }
}
