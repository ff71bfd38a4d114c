//! Swap transaction ledger
//!
//! Records physical battery exchanges against confirmed bookings and draws
//! package quota when a swap succeeds.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use super::subscription::SubscriptionService;
use crate::domain::booking::BookingStatus;
use crate::domain::events::{Committed, Event, QuotaBreachEvent, TransactionEvent};
use crate::domain::swap_transaction::{
    AmountScope, NewSwapTransaction, SwapTransaction, SwapTransactionStatus,
};
use crate::domain::{DomainError, DomainResult, RepositoryProvider};

/// Result of moving a transaction to SUCCESS.
///
/// The swap stays SUCCESS even when the subscription could not be charged;
/// that failure is carried here for the caller to report.
#[derive(Debug, Clone)]
pub struct ProcessedTransaction {
    pub transaction: SwapTransaction,
    pub quota_breach: Option<DomainError>,
}

pub struct SwapTransactionService {
    repos: Arc<dyn RepositoryProvider>,
    subscriptions: Arc<SubscriptionService>,
}

impl SwapTransactionService {
    pub fn new(repos: Arc<dyn RepositoryProvider>, subscriptions: Arc<SubscriptionService>) -> Self {
        Self {
            repos,
            subscriptions,
        }
    }

    pub async fn create(&self, input: NewSwapTransaction) -> DomainResult<Committed<SwapTransaction>> {
        input.validate()?;

        let booking = self
            .repos
            .bookings()
            .find_by_id(input.booking_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Booking", input.booking_id))?;

        if !matches!(booking.status, BookingStatus::Confirm | BookingStatus::Success) {
            return Err(DomainError::InvalidStateTransition {
                entity: "Booking",
                from: booking.status.as_str().to_string(),
                to: "SWAPPED".to_string(),
            });
        }
        if booking.station_id != input.station_id {
            return Err(DomainError::Validation(format!(
                "station_id does not match booking {}",
                booking.id
            )));
        }
        if booking.driver_id != input.driver_id {
            return Err(DomainError::Validation(format!(
                "driver_id does not match booking {}",
                booking.id
            )));
        }

        if self
            .repos
            .swap_transactions()
            .find_by_booking(booking.id)
            .await?
            .is_some()
        {
            return Err(DomainError::DuplicateTransaction(booking.id));
        }

        let subscription_id = if booking.uses_package() {
            booking.package_id
        } else {
            None
        };
        let tx = self
            .repos
            .swap_transactions()
            .insert(SwapTransaction::new(input, subscription_id, Utc::now()))
            .await?;

        metrics::counter!("swap_transactions_total", "status" => tx.status.as_str()).increment(1);
        info!(
            transaction_id = tx.id,
            booking_id = tx.booking_id,
            old_battery = %tx.old_battery_id,
            new_battery = %tx.new_battery_id,
            amount = tx.amount,
            "🔋 Swap transaction recorded"
        );

        let event = Event::TransactionCreated(TransactionEvent::from_transaction(&tx));
        Ok(Committed::new(tx).with_event(event))
    }

    pub async fn get(&self, id: i32) -> DomainResult<SwapTransaction> {
        self.repos
            .swap_transactions()
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found("SwapTransaction", id))
    }

    pub async fn find_by_booking(&self, booking_id: i32) -> DomainResult<SwapTransaction> {
        self.repos
            .swap_transactions()
            .find_by_booking(booking_id)
            .await?
            .ok_or_else(|| DomainError::NotFound {
                entity: "SwapTransaction",
                field: "booking_id",
                value: booking_id.to_string(),
            })
    }

    /// PENDING → SUCCESS, then consume one unit of the booking's package.
    pub async fn process(&self, id: i32) -> DomainResult<Committed<ProcessedTransaction>> {
        let mut tx = self.get(id).await?;
        tx.succeed(Utc::now())?;
        self.persist_transition(&tx, SwapTransactionStatus::Pending).await?;

        metrics::counter!("swap_transactions_total", "status" => tx.status.as_str()).increment(1);
        info!(transaction_id = id, booking_id = tx.booking_id, "✅ Swap transaction succeeded");

        let mut committed = Committed::new(ProcessedTransaction {
            transaction: tx.clone(),
            quota_breach: None,
        })
        .with_event(Event::TransactionSucceeded(TransactionEvent::from_transaction(&tx)));

        if let Some(subscription_id) = tx.subscription_id {
            if let Err(e) = self.subscriptions.consume(subscription_id).await {
                warn!(
                    transaction_id = id,
                    subscription_id,
                    error = %e,
                    "⚠️ Swap succeeded but subscription quota could not be consumed"
                );
                metrics::counter!("quota_breaches_total").increment(1);
                committed.events.push(Event::QuotaBreachReported(QuotaBreachEvent {
                    transaction_id: id,
                    subscription_id,
                    driver_id: tx.driver_id.clone(),
                    reason: e.kind().to_string(),
                    timestamp: Utc::now(),
                }));
                committed.value.quota_breach = Some(e);
            }
        }

        Ok(committed)
    }

    /// Like `process`, but a transaction that is (or just became) SUCCESS
    /// reports `AlreadyCompleted`.
    pub async fn complete(&self, id: i32) -> DomainResult<Committed<ProcessedTransaction>> {
        let tx = self.get(id).await?;
        if tx.status == SwapTransactionStatus::Success {
            return Err(DomainError::AlreadyCompleted(id));
        }
        self.process(id).await.map_err(|e| match e {
            DomainError::InvalidStateTransition { ref from, .. }
                if from == SwapTransactionStatus::Success.as_str() =>
            {
                DomainError::AlreadyCompleted(id)
            }
            other => other,
        })
    }

    pub async fn fail(&self, id: i32) -> DomainResult<Committed<SwapTransaction>> {
        let mut tx = self.get(id).await?;
        tx.fail(Utc::now())?;
        self.persist_transition(&tx, SwapTransactionStatus::Pending).await?;

        metrics::counter!("swap_transactions_total", "status" => tx.status.as_str()).increment(1);
        info!(transaction_id = id, booking_id = tx.booking_id, "❌ Swap transaction failed");
        let event = Event::TransactionFailed(TransactionEvent::from_transaction(&tx));
        Ok(Committed::new(tx).with_event(event))
    }

    pub async fn adjust_amount(&self, id: i32, amount: i64) -> DomainResult<SwapTransaction> {
        let mut tx = self.get(id).await?;
        let previous = tx.amount;
        tx.adjust_amount(amount, Utc::now())?;
        // Guarded on PENDING so a concurrent success freezes the amount.
        self.persist_transition(&tx, SwapTransactionStatus::Pending).await?;
        info!(transaction_id = id, previous, amount, "Swap amount adjusted");
        Ok(tx)
    }

    pub async fn total_amount(&self, scope: &AmountScope) -> DomainResult<i64> {
        self.repos.swap_transactions().sum_successful(scope).await
    }

    pub async fn battery_history(&self, battery_id: &str) -> DomainResult<Vec<SwapTransaction>> {
        self.repos.swap_transactions().battery_history(battery_id).await
    }

    /// PENDING transactions older than `threshold` at `now`. Read-only.
    pub async fn find_stuck(
        &self,
        now: DateTime<Utc>,
        threshold: Duration,
        limit: u64,
    ) -> DomainResult<Vec<SwapTransaction>> {
        self.repos
            .swap_transactions()
            .find_pending_before(now - threshold, limit)
            .await
    }

    async fn persist_transition(
        &self,
        tx: &SwapTransaction,
        expected: SwapTransactionStatus,
    ) -> DomainResult<()> {
        if self
            .repos
            .swap_transactions()
            .update_if_status(tx, expected)
            .await?
        {
            return Ok(());
        }
        Err(match self.repos.swap_transactions().find_by_id(tx.id).await? {
            Some(current) => DomainError::InvalidStateTransition {
                entity: "SwapTransaction",
                from: current.status.as_str().to_string(),
                to: tx.status.as_str().to_string(),
            },
            None => DomainError::not_found("SwapTransaction", tx.id),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::BookingService;
    use crate::domain::booking::{NewBooking, PaymentType};
    use crate::domain::subscription::{NewPackagePlan, PlanType};
    use crate::infrastructure::storage::InMemoryRepositoryProvider;

    struct Fixture {
        bookings: Arc<BookingService>,
        transactions: Arc<SwapTransactionService>,
        subscriptions: Arc<SubscriptionService>,
    }

    fn fixture() -> Fixture {
        let repos: Arc<dyn RepositoryProvider> = Arc::new(InMemoryRepositoryProvider::new());
        let subscriptions = Arc::new(SubscriptionService::new(repos.clone()));
        Fixture {
            bookings: Arc::new(BookingService::new(repos.clone(), subscriptions.clone())),
            transactions: Arc::new(SwapTransactionService::new(repos, subscriptions.clone())),
            subscriptions,
        }
    }

    async fn confirmed_booking(f: &Fixture, driver: &str, package_id: Option<i32>) -> i32 {
        let input = NewBooking {
            driver_id: driver.into(),
            station_id: "station-1".into(),
            battery_model_id: "BM-48V".into(),
            scheduled_time: Utc::now() + Duration::hours(1),
            payment_type: if package_id.is_some() {
                PaymentType::Package
            } else {
                PaymentType::PerSwap
            },
            package_id,
            notes: None,
        };
        let booking = f.bookings.create(input).await.unwrap().value;
        f.bookings.confirm(booking.id).await.unwrap();
        booking.id
    }

    fn swap(booking_id: i32, driver: &str, amount: i64) -> NewSwapTransaction {
        NewSwapTransaction {
            booking_id,
            station_id: "station-1".into(),
            driver_id: driver.into(),
            old_battery_id: format!("BAT-OLD-{booking_id}"),
            new_battery_id: format!("BAT-NEW-{booking_id}"),
            amount,
            payment_method: "CARD".into(),
        }
    }

    #[tokio::test]
    async fn pending_booking_cannot_record_swap() {
        let f = fixture();
        let booking = f
            .bookings
            .create(NewBooking {
                driver_id: "driver-1".into(),
                station_id: "station-1".into(),
                battery_model_id: "BM-48V".into(),
                scheduled_time: Utc::now(),
                payment_type: PaymentType::PerSwap,
                package_id: None,
                notes: None,
            })
            .await
            .unwrap()
            .value;
        let err = f.transactions.create(swap(booking.id, "driver-1", 100)).await.unwrap_err();
        assert!(matches!(err, DomainError::InvalidStateTransition { entity: "Booking", .. }));
    }

    #[tokio::test]
    async fn one_transaction_per_booking() {
        let f = fixture();
        let booking_id = confirmed_booking(&f, "driver-1", None).await;
        f.transactions.create(swap(booking_id, "driver-1", 100)).await.unwrap();
        let err = f.transactions.create(swap(booking_id, "driver-1", 100)).await.unwrap_err();
        assert_eq!(err, DomainError::DuplicateTransaction(booking_id));
    }

    #[tokio::test]
    async fn mismatched_driver_is_rejected() {
        let f = fixture();
        let booking_id = confirmed_booking(&f, "driver-1", None).await;
        let err = f.transactions.create(swap(booking_id, "driver-9", 100)).await.unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[tokio::test]
    async fn complete_after_process_reports_already_completed() {
        let f = fixture();
        let booking_id = confirmed_booking(&f, "driver-1", None).await;
        let tx = f.transactions.create(swap(booking_id, "driver-1", 100)).await.unwrap().value;

        let done = f.transactions.process(tx.id).await.unwrap();
        assert_eq!(done.value.transaction.status, SwapTransactionStatus::Success);
        assert!(done.value.quota_breach.is_none());

        assert_eq!(
            f.transactions.complete(tx.id).await.unwrap_err(),
            DomainError::AlreadyCompleted(tx.id)
        );
        assert!(matches!(
            f.transactions.process(tx.id).await.unwrap_err(),
            DomainError::InvalidStateTransition { .. }
        ));
        assert!(f.transactions.fail(tx.id).await.is_err());
        assert!(f.transactions.adjust_amount(tx.id, 5).await.is_err());
    }

    #[tokio::test]
    async fn failed_transaction_is_terminal() {
        let f = fixture();
        let booking_id = confirmed_booking(&f, "driver-1", None).await;
        let tx = f.transactions.create(swap(booking_id, "driver-1", 100)).await.unwrap().value;
        f.transactions.fail(tx.id).await.unwrap();

        assert!(matches!(
            f.transactions.complete(tx.id).await.unwrap_err(),
            DomainError::InvalidStateTransition { .. }
        ));
    }

    #[tokio::test]
    async fn package_swap_consumes_quota_and_reports_breach() {
        let f = fixture();
        let plan = f
            .subscriptions
            .create_plan(NewPackagePlan {
                name: "Single".into(),
                description: None,
                max_swap_per_month: 1,
                price: 10_000,
                plan_type: PlanType::Monthly,
            })
            .await
            .unwrap();
        let sub = f.subscriptions.subscribe("driver-1", plan.id).await.unwrap().value;

        let booking_id = confirmed_booking(&f, "driver-1", Some(sub.id)).await;
        let tx = f.transactions.create(swap(booking_id, "driver-1", 1)).await.unwrap().value;
        assert_eq!(tx.subscription_id, Some(sub.id));

        // Quota is drained elsewhere before the swap is verified.
        f.subscriptions.consume(sub.id).await.unwrap();

        let done = f.transactions.process(tx.id).await.unwrap();
        assert_eq!(done.value.transaction.status, SwapTransactionStatus::Success);
        assert_eq!(done.value.quota_breach, Some(DomainError::QuotaExhausted(sub.id)));
        assert!(done
            .events
            .iter()
            .any(|e| e.event_type() == "quota_breach_reported"));
        assert_eq!(f.subscriptions.get(sub.id).await.unwrap().used_swaps, 1);
    }

    #[tokio::test]
    async fn totals_and_history_count_only_what_they_should() {
        let f = fixture();
        let b1 = confirmed_booking(&f, "driver-1", None).await;
        let t1 = f.transactions.create(swap(b1, "driver-1", 300)).await.unwrap().value;
        f.transactions.process(t1.id).await.unwrap();

        let b2 = confirmed_booking(&f, "driver-2", None).await;
        let t2 = f.transactions.create(swap(b2, "driver-2", 500)).await.unwrap().value;
        f.transactions.adjust_amount(t2.id, 450).await.unwrap();

        let driver_total = f
            .transactions
            .total_amount(&AmountScope::Driver("driver-1".into()))
            .await
            .unwrap();
        assert_eq!(driver_total, 300);
        let station_total = f
            .transactions
            .total_amount(&AmountScope::Station("station-1".into()))
            .await
            .unwrap();
        assert_eq!(station_total, 300, "pending swaps are not billed");

        let history = f.transactions.battery_history(&format!("BAT-NEW-{b2}")).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].amount, 450);
    }

    #[tokio::test]
    async fn stuck_report_respects_threshold() {
        let f = fixture();
        let booking_id = confirmed_booking(&f, "driver-1", None).await;
        let tx = f.transactions.create(swap(booking_id, "driver-1", 100)).await.unwrap().value;
        let t0 = tx.created_at;

        let late = f
            .transactions
            .find_stuck(t0 + Duration::hours(3), Duration::hours(2), 100)
            .await
            .unwrap();
        assert_eq!(late.len(), 1);

        let early = f
            .transactions
            .find_stuck(t0 + Duration::hours(1), Duration::hours(2), 100)
            .await
            .unwrap();
        assert!(early.is_empty());
    }

    /// Commits a competing SUCCESS just before the next SUCCESS write.
    #[derive(Default)]
    struct RacingTransactions {
        inner: crate::infrastructure::storage::InMemorySwapTransactionRepository,
        armed: std::sync::atomic::AtomicBool,
    }

    #[async_trait::async_trait]
    impl crate::domain::swap_transaction::SwapTransactionRepository for RacingTransactions {
        async fn insert(&self, tx: SwapTransaction) -> DomainResult<SwapTransaction> {
            self.inner.insert(tx).await
        }

        async fn find_by_id(&self, id: i32) -> DomainResult<Option<SwapTransaction>> {
            self.inner.find_by_id(id).await
        }

        async fn find_by_booking(&self, booking_id: i32) -> DomainResult<Option<SwapTransaction>> {
            self.inner.find_by_booking(booking_id).await
        }

        async fn update_if_status(
            &self,
            tx: &SwapTransaction,
            expected: SwapTransactionStatus,
        ) -> DomainResult<bool> {
            use std::sync::atomic::Ordering;
            if tx.status == SwapTransactionStatus::Success && self.armed.swap(false, Ordering::SeqCst) {
                self.inner.update_if_status(tx, expected).await?;
            }
            self.inner.update_if_status(tx, expected).await
        }

        async fn sum_successful(&self, scope: &AmountScope) -> DomainResult<i64> {
            self.inner.sum_successful(scope).await
        }

        async fn battery_history(&self, battery_id: &str) -> DomainResult<Vec<SwapTransaction>> {
            self.inner.battery_history(battery_id).await
        }

        async fn find_pending_before(
            &self,
            cutoff: DateTime<Utc>,
            limit: u64,
        ) -> DomainResult<Vec<SwapTransaction>> {
            self.inner.find_pending_before(cutoff, limit).await
        }

        async fn count_successful_for_subscription(&self, subscription_id: i32) -> DomainResult<u64> {
            self.inner.count_successful_for_subscription(subscription_id).await
        }
    }

    #[derive(Default)]
    struct RacingProvider {
        bookings: crate::infrastructure::storage::InMemoryBookingRepository,
        transactions: RacingTransactions,
        subscriptions: crate::infrastructure::storage::InMemorySubscriptionRepository,
    }

    impl RepositoryProvider for RacingProvider {
        fn bookings(&self) -> &dyn crate::domain::booking::BookingRepository {
            &self.bookings
        }

        fn swap_transactions(&self) -> &dyn crate::domain::swap_transaction::SwapTransactionRepository {
            &self.transactions
        }

        fn subscriptions(&self) -> &dyn crate::domain::subscription::SubscriptionRepository {
            &self.subscriptions
        }
    }

    #[tokio::test]
    async fn lost_success_race_is_reported_per_operation() {
        use std::sync::atomic::Ordering;

        let provider = Arc::new(RacingProvider::default());
        let repos: Arc<dyn RepositoryProvider> = provider.clone();
        let subscriptions = Arc::new(SubscriptionService::new(repos.clone()));
        let f = Fixture {
            bookings: Arc::new(BookingService::new(repos.clone(), subscriptions.clone())),
            transactions: Arc::new(SwapTransactionService::new(repos, subscriptions.clone())),
            subscriptions,
        };

        let first = confirmed_booking(&f, "driver-1", None).await;
        let tx = f.transactions.create(swap(first, "driver-1", 100)).await.unwrap().value;
        provider.transactions.armed.store(true, Ordering::SeqCst);
        let err = f.transactions.process(tx.id).await.unwrap_err();
        assert_eq!(
            err,
            DomainError::InvalidStateTransition {
                entity: "SwapTransaction",
                from: "SUCCESS".into(),
                to: "SUCCESS".into(),
            }
        );

        let second = confirmed_booking(&f, "driver-2", None).await;
        let tx = f.transactions.create(swap(second, "driver-2", 100)).await.unwrap().value;
        provider.transactions.armed.store(true, Ordering::SeqCst);
        let err = f.transactions.complete(tx.id).await.unwrap_err();
        assert_eq!(err, DomainError::AlreadyCompleted(tx.id));
    }
}
