//! Reconciliation jobs
//!
//! Periodic sweeps over the three ledgers. Each job reads a bounded batch
//! and performs independent single-entity updates, so it is safe to re-run
//! and a crash part-way is healed by the next run. Jobs never delete or
//! force-complete anything; stuck swaps are only reported.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{info, warn};

use super::{BookingService, SubscriptionService, SwapTransactionService};
use crate::application::events::OutboundDispatcher;
use crate::config::ReconciliationConfig;
use crate::domain::booking::Booking;
use crate::domain::events::Committed;
use crate::domain::swap_transaction::SwapTransaction;
use crate::domain::{DomainResult, RepositoryProvider};
use crate::shared::shutdown::ShutdownSignal;

#[derive(Debug, Clone)]
pub struct StuckTransactionReport {
    pub threshold_minutes: i64,
    pub transactions: Vec<SwapTransaction>,
}

#[derive(Debug, Clone)]
pub struct OverdueBookingReport {
    pub overdue: Vec<Booking>,
    /// Ids cancelled by this run (only with auto-cancel enabled)
    pub auto_cancelled: Vec<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsedSwapMismatch {
    pub subscription_id: i32,
    pub user_id: String,
    pub recorded_used_swaps: i32,
    pub successful_transactions: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsedSwapReport {
    pub checked: u64,
    pub mismatches: Vec<UsedSwapMismatch>,
}

pub struct ReconciliationJobs {
    repos: Arc<dyn RepositoryProvider>,
    bookings: Arc<BookingService>,
    transactions: Arc<SwapTransactionService>,
    subscriptions: Arc<SubscriptionService>,
    config: ReconciliationConfig,
}

impl ReconciliationJobs {
    pub fn new(
        repos: Arc<dyn RepositoryProvider>,
        bookings: Arc<BookingService>,
        transactions: Arc<SwapTransactionService>,
        subscriptions: Arc<SubscriptionService>,
        config: ReconciliationConfig,
    ) -> Self {
        Self {
            repos,
            bookings,
            transactions,
            subscriptions,
            config,
        }
    }

    pub fn config(&self) -> &ReconciliationConfig {
        &self.config
    }

    pub async fn expire_subscriptions(&self, now: DateTime<Utc>) -> DomainResult<Committed<u64>> {
        self.subscriptions.expire_due(now, self.config.batch_size).await
    }

    pub async fn stuck_transactions(&self, now: DateTime<Utc>) -> DomainResult<StuckTransactionReport> {
        let threshold = Duration::minutes(self.config.stuck_threshold_minutes);
        let transactions = self
            .transactions
            .find_stuck(now, threshold, self.config.batch_size)
            .await?;

        metrics::gauge!("stuck_transactions").set(transactions.len() as f64);
        for tx in &transactions {
            warn!(
                transaction_id = tx.id,
                booking_id = tx.booking_id,
                station_id = %tx.station_id,
                created_at = %tx.created_at,
                "⚠️ Swap transaction stuck in PENDING, needs operator review"
            );
        }

        Ok(StuckTransactionReport {
            threshold_minutes: self.config.stuck_threshold_minutes,
            transactions,
        })
    }

    /// Report overdue bookings; optionally cancel those past the grace period.
    pub async fn overdue_bookings(
        &self,
        now: DateTime<Utc>,
    ) -> DomainResult<Committed<OverdueBookingReport>> {
        let overdue = self.bookings.overdue(now, self.config.batch_size).await?;
        let mut committed = Committed::new(OverdueBookingReport {
            overdue: Vec::new(),
            auto_cancelled: Vec::new(),
        });

        if !overdue.is_empty() {
            info!(count = overdue.len(), "Overdue bookings found");
        }

        if self.config.auto_cancel_overdue {
            let cutoff = now - Duration::minutes(self.config.overdue_grace_minutes);
            for booking in overdue.iter().filter(|b| b.scheduled_time < cutoff) {
                match self
                    .bookings
                    .cancel_loaded(booking.clone(), "overdue: slot missed", now)
                    .await
                {
                    Ok(cancelled) => {
                        let (cancelled, events) = cancelled.into_parts();
                        committed.value.auto_cancelled.push(cancelled.id);
                        committed.events.extend(events);
                    }
                    Err(e) => {
                        warn!(booking_id = booking.id, error = %e, "Failed to auto-cancel overdue booking");
                    }
                }
            }
        }

        committed.value.overdue = overdue;
        Ok(committed)
    }

    /// Compare each ACTIVE subscription's counter with its successful swaps.
    pub async fn used_swap_accounting(&self) -> DomainResult<UsedSwapReport> {
        let batch_size = self.config.batch_size.max(1);
        let mut report = UsedSwapReport::default();
        let mut after_id = 0;

        loop {
            let batch = self
                .repos
                .subscriptions()
                .list_active(after_id, batch_size)
                .await?;
            let fetched = batch.len() as u64;

            for sub in batch {
                after_id = sub.id;
                report.checked += 1;
                let successful = self
                    .repos
                    .swap_transactions()
                    .count_successful_for_subscription(sub.id)
                    .await?;
                if successful != sub.used_swaps as u64 {
                    warn!(
                        subscription_id = sub.id,
                        user_id = %sub.user_id,
                        used_swaps = sub.used_swaps,
                        successful,
                        "Used-swap counter disagrees with successful swaps"
                    );
                    report.mismatches.push(UsedSwapMismatch {
                        subscription_id: sub.id,
                        user_id: sub.user_id,
                        recorded_used_swaps: sub.used_swaps,
                        successful_transactions: successful,
                    });
                }
            }

            if fetched < batch_size {
                break;
            }
        }

        Ok(report)
    }
}

/// Spawn the periodic sweeps. Intervals of 0 disable a sweep.
pub fn start_reconciliation_tasks(
    jobs: Arc<ReconciliationJobs>,
    outbound: OutboundDispatcher,
    shutdown: ShutdownSignal,
) {
    let cfg = jobs.config().clone();

    spawn_periodic("subscription_expiry", cfg.expiry_interval_secs, shutdown.clone(), {
        let jobs = jobs.clone();
        let outbound = outbound.clone();
        move || {
            let jobs = jobs.clone();
            let outbound = outbound.clone();
            async move {
                match jobs.expire_subscriptions(Utc::now()).await {
                    Ok(committed) => {
                        outbound.emit(committed);
                    }
                    Err(e) => warn!(error = %e, "Subscription expiry sweep error"),
                }
            }
        }
    });

    spawn_periodic("stuck_transactions", cfg.stuck_check_interval_secs, shutdown.clone(), {
        let jobs = jobs.clone();
        move || {
            let jobs = jobs.clone();
            async move {
                if let Err(e) = jobs.stuck_transactions(Utc::now()).await {
                    warn!(error = %e, "Stuck transaction check error");
                }
            }
        }
    });

    spawn_periodic("overdue_bookings", cfg.overdue_check_interval_secs, shutdown, {
        move || {
            let jobs = jobs.clone();
            let outbound = outbound.clone();
            async move {
                match jobs.overdue_bookings(Utc::now()).await {
                    Ok(committed) => {
                        outbound.emit(committed);
                    }
                    Err(e) => warn!(error = %e, "Overdue booking sweep error"),
                }
            }
        }
    });
}

fn spawn_periodic<F, Fut>(name: &'static str, interval_secs: u64, shutdown: ShutdownSignal, mut run: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    if interval_secs == 0 {
        info!(job = name, "🧹 Reconciliation job runs on demand only");
        return;
    }

    tokio::spawn(async move {
        info!(job = name, interval_secs, "🧹 Reconciliation job started");

        let period = std::time::Duration::from_secs(interval_secs);
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => run().await,
                _ = shutdown.notified().wait() => {
                    info!(job = name, "🧹 Reconciliation job shutting down");
                    break;
                }
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::booking::{BookingStatus, NewBooking, PaymentType};
    use crate::domain::subscription::{NewPackagePlan, PlanType, SubscriptionStatus};
    use crate::domain::swap_transaction::NewSwapTransaction;
    use crate::infrastructure::storage::InMemoryRepositoryProvider;

    struct Fixture {
        repos: Arc<dyn RepositoryProvider>,
        bookings: Arc<BookingService>,
        transactions: Arc<SwapTransactionService>,
        subscriptions: Arc<SubscriptionService>,
    }

    impl Fixture {
        fn new() -> Self {
            let repos: Arc<dyn RepositoryProvider> = Arc::new(InMemoryRepositoryProvider::new());
            let subscriptions = Arc::new(SubscriptionService::new(repos.clone()));
            Self {
                bookings: Arc::new(BookingService::new(repos.clone(), subscriptions.clone())),
                transactions: Arc::new(SwapTransactionService::new(
                    repos.clone(),
                    subscriptions.clone(),
                )),
                subscriptions,
                repos,
            }
        }

        fn jobs(&self, config: ReconciliationConfig) -> ReconciliationJobs {
            ReconciliationJobs::new(
                self.repos.clone(),
                self.bookings.clone(),
                self.transactions.clone(),
                self.subscriptions.clone(),
                config,
            )
        }
    }

    fn booking(driver: &str, scheduled: DateTime<Utc>) -> NewBooking {
        NewBooking {
            driver_id: driver.into(),
            station_id: "station-1".into(),
            battery_model_id: "BM-48V".into(),
            scheduled_time: scheduled,
            payment_type: PaymentType::PerSwap,
            package_id: None,
            notes: None,
        }
    }

    #[tokio::test]
    async fn overdue_sweep_reports_without_cancelling_by_default() {
        let f = Fixture::new();
        let now = Utc::now();
        let b = f
            .bookings
            .create(booking("driver-1", now - Duration::hours(2)))
            .await
            .unwrap()
            .value;

        let report = f.jobs(ReconciliationConfig::default()).overdue_bookings(now).await.unwrap();
        assert_eq!(report.value.overdue.len(), 1);
        assert!(report.value.auto_cancelled.is_empty());
        assert!(report.events.is_empty());
        assert_eq!(f.bookings.get(b.id).await.unwrap().status, BookingStatus::Pending);
    }

    #[tokio::test]
    async fn overdue_sweep_cancels_after_grace_when_enabled() {
        let f = Fixture::new();
        let now = Utc::now();
        let old = f
            .bookings
            .create(booking("driver-1", now - Duration::hours(2)))
            .await
            .unwrap()
            .value;
        let recent = f
            .bookings
            .create(booking("driver-2", now - Duration::minutes(5)))
            .await
            .unwrap()
            .value;

        let config = ReconciliationConfig {
            auto_cancel_overdue: true,
            overdue_grace_minutes: 30,
            ..Default::default()
        };
        let report = f.jobs(config).overdue_bookings(now).await.unwrap();
        assert_eq!(report.value.auto_cancelled, vec![old.id]);
        assert_eq!(report.events.len(), 1);
        assert_eq!(f.bookings.get(old.id).await.unwrap().status, BookingStatus::Cancel);
        assert_eq!(f.bookings.get(recent.id).await.unwrap().status, BookingStatus::Pending);
    }

    #[tokio::test]
    async fn stuck_report_never_changes_state() {
        let f = Fixture::new();
        let b = f
            .bookings
            .create(booking("driver-1", Utc::now()))
            .await
            .unwrap()
            .value;
        f.bookings.confirm(b.id).await.unwrap();
        let tx = f
            .transactions
            .create(NewSwapTransaction {
                booking_id: b.id,
                station_id: "station-1".into(),
                driver_id: "driver-1".into(),
                old_battery_id: "A".into(),
                new_battery_id: "B".into(),
                amount: 100,
                payment_method: "CASH".into(),
            })
            .await
            .unwrap()
            .value;

        let jobs = f.jobs(ReconciliationConfig::default());
        let report = jobs.stuck_transactions(tx.created_at + Duration::hours(3)).await.unwrap();
        assert_eq!(report.transactions.len(), 1);
        assert_eq!(report.threshold_minutes, 120);
        assert_eq!(
            f.transactions.get(tx.id).await.unwrap().status,
            crate::domain::SwapTransactionStatus::Pending
        );
    }

    #[tokio::test]
    async fn expiry_job_is_idempotent() {
        let f = Fixture::new();
        let plan = f
            .subscriptions
            .create_plan(NewPackagePlan {
                name: "Monthly".into(),
                description: None,
                max_swap_per_month: 4,
                price: 1,
                plan_type: PlanType::Monthly,
            })
            .await
            .unwrap();
        let sub = f.subscriptions.subscribe("user-1", plan.id).await.unwrap().value;
        let jobs = f.jobs(ReconciliationConfig::default());
        let now = sub.end_date + Duration::seconds(1);

        assert_eq!(jobs.expire_subscriptions(now).await.unwrap().value, 1);
        assert_eq!(jobs.expire_subscriptions(now).await.unwrap().value, 0);
        assert_eq!(
            f.subscriptions.get(sub.id).await.unwrap().status,
            SubscriptionStatus::Expired
        );
    }

    #[tokio::test]
    async fn used_swap_accounting_flags_drift() {
        let f = Fixture::new();
        let plan = f
            .subscriptions
            .create_plan(NewPackagePlan {
                name: "Monthly".into(),
                description: None,
                max_swap_per_month: 4,
                price: 1,
                plan_type: PlanType::Monthly,
            })
            .await
            .unwrap();
        let clean = f.subscriptions.subscribe("user-1", plan.id).await.unwrap().value;
        let drifted = f.subscriptions.subscribe("user-2", plan.id).await.unwrap().value;
        // A consume with no matching swap transaction.
        f.subscriptions.consume(drifted.id).await.unwrap();

        let config = ReconciliationConfig {
            batch_size: 1,
            ..Default::default()
        };
        let report = f.jobs(config).used_swap_accounting().await.unwrap();
        assert_eq!(report.checked, 2);
        assert_eq!(report.mismatches.len(), 1);
        assert_eq!(report.mismatches[0].subscription_id, drifted.id);
        assert_ne!(report.mismatches[0].subscription_id, clean.id);
        assert_eq!(report.mismatches[0].recorded_used_swaps, 1);
        assert_eq!(report.mismatches[0].successful_transactions, 0);
    }
}
