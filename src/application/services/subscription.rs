//! Subscription ledger
//!
//! Owns package plans, subscription quota and expiry. The one-ACTIVE-per-user
//! rule is enforced here and backed by the store's unique index.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::domain::events::{Committed, Event, SubscriptionEvent};
use crate::domain::subscription::{
    ConsumeOutcome, NewPackagePlan, PackagePlan, Subscription, SubscriptionStats,
    SubscriptionStatus,
};
use crate::domain::{DomainError, DomainResult, RepositoryProvider};

pub struct SubscriptionService {
    repos: Arc<dyn RepositoryProvider>,
}

impl SubscriptionService {
    pub fn new(repos: Arc<dyn RepositoryProvider>) -> Self {
        Self { repos }
    }

    // ── Plan catalog ───────────────────────────────────────

    pub async fn create_plan(&self, input: NewPackagePlan) -> DomainResult<PackagePlan> {
        input.validate()?;
        let plan = self
            .repos
            .subscriptions()
            .insert_plan(PackagePlan::new(input, Utc::now()))
            .await?;
        info!(plan_id = plan.id, name = %plan.name, "📦 Package plan created");
        Ok(plan)
    }

    pub async fn list_plans(&self, include_inactive: bool) -> DomainResult<Vec<PackagePlan>> {
        self.repos.subscriptions().list_plans(include_inactive).await
    }

    /// Existing subscriptions keep running; only new subscribes are refused.
    pub async fn deactivate_plan(&self, plan_id: i32) -> DomainResult<PackagePlan> {
        if !self.repos.subscriptions().set_plan_active(plan_id, false).await? {
            return Err(DomainError::not_found("PackagePlan", plan_id));
        }
        info!(plan_id, "Package plan deactivated");
        self.repos
            .subscriptions()
            .find_plan(plan_id)
            .await?
            .ok_or_else(|| DomainError::not_found("PackagePlan", plan_id))
    }

    // ── Subscriptions ──────────────────────────────────────

    pub async fn subscribe(
        &self,
        user_id: &str,
        plan_id: i32,
    ) -> DomainResult<Committed<Subscription>> {
        if user_id.trim().is_empty() {
            return Err(DomainError::Validation("user_id is required".into()));
        }
        let plan = self
            .repos
            .subscriptions()
            .find_plan(plan_id)
            .await?
            .filter(|p| p.is_active)
            .ok_or_else(|| DomainError::not_found("PackagePlan", plan_id))?;

        if self
            .repos
            .subscriptions()
            .find_active_for_user(user_id)
            .await?
            .is_some()
        {
            return Err(DomainError::AlreadyHasActiveSubscription(user_id.to_string()));
        }

        // The unique index still rejects a concurrent subscribe that
        // slipped past the check above.
        let subscription = self
            .repos
            .subscriptions()
            .insert(Subscription::new(user_id, &plan, Utc::now())?)
            .await?;

        info!(
            subscription_id = subscription.id,
            user_id,
            plan_id,
            end_date = %subscription.end_date,
            "🎫 Subscription created"
        );

        let event = Event::SubscriptionCreated(SubscriptionEvent::from_subscription(&subscription));
        Ok(Committed::new(subscription).with_event(event))
    }

    pub async fn get(&self, id: i32) -> DomainResult<Subscription> {
        self.repos
            .subscriptions()
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Subscription", id))
    }

    pub async fn history(&self, user_id: &str) -> DomainResult<Vec<Subscription>> {
        self.repos.subscriptions().history(user_id).await
    }

    /// Take one swap from the subscription's quota.
    pub async fn consume(&self, subscription_id: i32) -> DomainResult<()> {
        match self
            .repos
            .subscriptions()
            .consume_one(subscription_id, Utc::now())
            .await?
        {
            ConsumeOutcome::Consumed => {
                metrics::counter!("subscription_quota_consumed_total").increment(1);
                Ok(())
            }
            ConsumeOutcome::NotFound => Err(DomainError::not_found("Subscription", subscription_id)),
            ConsumeOutcome::NotActive(status) => Err(DomainError::InvalidStateTransition {
                entity: "Subscription",
                from: status.as_str().to_string(),
                to: "CONSUMED".to_string(),
            }),
            ConsumeOutcome::Exhausted => Err(DomainError::QuotaExhausted(subscription_id)),
        }
    }

    /// Booking-time check that `subscription_id` is the user's live
    /// subscription with quota left. Nothing is reserved.
    pub async fn ensure_quota_available(
        &self,
        user_id: &str,
        subscription_id: i32,
        now: DateTime<Utc>,
    ) -> DomainResult<Subscription> {
        let subscription = self
            .repos
            .subscriptions()
            .find_by_id(subscription_id)
            .await?
            .filter(|s| {
                s.user_id == user_id
                    && s.status == SubscriptionStatus::Active
                    && s.end_date >= now
            })
            .ok_or_else(|| DomainError::NoActiveSubscription(user_id.to_string()))?;

        if !subscription.has_quota() {
            return Err(DomainError::QuotaExhausted(subscription.id));
        }
        Ok(subscription)
    }

    pub async fn cancel(&self, subscription_id: i32) -> DomainResult<Committed<Subscription>> {
        let mut subscription = self.get(subscription_id).await?;
        let expected = subscription.status;
        subscription.cancel(Utc::now())?;

        if !self
            .repos
            .subscriptions()
            .update_status_if(subscription.id, expected, subscription.status, subscription.updated_at)
            .await?
        {
            return Err(self.lost_race(subscription_id, SubscriptionStatus::Inactive).await);
        }

        info!(subscription_id, user_id = %subscription.user_id, "Subscription cancelled");
        let event =
            Event::SubscriptionCancelled(SubscriptionEvent::from_subscription(&subscription));
        Ok(Committed::new(subscription).with_event(event))
    }

    pub async fn stats(&self, user_id: &str) -> DomainResult<SubscriptionStats> {
        self.stats_at(user_id, Utc::now()).await
    }

    pub async fn stats_at(&self, user_id: &str, now: DateTime<Utc>) -> DomainResult<SubscriptionStats> {
        let subscription = self
            .repos
            .subscriptions()
            .find_active_for_user(user_id)
            .await?
            .ok_or_else(|| DomainError::NoActiveSubscription(user_id.to_string()))?;

        let plan_name = match self
            .repos
            .subscriptions()
            .find_plan(subscription.package_plan_id)
            .await?
        {
            Some(plan) => plan.name,
            None => {
                warn!(
                    subscription_id = subscription.id,
                    plan_id = subscription.package_plan_id,
                    "Subscription references a missing plan"
                );
                String::new()
            }
        };

        Ok(SubscriptionStats::from_subscription(&subscription, plan_name, now))
    }

    /// Move every ACTIVE subscription past its end date to EXPIRED.
    ///
    /// Reads in batches of `batch_size` and updates each row on its own, so
    /// a crash part-way leaves the rest for the next run. The returned count
    /// only includes transitions this call actually made.
    pub async fn expire_due(
        &self,
        now: DateTime<Utc>,
        batch_size: u64,
    ) -> DomainResult<Committed<u64>> {
        let batch_size = batch_size.max(1);
        let mut committed = Committed::new(0u64);

        loop {
            let due = self
                .repos
                .subscriptions()
                .find_due_for_expiry(now, batch_size)
                .await?;
            let fetched = due.len() as u64;
            let mut expired_in_batch = 0u64;

            for mut subscription in due {
                if subscription.expire(now).is_err() {
                    continue;
                }
                match self
                    .repos
                    .subscriptions()
                    .update_status_if(
                        subscription.id,
                        SubscriptionStatus::Active,
                        SubscriptionStatus::Expired,
                        now,
                    )
                    .await
                {
                    Ok(true) => {
                        expired_in_batch += 1;
                        committed.events.push(Event::SubscriptionExpired(
                            SubscriptionEvent::from_subscription(&subscription),
                        ));
                    }
                    Ok(false) => {}
                    Err(e) => {
                        warn!(subscription_id = subscription.id, error = %e, "Failed to expire subscription");
                    }
                }
            }

            committed.value += expired_in_batch;
            if fetched < batch_size || expired_in_batch == 0 {
                break;
            }
        }

        if committed.value > 0 {
            metrics::counter!("subscriptions_expired_total").increment(committed.value);
            info!(count = committed.value, "⏰ Subscriptions expired");
        }
        Ok(committed)
    }

    async fn lost_race(&self, id: i32, to: SubscriptionStatus) -> DomainError {
        match self.repos.subscriptions().find_by_id(id).await {
            Ok(Some(current)) => DomainError::InvalidStateTransition {
                entity: "Subscription",
                from: current.status.as_str().to_string(),
                to: to.as_str().to_string(),
            },
            Ok(None) => DomainError::not_found("Subscription", id),
            Err(e) => e,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::subscription::PlanType;
    use crate::infrastructure::storage::InMemoryRepositoryProvider;
    use chrono::Duration;

    fn service() -> (Arc<SubscriptionService>, Arc<dyn RepositoryProvider>) {
        let repos: Arc<dyn RepositoryProvider> = Arc::new(InMemoryRepositoryProvider::new());
        (Arc::new(SubscriptionService::new(repos.clone())), repos)
    }

    async fn plan(svc: &SubscriptionService, max: i32) -> PackagePlan {
        svc.create_plan(NewPackagePlan {
            name: "Commuter".into(),
            description: Some("Weekday swaps".into()),
            max_swap_per_month: max,
            price: 150_000,
            plan_type: PlanType::Monthly,
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn second_active_subscription_is_rejected() {
        let (svc, _) = service();
        let plan = plan(&svc, 4).await;
        svc.subscribe("user-1", plan.id).await.unwrap();
        let err = svc.subscribe("user-1", plan.id).await.unwrap_err();
        assert_eq!(err, DomainError::AlreadyHasActiveSubscription("user-1".into()));
    }

    #[tokio::test]
    async fn inactive_plan_cannot_be_subscribed() {
        let (svc, _) = service();
        let plan = plan(&svc, 4).await;
        svc.deactivate_plan(plan.id).await.unwrap();
        let err = svc.subscribe("user-1", plan.id).await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound { entity: "PackagePlan", .. }));
    }

    #[tokio::test]
    async fn concurrent_consumes_never_exceed_quota() {
        let (svc, _) = service();
        let plan = plan(&svc, 5).await;
        let sub = svc.subscribe("user-1", plan.id).await.unwrap().value;

        let mut handles = Vec::new();
        for _ in 0..10 {
            let svc = svc.clone();
            handles.push(tokio::spawn(async move { svc.consume(sub.id).await }));
        }

        let mut ok = 0;
        let mut exhausted = 0;
        for h in handles {
            match h.await.unwrap() {
                Ok(()) => ok += 1,
                Err(DomainError::QuotaExhausted(_)) => exhausted += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(ok, 5);
        assert_eq!(exhausted, 5);
        assert_eq!(svc.get(sub.id).await.unwrap().used_swaps, 5);
    }

    #[tokio::test]
    async fn consume_on_cancelled_subscription_is_invalid() {
        let (svc, _) = service();
        let plan = plan(&svc, 2).await;
        let sub = svc.subscribe("user-1", plan.id).await.unwrap().value;
        let cancelled = svc.cancel(sub.id).await.unwrap();
        assert_eq!(cancelled.value.status, SubscriptionStatus::Inactive);
        assert_eq!(cancelled.events.len(), 1);

        let err = svc.consume(sub.id).await.unwrap_err();
        assert!(matches!(err, DomainError::InvalidStateTransition { .. }));
        assert!(matches!(
            svc.cancel(sub.id).await.unwrap_err(),
            DomainError::InvalidStateTransition { .. }
        ));
    }

    #[tokio::test]
    async fn stats_report_remaining_quota() {
        let (svc, _) = service();
        let plan = plan(&svc, 3).await;
        let sub = svc.subscribe("user-1", plan.id).await.unwrap().value;
        svc.consume(sub.id).await.unwrap();

        let stats = svc.stats("user-1").await.unwrap();
        assert_eq!(stats.plan_name, "Commuter");
        assert_eq!(stats.used_swaps, 1);
        assert_eq!(stats.remaining_swaps, 2);
        assert!(stats.days_remaining >= 27);

        assert_eq!(
            svc.stats("user-2").await.unwrap_err(),
            DomainError::NoActiveSubscription("user-2".into())
        );
    }

    #[tokio::test]
    async fn expire_due_is_idempotent() {
        let (svc, repos) = service();
        let plan = plan(&svc, 3).await;
        let sub = svc.subscribe("user-1", plan.id).await.unwrap().value;

        let now = sub.end_date + Duration::seconds(1);
        let first = svc.expire_due(now, 100).await.unwrap();
        assert_eq!(first.value, 1);
        assert_eq!(first.events.len(), 1);

        let second = svc.expire_due(now, 100).await.unwrap();
        assert_eq!(second.value, 0);
        assert!(second.events.is_empty());

        let stored = repos.subscriptions().find_by_id(sub.id).await.unwrap().unwrap();
        assert_eq!(stored.status, SubscriptionStatus::Expired);
    }

    #[tokio::test]
    async fn expire_due_walks_every_batch() {
        let (svc, _) = service();
        let plan = plan(&svc, 3).await;
        let mut latest_end = Utc::now();
        for i in 0..5 {
            let sub = svc.subscribe(&format!("user-{i}"), plan.id).await.unwrap().value;
            latest_end = latest_end.max(sub.end_date);
        }
        let expired = svc.expire_due(latest_end + Duration::seconds(1), 2).await.unwrap();
        assert_eq!(expired.value, 5);
    }

    #[tokio::test]
    async fn quota_check_distinguishes_missing_and_exhausted() {
        let (svc, _) = service();
        let plan = plan(&svc, 1).await;
        let sub = svc.subscribe("user-1", plan.id).await.unwrap().value;
        let now = Utc::now();

        assert!(svc.ensure_quota_available("user-1", sub.id, now).await.is_ok());
        assert_eq!(
            svc.ensure_quota_available("user-2", sub.id, now).await.unwrap_err(),
            DomainError::NoActiveSubscription("user-2".into())
        );

        svc.consume(sub.id).await.unwrap();
        assert_eq!(
            svc.ensure_quota_available("user-1", sub.id, now).await.unwrap_err(),
            DomainError::QuotaExhausted(sub.id)
        );
    }
}
