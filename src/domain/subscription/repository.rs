//! Subscription repository interface

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::model::{ConsumeOutcome, PackagePlan, Subscription, SubscriptionStatus};
use crate::domain::DomainResult;

#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    // ── Plans ───────────────────────────────────────────────

    async fn insert_plan(&self, plan: PackagePlan) -> DomainResult<PackagePlan>;

    async fn find_plan(&self, id: i32) -> DomainResult<Option<PackagePlan>>;

    async fn list_plans(&self, include_inactive: bool) -> DomainResult<Vec<PackagePlan>>;

    /// Returns false if the plan does not exist.
    async fn set_plan_active(&self, id: i32, active: bool) -> DomainResult<bool>;

    // ── Subscriptions ───────────────────────────────────────

    /// Fails with `AlreadyHasActiveSubscription` when the user already
    /// holds an ACTIVE subscription.
    async fn insert(&self, subscription: Subscription) -> DomainResult<Subscription>;

    async fn find_by_id(&self, id: i32) -> DomainResult<Option<Subscription>>;

    async fn find_active_for_user(&self, user_id: &str) -> DomainResult<Option<Subscription>>;

    /// All subscriptions of a user, newest first.
    async fn history(&self, user_id: &str) -> DomainResult<Vec<Subscription>>;

    /// Atomically take one unit of quota:
    /// `used_swaps + 1 WHERE status = ACTIVE AND used_swaps < max_swaps`.
    async fn consume_one(&self, id: i32, now: DateTime<Utc>) -> DomainResult<ConsumeOutcome>;

    /// Move to `to` only if the stored status still equals `expected`.
    async fn update_status_if(
        &self,
        id: i32,
        expected: SubscriptionStatus,
        to: SubscriptionStatus,
        now: DateTime<Utc>,
    ) -> DomainResult<bool>;

    /// ACTIVE subscriptions whose end date is before `now`.
    async fn find_due_for_expiry(
        &self,
        now: DateTime<Utc>,
        limit: u64,
    ) -> DomainResult<Vec<Subscription>>;

    /// ACTIVE subscriptions, ordered by id, starting after `after_id`.
    async fn list_active(&self, after_id: i32, limit: u64) -> DomainResult<Vec<Subscription>>;
}
