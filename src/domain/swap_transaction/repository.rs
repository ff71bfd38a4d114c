//! Swap transaction repository interface

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::model::{AmountScope, SwapTransaction, SwapTransactionStatus};
use crate::domain::DomainResult;

#[async_trait]
pub trait SwapTransactionRepository: Send + Sync {
    /// Insert and return with the assigned id.
    ///
    /// Fails with `DuplicateTransaction` when the booking already has one.
    async fn insert(&self, tx: SwapTransaction) -> DomainResult<SwapTransaction>;

    async fn find_by_id(&self, id: i32) -> DomainResult<Option<SwapTransaction>>;

    async fn find_by_booking(&self, booking_id: i32) -> DomainResult<Option<SwapTransaction>>;

    /// Persist `tx` only if the stored status still equals `expected`.
    async fn update_if_status(
        &self,
        tx: &SwapTransaction,
        expected: SwapTransactionStatus,
    ) -> DomainResult<bool>;

    /// Sum of SUCCESS amounts in scope.
    async fn sum_successful(&self, scope: &AmountScope) -> DomainResult<i64>;

    /// Transactions where the battery was removed or installed, newest first.
    async fn battery_history(&self, battery_id: &str) -> DomainResult<Vec<SwapTransaction>>;

    /// PENDING transactions created before `cutoff`, oldest first.
    async fn find_pending_before(
        &self,
        cutoff: DateTime<Utc>,
        limit: u64,
    ) -> DomainResult<Vec<SwapTransaction>>;

    /// Number of SUCCESS transactions drawing on the subscription.
    async fn count_successful_for_subscription(&self, subscription_id: i32) -> DomainResult<u64>;
}
