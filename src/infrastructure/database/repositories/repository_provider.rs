//! SeaORM implementation of RepositoryProvider

use sea_orm::DatabaseConnection;

use crate::domain::booking::BookingRepository;
use crate::domain::repositories::RepositoryProvider;
use crate::domain::subscription::SubscriptionRepository;
use crate::domain::swap_transaction::SwapTransactionRepository;

use super::booking_repository::SeaOrmBookingRepository;
use super::subscription_repository::SeaOrmSubscriptionRepository;
use super::swap_transaction_repository::SeaOrmSwapTransactionRepository;

/// Unified repository provider backed by SeaORM.
///
/// Holds one connection pool and exposes per-aggregate repository accessors.
///
/// ```ignore
/// let repos = SeaOrmRepositoryProvider::new(db.clone());
/// let booking = repos.bookings().find_by_id(7).await?;
/// let sub = repos.subscriptions().find_active_for_user("driver-1").await?;
/// ```
pub struct SeaOrmRepositoryProvider {
    bookings: SeaOrmBookingRepository,
    swap_transactions: SeaOrmSwapTransactionRepository,
    subscriptions: SeaOrmSubscriptionRepository,
}

impl SeaOrmRepositoryProvider {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            bookings: SeaOrmBookingRepository::new(db.clone()),
            swap_transactions: SeaOrmSwapTransactionRepository::new(db.clone()),
            subscriptions: SeaOrmSubscriptionRepository::new(db),
        }
    }
}

impl RepositoryProvider for SeaOrmRepositoryProvider {
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
