//! Domain layer
//!
//! Aggregates, their transition tables and repository interfaces.
//! Nothing here touches the database or the network.

pub mod booking;
pub mod events;
pub mod repositories;
pub mod subscription;
pub mod swap_transaction;

pub use booking::{Booking, BookingFilter, BookingRepository, BookingStatus, NewBooking, PaymentType};
pub use events::{Committed, Event, EventMessage};
pub use repositories::{DomainResult, RepositoryProvider};
pub use subscription::{
    NewPackagePlan, PackagePlan, PlanType, Subscription, SubscriptionRepository,
    SubscriptionStats, SubscriptionStatus,
};
pub use swap_transaction::{
    AmountScope, NewSwapTransaction, SwapTransaction, SwapTransactionRepository,
    SwapTransactionStatus,
};

pub use crate::shared::errors::DomainError;
