//! Subscription aggregate
//!
//! Package plans, user subscriptions and the quota they grant.

pub mod model;
pub mod repository;

pub use model::{
    ConsumeOutcome, NewPackagePlan, PackagePlan, PlanType, Subscription, SubscriptionStats,
    SubscriptionStatus,
};
pub use repository::SubscriptionRepository;
