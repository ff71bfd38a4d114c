//! Package plan and subscription domain entities

use chrono::{DateTime, Months, Utc};

use crate::domain::DomainResult;
use crate::shared::errors::DomainError;

/// Billing period of a package plan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanType {
    Monthly,
    Yearly,
}

impl PlanType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Monthly => "MONTHLY",
            Self::Yearly => "YEARLY",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "MONTHLY" => Some(Self::Monthly),
            "YEARLY" => Some(Self::Yearly),
            _ => None,
        }
    }

    /// End of a period starting at `start`. Calendar arithmetic, so
    /// Jan 31 + 1 month clamps to the last day of February.
    pub fn period_end(&self, start: DateTime<Utc>) -> DomainResult<DateTime<Utc>> {
        let months = match self {
            Self::Monthly => Months::new(1),
            Self::Yearly => Months::new(12),
        };
        start
            .checked_add_months(months)
            .ok_or_else(|| DomainError::Validation("subscription end date out of range".into()))
    }
}

impl std::fmt::Display for PlanType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Input for a new catalog plan
#[derive(Debug, Clone)]
pub struct NewPackagePlan {
    pub name: String,
    pub description: Option<String>,
    pub max_swap_per_month: i32,
    /// Price in the smallest currency unit
    pub price: i64,
    pub plan_type: PlanType,
}

impl NewPackagePlan {
    pub fn validate(&self) -> DomainResult<()> {
        if self.name.trim().is_empty() {
            return Err(DomainError::Validation("name is required".into()));
        }
        if self.max_swap_per_month <= 0 {
            return Err(DomainError::Validation(
                "max_swap_per_month must be positive".into(),
            ));
        }
        if self.price < 0 {
            return Err(DomainError::Validation("price must not be negative".into()));
        }
        Ok(())
    }
}

/// Catalog entry drivers subscribe to
#[derive(Debug, Clone, PartialEq)]
pub struct PackagePlan {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub max_swap_per_month: i32,
    pub price: i64,
    pub plan_type: PlanType,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl PackagePlan {
    pub fn new(input: NewPackagePlan, now: DateTime<Utc>) -> Self {
        Self {
            id: 0,
            name: input.name,
            description: input.description,
            max_swap_per_month: input.max_swap_per_month,
            price: input.price,
            plan_type: input.plan_type,
            is_active: true,
            created_at: now,
        }
    }
}

/// Subscription status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubscriptionStatus {
    Active,
    /// End date passed (terminal)
    Expired,
    /// Cancelled by the user (terminal)
    Inactive,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Expired => "EXPIRED",
            Self::Inactive => "INACTIVE",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "ACTIVE" => Some(Self::Active),
            "EXPIRED" => Some(Self::Expired),
            "INACTIVE" => Some(Self::Inactive),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Active)
    }

    pub fn transition(self, to: SubscriptionStatus) -> DomainResult<SubscriptionStatus> {
        use SubscriptionStatus::*;
        match (self, to) {
            (Active, Expired) | (Active, Inactive) => Ok(to),
            _ => Err(DomainError::InvalidStateTransition {
                entity: "Subscription",
                from: self.as_str().to_string(),
                to: to.as_str().to_string(),
            }),
        }
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A user's prepaid swap allowance
#[derive(Debug, Clone, PartialEq)]
pub struct Subscription {
    pub id: i32,
    pub user_id: String,
    pub package_plan_id: i32,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub used_swaps: i32,
    /// Plan quota captured at subscribe time
    pub max_swaps: i32,
    pub status: SubscriptionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    pub fn new(user_id: impl Into<String>, plan: &PackagePlan, now: DateTime<Utc>) -> DomainResult<Self> {
        Ok(Self {
            id: 0,
            user_id: user_id.into(),
            package_plan_id: plan.id,
            start_date: now,
            end_date: plan.plan_type.period_end(now)?,
            used_swaps: 0,
            max_swaps: plan.max_swap_per_month,
            status: SubscriptionStatus::Active,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn remaining_swaps(&self) -> i32 {
        (self.max_swaps - self.used_swaps).max(0)
    }

    pub fn has_quota(&self) -> bool {
        self.used_swaps < self.max_swaps
    }

    pub fn is_due_for_expiry(&self, now: DateTime<Utc>) -> bool {
        self.status == SubscriptionStatus::Active && self.end_date < now
    }

    pub fn cancel(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        self.status = self.status.transition(SubscriptionStatus::Inactive)?;
        self.updated_at = now;
        Ok(())
    }

    pub fn expire(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        self.status = self.status.transition(SubscriptionStatus::Expired)?;
        self.updated_at = now;
        Ok(())
    }

    /// Whole days until the end date, never negative.
    pub fn days_remaining(&self, now: DateTime<Utc>) -> i64 {
        (self.end_date - now).num_days().max(0)
    }
}

/// Quota summary of a user's ACTIVE subscription
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionStats {
    pub subscription_id: i32,
    pub plan_name: String,
    pub used_swaps: i32,
    pub max_swaps: i32,
    pub remaining_swaps: i32,
    pub days_remaining: i64,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

impl SubscriptionStats {
    pub fn from_subscription(sub: &Subscription, plan_name: String, now: DateTime<Utc>) -> Self {
        Self {
            subscription_id: sub.id,
            plan_name,
            used_swaps: sub.used_swaps,
            max_swaps: sub.max_swaps,
            remaining_swaps: sub.remaining_swaps(),
            days_remaining: sub.days_remaining(now),
            start_date: sub.start_date,
            end_date: sub.end_date,
        }
    }
}

/// Outcome of a conditional quota decrement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeOutcome {
    Consumed,
    NotFound,
    NotActive(SubscriptionStatus),
    Exhausted,
}

// ── Tests ──────────────────────────────────────────────────────
