//! Plan and subscription DTOs

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::domain::subscription::{
    NewPackagePlan, PackagePlan, PlanType, Subscription, SubscriptionStats,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanTypeDto {
    Monthly,
    Yearly,
}

impl From<PlanTypeDto> for PlanType {
    fn from(p: PlanTypeDto) -> Self {
        match p {
            PlanTypeDto::Monthly => PlanType::Monthly,
            PlanTypeDto::Yearly => PlanType::Yearly,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PlanDto {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub max_swap_per_month: i32,
    /// Smallest currency unit
    pub price: i64,
    /// MONTHLY or YEARLY
    pub plan_type: String,
    pub is_active: bool,
    pub created_at: String,
}

impl From<PackagePlan> for PlanDto {
    fn from(p: PackagePlan) -> Self {
        Self {
            id: p.id,
            name: p.name,
            description: p.description,
            max_swap_per_month: p.max_swap_per_month,
            price: p.price,
            plan_type: p.plan_type.as_str().to_string(),
            is_active: p.is_active,
            created_at: p.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreatePlanRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(max = 500))]
    pub description: Option<String>,
    #[validate(range(min = 1))]
    pub max_swap_per_month: i32,
    #[validate(range(min = 0))]
    pub price: i64,
    pub plan_type: PlanTypeDto,
}

impl From<CreatePlanRequest> for NewPackagePlan {
    fn from(r: CreatePlanRequest) -> Self {
        NewPackagePlan {
            name: r.name,
            description: r.description,
            max_swap_per_month: r.max_swap_per_month,
            price: r.price,
            plan_type: r.plan_type.into(),
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListPlansParams {
    #[serde(default)]
    pub include_inactive: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SubscriptionDto {
    pub id: i32,
    pub user_id: String,
    pub package_plan_id: i32,
    pub start_date: String,
    pub end_date: String,
    pub used_swaps: i32,
    pub max_swaps: i32,
    pub remaining_swaps: i32,
    /// ACTIVE, EXPIRED, INACTIVE
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Subscription> for SubscriptionDto {
    fn from(s: Subscription) -> Self {
        Self {
            remaining_swaps: s.remaining_swaps(),
            id: s.id,
            user_id: s.user_id,
            package_plan_id: s.package_plan_id,
            start_date: s.start_date.to_rfc3339(),
            end_date: s.end_date.to_rfc3339(),
            used_swaps: s.used_swaps,
            max_swaps: s.max_swaps,
            status: s.status.as_str().to_string(),
            created_at: s.created_at.to_rfc3339(),
            updated_at: s.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SubscribeRequest {
    #[validate(length(min = 1, max = 64))]
    pub user_id: String,
    #[validate(range(min = 1))]
    pub plan_id: i32,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SubscriptionStatsDto {
    pub subscription_id: i32,
    pub plan_name: String,
    pub used_swaps: i32,
    pub max_swaps: i32,
    pub remaining_swaps: i32,
    pub days_remaining: i64,
    pub start_date: String,
    pub end_date: String,
}

impl From<SubscriptionStats> for SubscriptionStatsDto {
    fn from(s: SubscriptionStats) -> Self {
        Self {
            subscription_id: s.subscription_id,
            plan_name: s.plan_name,
            used_swaps: s.used_swaps,
            max_swaps: s.max_swaps,
            remaining_swaps: s.remaining_swaps,
            days_remaining: s.days_remaining,
            start_date: s.start_date.to_rfc3339(),
            end_date: s.end_date.to_rfc3339(),
        }
    }
}
