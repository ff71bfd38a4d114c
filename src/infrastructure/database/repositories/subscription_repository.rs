//! SeaORM implementation of SubscriptionRepository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};

use super::{corrupt_column, db_err, is_unique_violation};
use crate::domain::subscription::{
    ConsumeOutcome, PackagePlan, PlanType, Subscription, SubscriptionRepository,
    SubscriptionStatus,
};
use crate::domain::{DomainError, DomainResult};
use crate::infrastructure::database::entities::{package_plan, subscription};

pub struct SeaOrmSubscriptionRepository {
    db: DatabaseConnection,
}

impl SeaOrmSubscriptionRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

// ── Conversion helpers ──────────────────────────────────────────

fn plan_to_domain(m: package_plan::Model) -> DomainResult<PackagePlan> {
    let plan_type = PlanType::from_str(&m.plan_type)
        .ok_or_else(|| corrupt_column("package_plan", "plan_type", &m.plan_type))?;
    Ok(PackagePlan {
        id: m.id,
        name: m.name,
        description: m.description,
        max_swap_per_month: m.max_swap_per_month,
        price: m.price,
        plan_type,
        is_active: m.is_active,
        created_at: m.created_at,
    })
}

fn model_to_domain(m: subscription::Model) -> DomainResult<Subscription> {
    let status = SubscriptionStatus::from_str(&m.status)
        .ok_or_else(|| corrupt_column("subscription", "status", &m.status))?;
    Ok(Subscription {
        id: m.id,
        user_id: m.user_id,
        package_plan_id: m.package_plan_id,
        start_date: m.start_date,
        end_date: m.end_date,
        used_swaps: m.used_swaps,
        max_swaps: m.max_swaps,
        status,
        created_at: m.created_at,
        updated_at: m.updated_at,
    })
}

fn models_to_domain(models: Vec<subscription::Model>) -> DomainResult<Vec<Subscription>> {
    models.into_iter().map(model_to_domain).collect()
}

#[async_trait]
impl SubscriptionRepository for SeaOrmSubscriptionRepository {
    // ── Plans ───────────────────────────────────────────────

    async fn insert_plan(&self, plan: PackagePlan) -> DomainResult<PackagePlan> {
        debug!("Inserting package plan {}", plan.name);
        let model = package_plan::ActiveModel {
            name: Set(plan.name),
            description: Set(plan.description),
            max_swap_per_month: Set(plan.max_swap_per_month),
            price: Set(plan.price),
            plan_type: Set(plan.plan_type.as_str().to_string()),
            is_active: Set(plan.is_active),
            created_at: Set(plan.created_at),
            ..Default::default()
        };
        let inserted = model.insert(&self.db).await.map_err(db_err)?;
        plan_to_domain(inserted)
    }

    async fn find_plan(&self, id: i32) -> DomainResult<Option<PackagePlan>> {
        package_plan::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_err)?
            .map(plan_to_domain)
            .transpose()
    }

    async fn list_plans(&self, include_inactive: bool) -> DomainResult<Vec<PackagePlan>> {
        let mut query = package_plan::Entity::find();
        if !include_inactive {
            query = query.filter(package_plan::Column::IsActive.eq(true));
        }
        query
            .order_by_asc(package_plan::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(plan_to_domain)
            .collect()
    }

    async fn set_plan_active(&self, id: i32, active: bool) -> DomainResult<bool> {
        let changes = package_plan::ActiveModel {
            is_active: Set(active),
            ..Default::default()
        };
        let result = package_plan::Entity::update_many()
            .set(changes)
            .filter(package_plan::Column::Id.eq(id))
            .exec(&self.db)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected > 0)
    }

    // ── Subscriptions ───────────────────────────────────────

    async fn insert(&self, sub: Subscription) -> DomainResult<Subscription> {
        debug!("Inserting subscription for user {}", sub.user_id);

        let user_id = sub.user_id.clone();
        let model = subscription::ActiveModel {
            user_id: Set(sub.user_id),
            package_plan_id: Set(sub.package_plan_id),
            start_date: Set(sub.start_date),
            end_date: Set(sub.end_date),
            used_swaps: Set(sub.used_swaps),
            max_swaps: Set(sub.max_swaps),
            status: Set(sub.status.as_str().to_string()),
            created_at: Set(sub.created_at),
            updated_at: Set(sub.updated_at),
            ..Default::default()
        };

        match model.insert(&self.db).await {
            Ok(m) => model_to_domain(m),
            Err(e) if is_unique_violation(&e) => {
                Err(DomainError::AlreadyHasActiveSubscription(user_id))
            }
            Err(e) => Err(db_err(e)),
        }
    }

    async fn find_by_id(&self, id: i32) -> DomainResult<Option<Subscription>> {
        subscription::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_err)?
            .map(model_to_domain)
            .transpose()
    }

    async fn find_active_for_user(&self, user_id: &str) -> DomainResult<Option<Subscription>> {
        subscription::Entity::find()
            .filter(subscription::Column::UserId.eq(user_id))
            .filter(subscription::Column::Status.eq(SubscriptionStatus::Active.as_str()))
            .one(&self.db)
            .await
            .map_err(db_err)?
            .map(model_to_domain)
            .transpose()
    }

    async fn history(&self, user_id: &str) -> DomainResult<Vec<Subscription>> {
        let models = subscription::Entity::find()
            .filter(subscription::Column::UserId.eq(user_id))
            .order_by_desc(subscription::Column::CreatedAt)
            .order_by_desc(subscription::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        models_to_domain(models)
    }

    async fn consume_one(&self, id: i32, now: DateTime<Utc>) -> DomainResult<ConsumeOutcome> {
        let result = subscription::Entity::update_many()
            .col_expr(
                subscription::Column::UsedSwaps,
                Expr::col(subscription::Column::UsedSwaps).add(1),
            )
            .col_expr(subscription::Column::UpdatedAt, Expr::value(now))
            .filter(subscription::Column::Id.eq(id))
            .filter(subscription::Column::Status.eq(SubscriptionStatus::Active.as_str()))
            .filter(
                Expr::col(subscription::Column::UsedSwaps)
                    .lt(Expr::col(subscription::Column::MaxSwaps)),
            )
            .exec(&self.db)
            .await
            .map_err(db_err)?;

        if result.rows_affected == 1 {
            return Ok(ConsumeOutcome::Consumed);
        }

        // Nothing changed: find out why.
        Ok(match self.find_by_id(id).await? {
            None => ConsumeOutcome::NotFound,
            Some(sub) if sub.status != SubscriptionStatus::Active => {
                ConsumeOutcome::NotActive(sub.status)
            }
            Some(_) => ConsumeOutcome::Exhausted,
        })
    }

    async fn update_status_if(
        &self,
        id: i32,
        expected: SubscriptionStatus,
        to: SubscriptionStatus,
        now: DateTime<Utc>,
    ) -> DomainResult<bool> {
        debug!("Updating subscription {} ({} -> {})", id, expected, to);
        let changes = subscription::ActiveModel {
            status: Set(to.as_str().to_string()),
            updated_at: Set(now),
            ..Default::default()
        };
        let result = subscription::Entity::update_many()
            .set(changes)
            .filter(subscription::Column::Id.eq(id))
            .filter(subscription::Column::Status.eq(expected.as_str()))
            .exec(&self.db)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected == 1)
    }

    async fn find_due_for_expiry(
        &self,
        now: DateTime<Utc>,
        limit: u64,
    ) -> DomainResult<Vec<Subscription>> {
        let models = subscription::Entity::find()
            .filter(subscription::Column::Status.eq(SubscriptionStatus::Active.as_str()))
            .filter(subscription::Column::EndDate.lt(now))
            .order_by_asc(subscription::Column::EndDate)
            .order_by_asc(subscription::Column::Id)
            .limit(limit)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        models_to_domain(models)
    }

    async fn list_active(&self, after_id: i32, limit: u64) -> DomainResult<Vec<Subscription>> {
        let models = subscription::Entity::find()
            .filter(subscription::Column::Status.eq(SubscriptionStatus::Active.as_str()))
            .filter(subscription::Column::Id.gt(after_id))
            .order_by_asc(subscription::Column::Id)
            .limit(limit)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        models_to_domain(models)
    }
}
