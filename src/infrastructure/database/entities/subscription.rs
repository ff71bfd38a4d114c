//! User package subscription entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "subscriptions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub user_id: String,
    pub package_plan_id: i32,

    pub start_date: DateTimeUtc,
    pub end_date: DateTimeUtc,

    pub used_swaps: i32,
    /// Plan quota at subscribe time
    pub max_swaps: i32,

    /// ACTIVE, EXPIRED, INACTIVE
    pub status: String,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::package_plan::Entity",
        from = "Column::PackagePlanId",
        to = "super::package_plan::Column::Id"
    )]
    PackagePlan,
}

impl Related<super::package_plan::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PackagePlan.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
