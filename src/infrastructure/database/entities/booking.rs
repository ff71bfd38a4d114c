//! Booking entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "bookings")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub driver_id: String,
    pub station_id: String,
    pub battery_model_id: String,

    pub booking_time: DateTimeUtc,
    pub scheduled_time: DateTimeUtc,

    /// PER_SWAP or PACKAGE
    pub payment_type: String,

    /// Subscription drawn on when payment_type is PACKAGE
    #[sea_orm(nullable)]
    pub package_id: Option<i32>,

    #[sea_orm(nullable)]
    pub payment_id: Option<String>,

    pub is_paid: bool,

    #[sea_orm(nullable)]
    pub notes: Option<String>,

    /// PENDING, CONFIRM, SUCCESS, CANCEL
    pub status: String,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_one = "super::swap_transaction::Entity")]
    SwapTransaction,
}

impl Related<super::swap_transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SwapTransaction.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
