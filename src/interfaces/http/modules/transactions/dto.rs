//! Swap transaction DTOs

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::application::services::ProcessedTransaction;
use crate::domain::swap_transaction::{NewSwapTransaction, SwapTransaction};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TransactionDto {
    pub id: i32,
    pub booking_id: i32,
    pub station_id: String,
    pub driver_id: String,
    pub old_battery_id: String,
    pub new_battery_id: String,
    /// Smallest currency unit
    pub amount: i64,
    pub payment_method: String,
    pub subscription_id: Option<i32>,
    /// PENDING, SUCCESS, FAILED
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<SwapTransaction> for TransactionDto {
    fn from(t: SwapTransaction) -> Self {
        Self {
            id: t.id,
            booking_id: t.booking_id,
            station_id: t.station_id,
            driver_id: t.driver_id,
            old_battery_id: t.old_battery_id,
            new_battery_id: t.new_battery_id,
            amount: t.amount,
            payment_method: t.payment_method,
            subscription_id: t.subscription_id,
            status: t.status.as_str().to_string(),
            created_at: t.created_at.to_rfc3339(),
            updated_at: t.updated_at.to_rfc3339(),
        }
    }
}

/// Result of processing a swap
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProcessedTransactionDto {
    pub transaction: TransactionDto,
    /// Set when the swap succeeded but its subscription could not be charged
    pub quota_breach: Option<String>,
}

impl From<ProcessedTransaction> for ProcessedTransactionDto {
    fn from(p: ProcessedTransaction) -> Self {
        Self {
            transaction: p.transaction.into(),
            quota_breach: p.quota_breach.map(|e| e.to_string()),
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateTransactionRequest {
    #[validate(range(min = 1))]
    pub booking_id: i32,
    #[validate(length(min = 1, max = 64))]
    pub station_id: String,
    #[validate(length(min = 1, max = 64))]
    pub driver_id: String,
    #[validate(length(min = 1, max = 64))]
    pub old_battery_id: String,
    #[validate(length(min = 1, max = 64))]
    pub new_battery_id: String,
    #[validate(range(min = 1))]
    pub amount: i64,
    #[validate(length(min = 1, max = 32))]
    pub payment_method: String,
}

impl From<CreateTransactionRequest> for NewSwapTransaction {
    fn from(r: CreateTransactionRequest) -> Self {
        NewSwapTransaction {
            booking_id: r.booking_id,
            station_id: r.station_id,
            driver_id: r.driver_id,
            old_battery_id: r.old_battery_id,
            new_battery_id: r.new_battery_id,
            amount: r.amount,
            payment_method: r.payment_method,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AdjustAmountRequest {
    #[validate(range(min = 1))]
    pub amount: i64,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct TotalsParams {
    pub driver_id: Option<String>,
    pub station_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TotalAmountDto {
    /// "driver" or "station"
    pub scope: String,
    pub id: String,
    /// Sum of SUCCESS amounts, smallest currency unit
    pub total_amount: i64,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct StuckParams {
    /// Override the configured threshold
    pub threshold_minutes: Option<i64>,
    pub limit: Option<u64>,
}
