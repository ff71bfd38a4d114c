//! Reconciliation report DTOs

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::application::services::{
    OverdueBookingReport, StuckTransactionReport, UsedSwapMismatch, UsedSwapReport,
};
use crate::interfaces::http::modules::bookings::BookingDto;
use crate::interfaces::http::modules::transactions::TransactionDto;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ExpiryReportDto {
    /// Subscriptions moved to EXPIRED by this run
    pub expired: u64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StuckReportDto {
    pub threshold_minutes: i64,
    pub transactions: Vec<TransactionDto>,
}

impl From<StuckTransactionReport> for StuckReportDto {
    fn from(r: StuckTransactionReport) -> Self {
        Self {
            threshold_minutes: r.threshold_minutes,
            transactions: r.transactions.into_iter().map(TransactionDto::from).collect(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OverdueReportDto {
    pub overdue: Vec<BookingDto>,
    /// Ids cancelled by this run (auto-cancel only)
    pub auto_cancelled: Vec<i32>,
}

impl From<OverdueBookingReport> for OverdueReportDto {
    fn from(r: OverdueBookingReport) -> Self {
        Self {
            overdue: r.overdue.into_iter().map(BookingDto::from).collect(),
            auto_cancelled: r.auto_cancelled,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UsedSwapMismatchDto {
    pub subscription_id: i32,
    pub user_id: String,
    pub recorded_used_swaps: i32,
    pub successful_transactions: u64,
}

impl From<UsedSwapMismatch> for UsedSwapMismatchDto {
    fn from(m: UsedSwapMismatch) -> Self {
        Self {
            subscription_id: m.subscription_id,
            user_id: m.user_id,
            recorded_used_swaps: m.recorded_used_swaps,
            successful_transactions: m.successful_transactions,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UsedSwapReportDto {
    pub checked: u64,
    pub mismatches: Vec<UsedSwapMismatchDto>,
}

impl From<UsedSwapReport> for UsedSwapReportDto {
    fn from(r: UsedSwapReport) -> Self {
        Self {
            checked: r.checked,
            mismatches: r.mismatches.into_iter().map(UsedSwapMismatchDto::from).collect(),
        }
    }
}
