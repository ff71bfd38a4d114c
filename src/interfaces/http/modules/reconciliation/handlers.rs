//! Reconciliation handlers (operator only)

use std::sync::Arc;

use axum::extract::State;
use chrono::Utc;

use super::dto::{ExpiryReportDto, OverdueReportDto, StuckReportDto, UsedSwapReportDto};
use crate::application::{OutboundDispatcher, ReconciliationJobs};
use crate::interfaces::http::common::{domain_error, ok, ApiResponse, ApiResult};

#[derive(Clone)]
pub struct ReconciliationAppState {
    pub jobs: Arc<ReconciliationJobs>,
    pub outbound: OutboundDispatcher,
}

#[utoipa::path(
    post,
    path = "/api/v1/reconciliation/expire-subscriptions",
    tag = "Reconciliation",
    security(("api_key" = [])),
    responses(
        (status = 200, description = "Expiry sweep finished", body = ApiResponse<ExpiryReportDto>),
        (status = 401, description = "Missing or invalid operator key")
    )
)]
pub async fn expire_subscriptions(
    State(state): State<ReconciliationAppState>,
) -> ApiResult<ExpiryReportDto> {
    let committed = state
        .jobs
        .expire_subscriptions(Utc::now())
        .await
        .map_err(domain_error)?;
    let expired = state.outbound.emit(committed);
    ok(ExpiryReportDto { expired })
}

#[utoipa::path(
    post,
    path = "/api/v1/reconciliation/stuck-transactions",
    operation_id = "reconcile_stuck_transactions",
    tag = "Reconciliation",
    security(("api_key" = [])),
    responses(
        (status = 200, description = "Stuck swaps report", body = ApiResponse<StuckReportDto>)
    )
)]
pub async fn stuck_transactions(
    State(state): State<ReconciliationAppState>,
) -> ApiResult<StuckReportDto> {
    let report = state
        .jobs
        .stuck_transactions(Utc::now())
        .await
        .map_err(domain_error)?;
    ok(report.into())
}

#[utoipa::path(
    post,
    path = "/api/v1/reconciliation/overdue-bookings",
    operation_id = "reconcile_overdue_bookings",
    tag = "Reconciliation",
    security(("api_key" = [])),
    responses(
        (status = 200, description = "Overdue bookings report", body = ApiResponse<OverdueReportDto>)
    )
)]
pub async fn overdue_bookings(
    State(state): State<ReconciliationAppState>,
) -> ApiResult<OverdueReportDto> {
    let committed = state
        .jobs
        .overdue_bookings(Utc::now())
        .await
        .map_err(domain_error)?;
    ok(state.outbound.emit(committed).into())
}

#[utoipa::path(
    post,
    path = "/api/v1/reconciliation/used-swaps",
    tag = "Reconciliation",
    security(("api_key" = [])),
    responses(
        (status = 200, description = "Used-swap counter audit", body = ApiResponse<UsedSwapReportDto>)
    )
)]
pub async fn used_swap_accounting(
    State(state): State<ReconciliationAppState>,
) -> ApiResult<UsedSwapReportDto> {
    let report = state
        .jobs
        .used_swap_accounting()
        .await
        .map_err(domain_error)?;
    ok(report.into())
}
