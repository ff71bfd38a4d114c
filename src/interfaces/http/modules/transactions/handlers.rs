//! Swap transaction handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{Duration, Utc};

use super::dto::{
    AdjustAmountRequest, CreateTransactionRequest, ProcessedTransactionDto, StuckParams,
    TotalAmountDto, TotalsParams, TransactionDto,
};
use crate::application::{OutboundDispatcher, SwapTransactionService};
use crate::domain::swap_transaction::AmountScope;
use crate::interfaces::http::common::{
    bad_request, domain_error, ok, ApiError, ApiResponse, ApiResult, ValidatedJson,
};

#[derive(Clone)]
pub struct TransactionAppState {
    pub service: Arc<SwapTransactionService>,
    pub outbound: OutboundDispatcher,
    pub stuck_threshold_minutes: i64,
    pub batch_size: u64,
}

#[utoipa::path(
    post,
    path = "/api/v1/transactions",
    tag = "Transactions",
    request_body = CreateTransactionRequest,
    responses(
        (status = 201, description = "Swap recorded as PENDING", body = ApiResponse<TransactionDto>),
        (status = 404, description = "Booking not found"),
        (status = 409, description = "Booking already has a transaction"),
        (status = 422, description = "Validation error")
    )
)]
pub async fn create_transaction(
    State(state): State<TransactionAppState>,
    ValidatedJson(request): ValidatedJson<CreateTransactionRequest>,
) -> Result<(StatusCode, Json<ApiResponse<TransactionDto>>), ApiError> {
    let committed = state
        .service
        .create(request.into())
        .await
        .map_err(domain_error)?;
    let tx = state.outbound.emit(committed);
    Ok((StatusCode::CREATED, Json(ApiResponse::success(tx.into()))))
}

#[utoipa::path(
    get,
    path = "/api/v1/transactions/{id}",
    tag = "Transactions",
    params(("id" = i32, Path, description = "Transaction id")),
    responses(
        (status = 200, description = "Transaction", body = ApiResponse<TransactionDto>),
        (status = 404, description = "Not found")
    )
)]
pub async fn get_transaction(
    State(state): State<TransactionAppState>,
    Path(id): Path<i32>,
) -> ApiResult<TransactionDto> {
    let tx = state.service.get(id).await.map_err(domain_error)?;
    ok(tx.into())
}

#[utoipa::path(
    get,
    path = "/api/v1/bookings/{id}/transaction",
    tag = "Transactions",
    params(("id" = i32, Path, description = "Booking id")),
    responses(
        (status = 200, description = "The booking's swap transaction", body = ApiResponse<TransactionDto>),
        (status = 404, description = "No transaction for this booking")
    )
)]
pub async fn get_booking_transaction(
    State(state): State<TransactionAppState>,
    Path(booking_id): Path<i32>,
) -> ApiResult<TransactionDto> {
    let tx = state
        .service
        .find_by_booking(booking_id)
        .await
        .map_err(domain_error)?;
    ok(tx.into())
}

#[utoipa::path(
    post,
    path = "/api/v1/transactions/{id}/process",
    tag = "Transactions",
    security(("api_key" = [])),
    params(("id" = i32, Path, description = "Transaction id")),
    responses(
        (status = 200, description = "Swap settled", body = ApiResponse<ProcessedTransactionDto>),
        (status = 404, description = "Not found"),
        (status = 409, description = "Transaction already settled")
    )
)]
pub async fn process_transaction(
    State(state): State<TransactionAppState>,
    Path(id): Path<i32>,
) -> ApiResult<ProcessedTransactionDto> {
    let committed = state.service.process(id).await.map_err(domain_error)?;
    ok(state.outbound.emit(committed).into())
}

#[utoipa::path(
    post,
    path = "/api/v1/transactions/{id}/complete",
    tag = "Transactions",
    security(("api_key" = [])),
    params(("id" = i32, Path, description = "Transaction id")),
    responses(
        (status = 200, description = "Swap marked SUCCESS", body = ApiResponse<ProcessedTransactionDto>),
        (status = 404, description = "Not found"),
        (status = 409, description = "Already completed or failed")
    )
)]
pub async fn complete_transaction(
    State(state): State<TransactionAppState>,
    Path(id): Path<i32>,
) -> ApiResult<ProcessedTransactionDto> {
    let committed = state.service.complete(id).await.map_err(domain_error)?;
    ok(state.outbound.emit(committed).into())
}

#[utoipa::path(
    post,
    path = "/api/v1/transactions/{id}/fail",
    tag = "Transactions",
    security(("api_key" = [])),
    params(("id" = i32, Path, description = "Transaction id")),
    responses(
        (status = 200, description = "Swap marked FAILED", body = ApiResponse<TransactionDto>),
        (status = 404, description = "Not found"),
        (status = 409, description = "Transaction already settled")
    )
)]
pub async fn fail_transaction(
    State(state): State<TransactionAppState>,
    Path(id): Path<i32>,
) -> ApiResult<TransactionDto> {
    let committed = state.service.fail(id).await.map_err(domain_error)?;
    ok(state.outbound.emit(committed).into())
}

#[utoipa::path(
    put,
    path = "/api/v1/transactions/{id}/amount",
    tag = "Transactions",
    security(("api_key" = [])),
    params(("id" = i32, Path, description = "Transaction id")),
    request_body = AdjustAmountRequest,
    responses(
        (status = 200, description = "Amount updated", body = ApiResponse<TransactionDto>),
        (status = 404, description = "Not found"),
        (status = 409, description = "Transaction already settled")
    )
)]
pub async fn adjust_amount(
    State(state): State<TransactionAppState>,
    Path(id): Path<i32>,
    ValidatedJson(request): ValidatedJson<AdjustAmountRequest>,
) -> ApiResult<TransactionDto> {
    let tx = state
        .service
        .adjust_amount(id, request.amount)
        .await
        .map_err(domain_error)?;
    ok(tx.into())
}

#[utoipa::path(
    get,
    path = "/api/v1/transactions/stuck",
    tag = "Transactions",
    params(StuckParams),
    responses(
        (status = 200, description = "PENDING swaps older than the threshold", body = ApiResponse<Vec<TransactionDto>>)
    )
)]
pub async fn stuck_transactions(
    State(state): State<TransactionAppState>,
    Query(params): Query<StuckParams>,
) -> ApiResult<Vec<TransactionDto>> {
    let minutes = params.threshold_minutes.unwrap_or(state.stuck_threshold_minutes);
    if minutes < 0 {
        return Err(bad_request("threshold_minutes must not be negative"));
    }
    let limit = params.limit.unwrap_or(state.batch_size).max(1);
    let stuck = state
        .service
        .find_stuck(Utc::now(), Duration::minutes(minutes), limit)
        .await
        .map_err(domain_error)?;
    ok(stuck.into_iter().map(TransactionDto::from).collect())
}

#[utoipa::path(
    get,
    path = "/api/v1/transactions/totals",
    tag = "Transactions",
    params(TotalsParams),
    responses(
        (status = 200, description = "Sum of successful swaps", body = ApiResponse<TotalAmountDto>),
        (status = 400, description = "Exactly one of driver_id or station_id is required")
    )
)]
pub async fn total_amount(
    State(state): State<TransactionAppState>,
    Query(params): Query<TotalsParams>,
) -> ApiResult<TotalAmountDto> {
    let scope = match (params.driver_id, params.station_id) {
        (Some(driver), None) => AmountScope::Driver(driver),
        (None, Some(station)) => AmountScope::Station(station),
        _ => return Err(bad_request("exactly one of driver_id or station_id is required")),
    };
    let total = state.service.total_amount(&scope).await.map_err(domain_error)?;
    let (scope, id) = match scope {
        AmountScope::Driver(id) => ("driver", id),
        AmountScope::Station(id) => ("station", id),
    };
    ok(TotalAmountDto {
        scope: scope.to_string(),
        id,
        total_amount: total,
    })
}

#[utoipa::path(
    get,
    path = "/api/v1/batteries/{battery_id}/history",
    tag = "Transactions",
    params(("battery_id" = String, Path, description = "Battery id")),
    responses(
        (status = 200, description = "Swaps that removed or installed the battery, newest first", body = ApiResponse<Vec<TransactionDto>>)
    )
)]
pub async fn battery_history(
    State(state): State<TransactionAppState>,
    Path(battery_id): Path<String>,
) -> ApiResult<Vec<TransactionDto>> {
    let history = state
        .service
        .battery_history(&battery_id)
        .await
        .map_err(domain_error)?;
    ok(history.into_iter().map(TransactionDto::from).collect())
}
