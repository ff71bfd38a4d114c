//! Booking handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;

use super::dto::{
    BookingDto, BookingSearchParams, CancelBookingRequest, CompleteBookingRequest,
    CreateBookingRequest, OverdueParams,
};
use crate::application::{BookingService, OutboundDispatcher};
use crate::domain::booking::{BookingFilter, BookingStatus};
use crate::interfaces::http::common::{
    bad_request, domain_error, ok, ApiError, ApiResponse, ApiResult, PaginatedResponse,
    ValidatedJson,
};
use crate::shared::PaginationParams;

const DEFAULT_OVERDUE_LIMIT: u64 = 100;

#[derive(Clone)]
pub struct BookingAppState {
    pub service: Arc<BookingService>,
    pub outbound: OutboundDispatcher,
}

#[utoipa::path(
    post,
    path = "/api/v1/bookings",
    tag = "Bookings",
    request_body = CreateBookingRequest,
    responses(
        (status = 201, description = "Booking created", body = ApiResponse<BookingDto>),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "Pending booking exists, no active subscription or quota exhausted"),
        (status = 422, description = "Validation error")
    )
)]
pub async fn create_booking(
    State(state): State<BookingAppState>,
    ValidatedJson(request): ValidatedJson<CreateBookingRequest>,
) -> Result<(StatusCode, Json<ApiResponse<BookingDto>>), ApiError> {
    let committed = state
        .service
        .create(request.into())
        .await
        .map_err(domain_error)?;
    let booking = state.outbound.emit(committed);
    Ok((StatusCode::CREATED, Json(ApiResponse::success(booking.into()))))
}

#[utoipa::path(
    get,
    path = "/api/v1/bookings",
    tag = "Bookings",
    params(BookingSearchParams),
    responses(
        (status = 200, description = "Bookings page", body = PaginatedResponse<BookingDto>),
        (status = 400, description = "Unknown status")
    )
)]
pub async fn search_bookings(
    State(state): State<BookingAppState>,
    Query(params): Query<BookingSearchParams>,
) -> Result<Json<PaginatedResponse<BookingDto>>, ApiError> {
    let status = match params.status.as_deref() {
        Some(s) => Some(
            BookingStatus::from_str(s).ok_or_else(|| bad_request(format!("unknown status '{}'", s)))?,
        ),
        None => None,
    };
    let filter = BookingFilter {
        driver_id: params.driver_id,
        station_id: params.station_id,
        status,
        from_time: params.from,
        to_time: params.to,
    };
    let page = state
        .service
        .search(&filter, PaginationParams::normalized(params.page, params.limit))
        .await
        .map_err(domain_error)?;
    Ok(Json(PaginatedResponse::from_result(page, BookingDto::from)))
}

#[utoipa::path(
    get,
    path = "/api/v1/bookings/upcoming",
    tag = "Bookings",
    responses(
        (status = 200, description = "Confirmed bookings in the next 24 hours", body = ApiResponse<Vec<BookingDto>>)
    )
)]
pub async fn upcoming_bookings(State(state): State<BookingAppState>) -> ApiResult<Vec<BookingDto>> {
    let bookings = state.service.upcoming(Utc::now()).await.map_err(domain_error)?;
    ok(bookings.into_iter().map(BookingDto::from).collect())
}

#[utoipa::path(
    get,
    path = "/api/v1/bookings/overdue",
    tag = "Bookings",
    params(OverdueParams),
    responses(
        (status = 200, description = "Open bookings past their slot", body = ApiResponse<Vec<BookingDto>>)
    )
)]
pub async fn overdue_bookings(
    State(state): State<BookingAppState>,
    Query(params): Query<OverdueParams>,
) -> ApiResult<Vec<BookingDto>> {
    let limit = params.limit.unwrap_or(DEFAULT_OVERDUE_LIMIT).clamp(1, 1_000);
    let bookings = state
        .service
        .overdue(Utc::now(), limit)
        .await
        .map_err(domain_error)?;
    ok(bookings.into_iter().map(BookingDto::from).collect())
}

#[utoipa::path(
    get,
    path = "/api/v1/bookings/{id}",
    tag = "Bookings",
    params(("id" = i32, Path, description = "Booking id")),
    responses(
        (status = 200, description = "Booking", body = ApiResponse<BookingDto>),
        (status = 404, description = "Not found")
    )
)]
pub async fn get_booking(
    State(state): State<BookingAppState>,
    Path(id): Path<i32>,
) -> ApiResult<BookingDto> {
    let booking = state.service.get(id).await.map_err(domain_error)?;
    ok(booking.into())
}

#[utoipa::path(
    post,
    path = "/api/v1/bookings/{id}/confirm",
    tag = "Bookings",
    params(("id" = i32, Path, description = "Booking id")),
    responses(
        (status = 200, description = "Booking confirmed", body = ApiResponse<BookingDto>),
        (status = 404, description = "Not found"),
        (status = 409, description = "Booking is not PENDING")
    )
)]
pub async fn confirm_booking(
    State(state): State<BookingAppState>,
    Path(id): Path<i32>,
) -> ApiResult<BookingDto> {
    let committed = state.service.confirm(id).await.map_err(domain_error)?;
    ok(state.outbound.emit(committed).into())
}

#[utoipa::path(
    post,
    path = "/api/v1/bookings/{id}/cancel",
    tag = "Bookings",
    params(("id" = i32, Path, description = "Booking id")),
    request_body = CancelBookingRequest,
    responses(
        (status = 200, description = "Booking cancelled", body = ApiResponse<BookingDto>),
        (status = 404, description = "Not found"),
        (status = 409, description = "Booking already closed")
    )
)]
pub async fn cancel_booking(
    State(state): State<BookingAppState>,
    Path(id): Path<i32>,
    ValidatedJson(request): ValidatedJson<CancelBookingRequest>,
) -> ApiResult<BookingDto> {
    let committed = state
        .service
        .cancel(id, &request.reason)
        .await
        .map_err(domain_error)?;
    ok(state.outbound.emit(committed).into())
}

#[utoipa::path(
    post,
    path = "/api/v1/bookings/{id}/complete",
    tag = "Bookings",
    params(("id" = i32, Path, description = "Booking id")),
    request_body = CompleteBookingRequest,
    responses(
        (status = 200, description = "Booking completed", body = ApiResponse<BookingDto>),
        (status = 404, description = "Not found"),
        (status = 409, description = "Booking is not CONFIRM")
    )
)]
pub async fn complete_booking(
    State(state): State<BookingAppState>,
    Path(id): Path<i32>,
    ValidatedJson(request): ValidatedJson<CompleteBookingRequest>,
) -> ApiResult<BookingDto> {
    let committed = state
        .service
        .complete(id, &request.payment_id)
        .await
        .map_err(domain_error)?;
    ok(state.outbound.emit(committed).into())
}

#[utoipa::path(
    post,
    path = "/api/v1/bookings/{id}/payment",
    tag = "Bookings",
    params(("id" = i32, Path, description = "Booking id")),
    responses(
        (status = 200, description = "Payment recorded (idempotent)", body = ApiResponse<BookingDto>),
        (status = 404, description = "Not found")
    )
)]
pub async fn confirm_payment(
    State(state): State<BookingAppState>,
    Path(id): Path<i32>,
) -> ApiResult<BookingDto> {
    let committed = state.service.confirm_payment(id).await.map_err(domain_error)?;
    ok(state.outbound.emit(committed).into())
}

#[utoipa::path(
    delete,
    path = "/api/v1/bookings/{id}",
    tag = "Bookings",
    security(("api_key" = [])),
    params(("id" = i32, Path, description = "Booking id")),
    responses(
        (status = 200, description = "Booking deleted"),
        (status = 401, description = "Missing or invalid operator key"),
        (status = 404, description = "Not found")
    )
)]
pub async fn delete_booking(
    State(state): State<BookingAppState>,
    Path(id): Path<i32>,
) -> ApiResult<()> {
    let committed = state.service.delete(id).await.map_err(domain_error)?;
    state.outbound.emit(committed);
    ok(())
}
