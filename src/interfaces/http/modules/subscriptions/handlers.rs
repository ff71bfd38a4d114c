//! Plan, subscription and user handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use super::dto::{
    CreatePlanRequest, ListPlansParams, PlanDto, SubscribeRequest, SubscriptionDto,
    SubscriptionStatsDto,
};
use crate::application::{OutboundDispatcher, SubscriptionService};
use crate::interfaces::http::common::{
    domain_error, ok, ApiError, ApiResponse, ApiResult, ValidatedJson,
};

#[derive(Clone)]
pub struct SubscriptionAppState {
    pub service: Arc<SubscriptionService>,
    pub outbound: OutboundDispatcher,
}

// ── Plans ──────────────────────────────────────────────────────

#[utoipa::path(
    get,
    path = "/api/v1/plans",
    tag = "Plans",
    params(ListPlansParams),
    responses(
        (status = 200, description = "Package plans", body = ApiResponse<Vec<PlanDto>>)
    )
)]
pub async fn list_plans(
    State(state): State<SubscriptionAppState>,
    Query(params): Query<ListPlansParams>,
) -> ApiResult<Vec<PlanDto>> {
    let plans = state
        .service
        .list_plans(params.include_inactive)
        .await
        .map_err(domain_error)?;
    ok(plans.into_iter().map(PlanDto::from).collect())
}

#[utoipa::path(
    post,
    path = "/api/v1/plans",
    tag = "Plans",
    security(("api_key" = [])),
    request_body = CreatePlanRequest,
    responses(
        (status = 201, description = "Plan created", body = ApiResponse<PlanDto>),
        (status = 401, description = "Missing or invalid operator key"),
        (status = 422, description = "Validation error")
    )
)]
pub async fn create_plan(
    State(state): State<SubscriptionAppState>,
    ValidatedJson(request): ValidatedJson<CreatePlanRequest>,
) -> Result<(StatusCode, Json<ApiResponse<PlanDto>>), ApiError> {
    let plan = state
        .service
        .create_plan(request.into())
        .await
        .map_err(domain_error)?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(plan.into()))))
}

#[utoipa::path(
    post,
    path = "/api/v1/plans/{id}/deactivate",
    tag = "Plans",
    security(("api_key" = [])),
    params(("id" = i32, Path, description = "Plan id")),
    responses(
        (status = 200, description = "Plan closed to new subscriptions", body = ApiResponse<PlanDto>),
        (status = 404, description = "Not found")
    )
)]
pub async fn deactivate_plan(
    State(state): State<SubscriptionAppState>,
    Path(id): Path<i32>,
) -> ApiResult<PlanDto> {
    let plan = state.service.deactivate_plan(id).await.map_err(domain_error)?;
    ok(plan.into())
}

// ── Subscriptions ──────────────────────────────────────────────

#[utoipa::path(
    post,
    path = "/api/v1/subscriptions",
    tag = "Subscriptions",
    request_body = SubscribeRequest,
    responses(
        (status = 201, description = "Subscription created", body = ApiResponse<SubscriptionDto>),
        (status = 404, description = "Plan not found"),
        (status = 409, description = "User already has an active subscription")
    )
)]
pub async fn subscribe(
    State(state): State<SubscriptionAppState>,
    ValidatedJson(request): ValidatedJson<SubscribeRequest>,
) -> Result<(StatusCode, Json<ApiResponse<SubscriptionDto>>), ApiError> {
    let committed = state
        .service
        .subscribe(&request.user_id, request.plan_id)
        .await
        .map_err(domain_error)?;
    let subscription = state.outbound.emit(committed);
    Ok((StatusCode::CREATED, Json(ApiResponse::success(subscription.into()))))
}

#[utoipa::path(
    get,
    path = "/api/v1/subscriptions/{id}",
    tag = "Subscriptions",
    params(("id" = i32, Path, description = "Subscription id")),
    responses(
        (status = 200, description = "Subscription", body = ApiResponse<SubscriptionDto>),
        (status = 404, description = "Not found")
    )
)]
pub async fn get_subscription(
    State(state): State<SubscriptionAppState>,
    Path(id): Path<i32>,
) -> ApiResult<SubscriptionDto> {
    let subscription = state.service.get(id).await.map_err(domain_error)?;
    ok(subscription.into())
}

#[utoipa::path(
    post,
    path = "/api/v1/subscriptions/{id}/cancel",
    tag = "Subscriptions",
    params(("id" = i32, Path, description = "Subscription id")),
    responses(
        (status = 200, description = "Subscription cancelled", body = ApiResponse<SubscriptionDto>),
        (status = 404, description = "Not found"),
        (status = 409, description = "Subscription is not ACTIVE")
    )
)]
pub async fn cancel_subscription(
    State(state): State<SubscriptionAppState>,
    Path(id): Path<i32>,
) -> ApiResult<SubscriptionDto> {
    let committed = state.service.cancel(id).await.map_err(domain_error)?;
    ok(state.outbound.emit(committed).into())
}

// ── Users ──────────────────────────────────────────────────────

#[utoipa::path(
    get,
    path = "/api/v1/users/{user_id}/subscription-stats",
    tag = "Subscriptions",
    params(("user_id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "Usage of the active subscription", body = ApiResponse<SubscriptionStatsDto>),
        (status = 409, description = "User has no active subscription")
    )
)]
pub async fn subscription_stats(
    State(state): State<SubscriptionAppState>,
    Path(user_id): Path<String>,
) -> ApiResult<SubscriptionStatsDto> {
    let stats = state.service.stats(&user_id).await.map_err(domain_error)?;
    ok(stats.into())
}

#[utoipa::path(
    get,
    path = "/api/v1/users/{user_id}/subscriptions",
    tag = "Subscriptions",
    params(("user_id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "All subscriptions of the user, newest first", body = ApiResponse<Vec<SubscriptionDto>>)
    )
)]
pub async fn subscription_history(
    State(state): State<SubscriptionAppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Vec<SubscriptionDto>> {
    let history = state.service.history(&user_id).await.map_err(domain_error)?;
    ok(history.into_iter().map(SubscriptionDto::from).collect())
}
