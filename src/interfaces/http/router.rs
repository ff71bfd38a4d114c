//! API router with Swagger UI

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::FromRef,
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use sea_orm::DatabaseConnection;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use super::middleware::{operator_auth_middleware, OperatorAuth};
use super::modules::health::{self, HealthState};
use super::modules::metrics::{http_metrics_middleware, prometheus_metrics, MetricsState};
use super::modules::request_id::request_id_middleware;
use super::modules::{bookings, reconciliation, subscriptions, transactions};
use crate::application::{
    BookingService, OutboundDispatcher, ReconciliationJobs, SharedEventBus, SubscriptionService,
    SwapTransactionService,
};
use crate::interfaces::http::common::{PaginatedResponse, PaginationQuery};
use crate::interfaces::ws::{ws_notifications_handler, NotificationState};

/// Everything the routes need. Handlers extract their own slice via `FromRef`.
#[derive(Clone)]
pub struct ApiState {
    pub bookings: Arc<BookingService>,
    pub transactions: Arc<SwapTransactionService>,
    pub subscriptions: Arc<SubscriptionService>,
    pub reconciliation: Arc<ReconciliationJobs>,
    pub outbound: OutboundDispatcher,
    pub event_bus: SharedEventBus,
    pub operator_auth: OperatorAuth,
    /// None when running on in-memory storage
    pub db: Option<DatabaseConnection>,
    pub started_at: Arc<Instant>,
}

impl FromRef<ApiState> for bookings::BookingAppState {
    fn from_ref(s: &ApiState) -> Self {
        bookings::BookingAppState {
            service: Arc::clone(&s.bookings),
            outbound: s.outbound.clone(),
        }
    }
}

impl FromRef<ApiState> for transactions::TransactionAppState {
    fn from_ref(s: &ApiState) -> Self {
        let cfg = s.reconciliation.config();
        transactions::TransactionAppState {
            service: Arc::clone(&s.transactions),
            outbound: s.outbound.clone(),
            stuck_threshold_minutes: cfg.stuck_threshold_minutes,
            batch_size: cfg.batch_size,
        }
    }
}

impl FromRef<ApiState> for subscriptions::SubscriptionAppState {
    fn from_ref(s: &ApiState) -> Self {
        subscriptions::SubscriptionAppState {
            service: Arc::clone(&s.subscriptions),
            outbound: s.outbound.clone(),
        }
    }
}

impl FromRef<ApiState> for reconciliation::ReconciliationAppState {
    fn from_ref(s: &ApiState) -> Self {
        reconciliation::ReconciliationAppState {
            jobs: Arc::clone(&s.reconciliation),
            outbound: s.outbound.clone(),
        }
    }
}

impl FromRef<ApiState> for HealthState {
    fn from_ref(s: &ApiState) -> Self {
        HealthState {
            db: s.db.clone(),
            event_bus: s.event_bus.clone(),
            started_at: Arc::clone(&s.started_at),
        }
    }
}

impl FromRef<ApiState> for NotificationState {
    fn from_ref(s: &ApiState) -> Self {
        NotificationState {
            event_bus: s.event_bus.clone(),
        }
    }
}

/// Security scheme modifier for OpenAPI
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "api_key",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("X-API-Key"))),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        // Bookings
        bookings::create_booking,
        bookings::search_bookings,
        bookings::upcoming_bookings,
        bookings::overdue_bookings,
        bookings::get_booking,
        bookings::confirm_booking,
        bookings::cancel_booking,
        bookings::complete_booking,
        bookings::confirm_payment,
        bookings::delete_booking,
        // Transactions
        transactions::create_transaction,
        transactions::get_transaction,
        transactions::get_booking_transaction,
        transactions::process_transaction,
        transactions::complete_transaction,
        transactions::fail_transaction,
        transactions::adjust_amount,
        transactions::stuck_transactions,
        transactions::total_amount,
        transactions::battery_history,
        // Plans & subscriptions
        subscriptions::list_plans,
        subscriptions::create_plan,
        subscriptions::deactivate_plan,
        subscriptions::subscribe,
        subscriptions::get_subscription,
        subscriptions::cancel_subscription,
        subscriptions::subscription_stats,
        subscriptions::subscription_history,
        // Reconciliation
        reconciliation::expire_subscriptions,
        reconciliation::stuck_transactions,
        reconciliation::overdue_bookings,
        reconciliation::used_swap_accounting,
    ),
    components(
        schemas(
            PaginationQuery,
            PaginatedResponse<bookings::BookingDto>,
            health::HealthResponse,
            health::ComponentHealth,
            bookings::BookingDto,
            bookings::PaymentTypeDto,
            bookings::CreateBookingRequest,
            bookings::CancelBookingRequest,
            bookings::CompleteBookingRequest,
            transactions::TransactionDto,
            transactions::ProcessedTransactionDto,
            transactions::CreateTransactionRequest,
            transactions::AdjustAmountRequest,
            transactions::TotalAmountDto,
            subscriptions::PlanDto,
            subscriptions::PlanTypeDto,
            subscriptions::CreatePlanRequest,
            subscriptions::SubscriptionDto,
            subscriptions::SubscribeRequest,
            subscriptions::SubscriptionStatsDto,
            reconciliation::ExpiryReportDto,
            reconciliation::StuckReportDto,
            reconciliation::OverdueReportDto,
            reconciliation::UsedSwapMismatchDto,
            reconciliation::UsedSwapReportDto,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Service health"),
        (name = "Bookings", description = "Swap slot reservations: create, confirm, cancel, complete, pay"),
        (name = "Transactions", description = "Battery swap ledger, totals and battery history"),
        (name = "Plans", description = "Package plan catalog"),
        (name = "Subscriptions", description = "Driver package subscriptions and quota usage"),
        (name = "Reconciliation", description = "On-demand expiry, stuck-swap and accounting sweeps"),
    ),
    info(
        title = "Battery Swap Service API",
        version = "1.0.0",
        description = "Booking, swap transaction and subscription lifecycle for battery-swap stations",
        license(name = "MIT")
    )
)]
pub struct ApiDoc;

/// Create the API router with all routes
pub fn create_api_router(state: ApiState, prometheus: Option<PrometheusHandle>) -> Router {
    let operator = middleware::from_fn_with_state(state.operator_auth.clone(), operator_auth_middleware);

    if !state.operator_auth.keys.is_enabled() {
        tracing::warn!("⚠️ No operator API keys configured, operator routes are unprotected");
    }

    let booking_routes = Router::new()
        .route("/", get(bookings::search_bookings).post(bookings::create_booking))
        .route("/upcoming", get(bookings::upcoming_bookings))
        .route("/overdue", get(bookings::overdue_bookings))
        .route(
            "/{id}",
            get(bookings::get_booking)
                .merge(delete(bookings::delete_booking).route_layer(operator.clone())),
        )
        .route("/{id}/confirm", post(bookings::confirm_booking))
        .route("/{id}/cancel", post(bookings::cancel_booking))
        .route("/{id}/complete", post(bookings::complete_booking))
        .route("/{id}/payment", post(bookings::confirm_payment))
        .route("/{id}/transaction", get(transactions::get_booking_transaction));

    let transaction_operator_routes = Router::new()
        .route("/{id}/process", post(transactions::process_transaction))
        .route("/{id}/complete", post(transactions::complete_transaction))
        .route("/{id}/fail", post(transactions::fail_transaction))
        .route("/{id}/amount", put(transactions::adjust_amount))
        .route_layer(operator.clone());

    let transaction_routes = Router::new()
        .route("/", post(transactions::create_transaction))
        .route("/stuck", get(transactions::stuck_transactions))
        .route("/totals", get(transactions::total_amount))
        .route("/{id}", get(transactions::get_transaction))
        .merge(transaction_operator_routes);

    let plan_routes = Router::new()
        .route(
            "/",
            get(subscriptions::list_plans)
                .merge(post(subscriptions::create_plan).route_layer(operator.clone())),
        )
        .route(
            "/{id}/deactivate",
            post(subscriptions::deactivate_plan).route_layer(operator.clone()),
        );

    let subscription_routes = Router::new()
        .route("/", post(subscriptions::subscribe))
        .route("/{id}", get(subscriptions::get_subscription))
        .route("/{id}/cancel", post(subscriptions::cancel_subscription));

    let user_routes = Router::new()
        .route("/{user_id}/subscription-stats", get(subscriptions::subscription_stats))
        .route("/{user_id}/subscriptions", get(subscriptions::subscription_history));

    let reconciliation_routes = Router::new()
        .route("/expire-subscriptions", post(reconciliation::expire_subscriptions))
        .route("/stuck-transactions", post(reconciliation::stuck_transactions))
        .route("/overdue-bookings", post(reconciliation::overdue_bookings))
        .route("/used-swaps", post(reconciliation::used_swap_accounting))
        .route_layer(operator);

    let swagger_routes = SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi());

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut router = Router::new()
        .merge(swagger_routes)
        .route("/health", get(health::health_check))
        .nest("/api/v1/bookings", booking_routes)
        .nest("/api/v1/transactions", transaction_routes)
        .route("/api/v1/batteries/{battery_id}/history", get(transactions::battery_history))
        .nest("/api/v1/plans", plan_routes)
        .nest("/api/v1/subscriptions", subscription_routes)
        .nest("/api/v1/users", user_routes)
        .nest("/api/v1/reconciliation", reconciliation_routes)
        .route("/api/v1/events/ws", get(ws_notifications_handler))
        .with_state(state);

    if let Some(handle) = prometheus {
        router = router.merge(
            Router::new()
                .route("/metrics", get(prometheus_metrics))
                .with_state(MetricsState { handle }),
        );
    }

    router
        .layer(middleware::from_fn(http_metrics_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::events::EventSink;
    use crate::application::{create_event_bus, OutboundDispatcher};
    use crate::config::ReconciliationConfig;
    use crate::domain::RepositoryProvider;
    use crate::infrastructure::crypto::{hash_api_key, ApiKeySet};
    use crate::infrastructure::storage::InMemoryRepositoryProvider;
    use crate::shared::shutdown::ShutdownSignal;
    use crate::shared::RetryConfig;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};

    const OPERATOR_KEY: &str = "swp_test_operator_key";

    fn test_state() -> ApiState {
        let repos: Arc<dyn RepositoryProvider> = Arc::new(InMemoryRepositoryProvider::new());
        let subscriptions = Arc::new(SubscriptionService::new(repos.clone()));
        let bookings = Arc::new(BookingService::new(repos.clone(), subscriptions.clone()));
        let transactions = Arc::new(SwapTransactionService::new(repos.clone(), subscriptions.clone()));
        let reconciliation = Arc::new(ReconciliationJobs::new(
            repos,
            bookings.clone(),
            transactions.clone(),
            subscriptions.clone(),
            ReconciliationConfig::default(),
        ));
        let event_bus = create_event_bus();
        let (outbound, _worker) = OutboundDispatcher::start(
            vec![event_bus.clone() as Arc<dyn EventSink>],
            RetryConfig::default(),
            ShutdownSignal::new(),
        );
        ApiState {
            bookings,
            transactions,
            subscriptions,
            reconciliation,
            outbound,
            event_bus,
            operator_auth: OperatorAuth::new(ApiKeySet::new(&[hash_api_key(OPERATOR_KEY)])),
            db: None,
            started_at: Arc::new(Instant::now()),
        }
    }

    async fn send(
        router: &Router,
        method: &str,
        uri: &str,
        body: Option<Value>,
        operator: bool,
    ) -> (StatusCode, Value) {
        use tower::Service;
        let mut builder = Request::builder().method(method).uri(uri);
        if operator {
            builder = builder.header("x-api-key", OPERATOR_KEY);
        }
        let req = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let resp = router.clone().into_service().call(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    fn booking_body(driver: &str, package_id: Option<i64>) -> Value {
        json!({
            "driver_id": driver,
            "station_id": "ST-01",
            "battery_model_id": "BM-48V",
            "scheduled_time": (chrono::Utc::now() + chrono::Duration::hours(2)).to_rfc3339(),
            "payment_type": if package_id.is_some() { "PACKAGE" } else { "PER_SWAP" },
            "package_id": package_id,
        })
    }

    #[tokio::test]
    async fn package_swap_end_to_end() {
        let router = create_api_router(test_state(), None);

        let (status, plan) = send(
            &router,
            "POST",
            "/api/v1/plans",
            Some(json!({"name": "Commuter", "max_swap_per_month": 2, "price": 299000, "plan_type": "MONTHLY"})),
            true,
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let plan_id = plan["data"]["id"].as_i64().unwrap();

        let (status, sub) = send(
            &router,
            "POST",
            "/api/v1/subscriptions",
            Some(json!({"user_id": "driver-1", "plan_id": plan_id})),
            false,
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let sub_id = sub["data"]["id"].as_i64().unwrap();

        let (status, booking) = send(
            &router,
            "POST",
            "/api/v1/bookings",
            Some(booking_body("driver-1", Some(sub_id))),
            false,
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(booking["data"]["status"], "PENDING");
        let booking_id = booking["data"]["id"].as_i64().unwrap();

        let (status, _) = send(&router, "POST", &format!("/api/v1/bookings/{}/confirm", booking_id), None, false).await;
        assert_eq!(status, StatusCode::OK);

        let (status, tx) = send(
            &router,
            "POST",
            "/api/v1/transactions",
            Some(json!({
                "booking_id": booking_id,
                "station_id": "ST-01",
                "driver_id": "driver-1",
                "old_battery_id": "BAT-1",
                "new_battery_id": "BAT-2",
                "amount": 15000,
                "payment_method": "PACKAGE"
            })),
            false,
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let tx_id = tx["data"]["id"].as_i64().unwrap();

        let (status, done) = send(&router, "POST", &format!("/api/v1/transactions/{}/complete", tx_id), None, true).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(done["data"]["transaction"]["status"], "SUCCESS");
        assert!(done["data"]["quota_breach"].is_null());

        let (status, again) = send(&router, "POST", &format!("/api/v1/transactions/{}/complete", tx_id), None, true).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(again["code"], "already_completed");

        let (_, stats) = send(&router, "GET", "/api/v1/users/driver-1/subscription-stats", None, false).await;
        assert_eq!(stats["data"]["used_swaps"], 1);
        assert_eq!(stats["data"]["remaining_swaps"], 1);

        let (_, history) = send(&router, "GET", "/api/v1/batteries/BAT-2/history", None, false).await;
        assert_eq!(history["data"].as_array().unwrap().len(), 1);

        let (_, linked) = send(&router, "GET", &format!("/api/v1/bookings/{}/transaction", booking_id), None, false).await;
        assert_eq!(linked["data"]["id"].as_i64(), Some(tx_id));
    }

    #[tokio::test]
    async fn second_pending_booking_is_conflict() {
        let router = create_api_router(test_state(), None);
        let (status, _) = send(&router, "POST", "/api/v1/bookings", Some(booking_body("driver-7", None)), false).await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = send(&router, "POST", "/api/v1/bookings", Some(booking_body("driver-7", None)), false).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], "driver_has_pending_booking");
    }

    #[tokio::test]
    async fn operator_routes_require_key() {
        let router = create_api_router(test_state(), None);
        let plan = json!({"name": "Fleet", "max_swap_per_month": 30, "price": 900000, "plan_type": "YEARLY"});

        let (status, body) = send(&router, "POST", "/api/v1/plans", Some(plan.clone()), false).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "unauthorized");

        let (status, _) = send(&router, "POST", "/api/v1/reconciliation/used-swaps", None, false).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(&router, "POST", "/api/v1/plans", Some(plan), true).await;
        assert_eq!(status, StatusCode::CREATED);

        // Public half of a shared path stays open.
        let (status, plans) = send(&router, "GET", "/api/v1/plans", None, false).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(plans["data"].as_array().unwrap().len(), 1);

        let (status, report) = send(&router, "POST", "/api/v1/reconciliation/used-swaps", None, true).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["data"]["checked"], 0);
    }

    #[tokio::test]
    async fn invalid_bodies_and_queries() {
        let router = create_api_router(test_state(), None);

        let mut body = booking_body("", None);
        body["driver_id"] = json!("");
        let (status, _) = send(&router, "POST", "/api/v1/bookings", Some(body), false).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, _) = send(&router, "GET", "/api/v1/bookings?status=LOST", None, false).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&router, "GET", "/api/v1/transactions/totals", None, false).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(&router, "GET", "/api/v1/bookings/999", None, false).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "not_found");
    }

    #[tokio::test]
    async fn search_paginates_and_payment_is_idempotent() {
        let router = create_api_router(test_state(), None);
        for driver in ["d-1", "d-2", "d-3"] {
            send(&router, "POST", "/api/v1/bookings", Some(booking_body(driver, None)), false).await;
        }

        let (status, page) = send(&router, "GET", "/api/v1/bookings?limit=2&page=1", None, false).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["total"], 3);
        assert_eq!(page["total_pages"], 2);
        assert_eq!(page["items"].as_array().unwrap().len(), 2);

        let (_, filtered) = send(&router, "GET", "/api/v1/bookings?driver_id=d-2", None, false).await;
        assert_eq!(filtered["total"], 1);
        let id = filtered["items"][0]["id"].as_i64().unwrap();

        for _ in 0..2 {
            let (status, paid) = send(&router, "POST", &format!("/api/v1/bookings/{}/payment", id), None, false).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(paid["data"]["is_paid"], true);
        }
    }

    #[tokio::test]
    async fn events_reach_the_bus_and_health_reports_in_memory() {
        let state = test_state();
        let mut events = state.event_bus.subscribe();
        let router = create_api_router(state, None);

        send(&router, "POST", "/api/v1/bookings", Some(booking_body("driver-9", None)), false).await;
        let message = tokio::time::timeout(std::time::Duration::from_secs(2), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(message.event.event_type(), "booking_created");
        assert_eq!(message.event.driver_id(), "driver-9");

        let (status, health) = send(&router, "GET", "/health", None, false).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(health["database"]["status"], "in_memory");
    }

    #[tokio::test]
    async fn request_id_is_echoed() {
        use tower::Service;
        let router = create_api_router(test_state(), None);
        let req = Request::builder()
            .uri("/health")
            .header("x-request-id", "req-42")
            .body(Body::empty())
            .unwrap();
        let resp = router.into_service().call(req).await.unwrap();
        assert_eq!(resp.headers()["x-request-id"], "req-42");
    }
}
