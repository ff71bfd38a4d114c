//! Reusable swap service runtime.
//!
//! Provides [`ServerHandle`] that encapsulates the full server lifecycle:
//! database init, migrations, lifecycle services, outbound event delivery,
//! reconciliation tasks, REST API, metrics, and graceful shutdown.

use std::sync::{Arc, OnceLock};
use std::time::Instant;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use sea_orm::DatabaseConnection;
use sea_orm_migration::MigratorTrait;
use tracing::{error, info, warn};

use crate::application::services::start_reconciliation_tasks;
use crate::application::{
    create_event_bus, BookingService, EventSink, OutboundDispatcher, ReconciliationJobs,
    SharedEventBus, SubscriptionService, SwapTransactionService,
};
use crate::config::AppConfig;
use crate::domain::RepositoryProvider;
use crate::infrastructure::crypto::ApiKeySet;
use crate::infrastructure::database::migrator::Migrator;
use crate::infrastructure::{init_database, DatabaseConfig, SeaOrmRepositoryProvider};
use crate::interfaces::http::middleware::OperatorAuth;
use crate::interfaces::http::{create_api_router, ApiState};
use crate::shared::errors::AppError;
use crate::shared::shutdown::{ShutdownCoordinator, ShutdownSignal};

// ── Options ────────────────────────────────────────────────────────

/// Options for starting the swap service.
pub struct ServerOptions {
    /// Application configuration.
    pub config: AppConfig,
    /// Run database migrations on startup (default: true).
    pub auto_migrate: bool,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            config: AppConfig::default(),
            auto_migrate: true,
        }
    }
}

// ── ServerHandle ───────────────────────────────────────────────────

/// Handle to a running swap service.
///
/// # Examples
///
/// ```rust,no_run
/// use swap_service::server::{ServerHandle, ServerOptions};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let handle = ServerHandle::start(ServerOptions::default()).await?;
///     // ... wait for shutdown signal ...
///     handle.shutdown().await;
///     Ok(())
/// }
/// ```
pub struct ServerHandle {
    /// Shared event bus feeding `/api/v1/events/ws`.
    pub event_bus: SharedEventBus,
    /// Repository provider for data access.
    pub repos: Arc<dyn RepositoryProvider>,
    /// The configuration the server was started with.
    pub config: AppConfig,
    /// API port the server is listening on.
    pub api_port: u16,

    db: DatabaseConnection,
    shutdown: ShutdownCoordinator,
    api_task: tokio::task::JoinHandle<()>,
    outbound_task: tokio::task::JoinHandle<()>,
}

impl ServerHandle {
    /// Start the swap service with the given options.
    ///
    /// This will:
    /// 1. Install Prometheus metrics recorder
    /// 2. Connect to database and run migrations
    /// 3. Start the outbound dispatcher and reconciliation tasks
    /// 4. Start REST API server (with Swagger UI)
    pub async fn start(opts: ServerOptions) -> Result<Self, AppError> {
        let app_cfg = opts.config;

        info!("Starting battery swap service...");

        let prometheus_handle = prometheus_handle();

        // ── Database ───────────────────────────────────────────
        let db_config = DatabaseConfig::from(&app_cfg.database);
        ensure_sqlite_dir(&db_config.url);
        info!("Database: {}", db_config.url);

        let db = init_database(&db_config).await?;

        if opts.auto_migrate {
            info!("Running database migrations...");
            Migrator::up(&db, None).await?;
            info!("Migrations completed");
        }

        // ── Repositories & Services ────────────────────────────
        let repos: Arc<dyn RepositoryProvider> =
            Arc::new(SeaOrmRepositoryProvider::new(db.clone()));
        let subscriptions = Arc::new(SubscriptionService::new(repos.clone()));
        let bookings = Arc::new(BookingService::new(repos.clone(), subscriptions.clone()));
        let transactions = Arc::new(SwapTransactionService::new(
            repos.clone(),
            subscriptions.clone(),
        ));
        let reconciliation = Arc::new(ReconciliationJobs::new(
            repos.clone(),
            bookings.clone(),
            transactions.clone(),
            subscriptions.clone(),
            app_cfg.reconciliation.clone(),
        ));

        // ── Shutdown coordinator ───────────────────────────────
        let shutdown = ShutdownCoordinator::new(app_cfg.server.shutdown_timeout);
        let shutdown_signal = shutdown.signal();

        // ── Event Bus & outbound delivery ──────────────────────
        let event_bus = create_event_bus();
        info!("🔔 Event bus initialized for real-time notifications");

        let sinks = vec![event_bus.clone() as Arc<dyn EventSink>];
        let (outbound, outbound_task) = OutboundDispatcher::start(
            sinks,
            app_cfg.outbound.retry_config(),
            shutdown_signal.clone(),
        );

        // ── Background tasks ───────────────────────────────────
        start_reconciliation_tasks(reconciliation.clone(), outbound.clone(), shutdown_signal.clone());

        // ── REST API server ────────────────────────────────────
        let operator_auth = OperatorAuth::new(ApiKeySet::new(&app_cfg.security.api_key_hashes));
        let state = ApiState {
            bookings,
            transactions,
            subscriptions,
            reconciliation,
            outbound,
            event_bus: event_bus.clone(),
            operator_auth,
            db: Some(db.clone()),
            started_at: Arc::new(Instant::now()),
        };
        let api_router = create_api_router(state, Some(prometheus_handle));

        let api_port = app_cfg.server.api_port;
        let api_addr = format!("{}:{}", app_cfg.server.api_host, api_port);
        let listener = tokio::net::TcpListener::bind(&api_addr).await?;
        info!("REST API server listening on http://{}", api_addr);
        info!("Swagger UI available at http://{}/docs/", api_addr);

        let api_shutdown = shutdown_signal.clone();
        let api_server = axum::serve(
            listener,
            api_router.into_make_service_with_connect_info::<std::net::SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            api_shutdown.wait().await;
            info!("🛑 REST API server received shutdown signal");
        });

        info!("🚀 Swap service started.");

        let api_task = tokio::spawn(async move {
            if let Err(e) = api_server.await {
                error!("REST API server error: {}", e);
            }
        });

        Ok(Self {
            event_bus,
            repos,
            config: app_cfg,
            api_port,
            db,
            shutdown,
            api_task,
            outbound_task,
        })
    }

    /// Get a cloneable shutdown signal.
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.signal()
    }

    /// Install OS signal listeners (SIGTERM, SIGINT) that trigger shutdown.
    pub fn install_signal_handler(&self) {
        self.shutdown.start_signal_listener();
    }

    /// Trigger graceful shutdown (non-blocking).
    pub fn trigger_shutdown(&self) {
        self.shutdown.signal().trigger();
    }

    /// Wait for the server to fully stop after shutdown has been triggered.
    ///
    /// The API stops accepting requests first; queued events are then
    /// flushed, bounded by the configured shutdown timeout.
    pub async fn wait(self) {
        let Self {
            db,
            shutdown,
            api_task,
            outbound_task,
            ..
        } = self;

        let finished = shutdown
            .shutdown_with_cleanup(|| async move {
                info!("⏳ Waiting for server tasks to complete...");
                match api_task.await {
                    Ok(()) => info!("REST API server stopped"),
                    Err(e) => error!("REST API server task panicked: {}", e),
                }
                if let Err(e) = outbound_task.await {
                    error!("Outbound dispatcher task panicked: {}", e);
                }
            })
            .await;
        if !finished {
            warn!("Some events may not have been delivered before shutdown");
        }

        if let Err(e) = db.close().await {
            warn!("Error closing database connection: {}", e);
        } else {
            info!("✅ Database connection closed");
        }

        info!("👋 Swap service shutdown complete");
    }

    /// Trigger shutdown and wait for completion.
    pub async fn shutdown(self) {
        info!("🛑 Shutting down swap service...");
        self.trigger_shutdown();
        self.wait().await;
    }

    /// Check if the server is still running.
    pub fn is_running(&self) -> bool {
        !self.api_task.is_finished()
    }
}

// ── Helpers ────────────────────────────────────────────────────────

/// The global metrics recorder can only be installed once per process;
/// a restart within the same process reuses it.
fn prometheus_handle() -> PrometheusHandle {
    static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

    PROM_HANDLE
        .get_or_init(|| {
            let builder = PrometheusBuilder::new();
            match builder.install_recorder() {
                Ok(handle) => {
                    info!("📊 Prometheus metrics recorder installed");
                    handle
                }
                Err(e) => {
                    // Another recorder owns the global slot; /metrics stays empty.
                    warn!("Prometheus recorder not installed: {}", e);
                    PrometheusBuilder::new().build_recorder().handle()
                }
            }
        })
        .clone()
}

/// SQLite opens with `mode=rwc` but will not create missing directories.
fn ensure_sqlite_dir(url: &str) {
    let Some(rest) = url.strip_prefix("sqlite://") else {
        return;
    };
    let path = rest.split('?').next().unwrap_or(rest);
    if let Some(parent) = std::path::Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                warn!("Could not create database directory {}: {}", parent.display(), e);
            }
        }
    }
}

/// Initialize tracing (logging) from the application config.
///
/// Call this once at process startup (before [`ServerHandle::start`]).
pub fn init_tracing(config: &AppConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    match config.logging.format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_dir_is_created_for_file_urls() {
        let dir = std::env::temp_dir().join(format!("swap-db-{}", uuid::Uuid::new_v4()));
        let url = format!("sqlite://{}/nested/swap.db?mode=rwc", dir.display());
        ensure_sqlite_dir(&url);
        assert!(dir.join("nested").is_dir());
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn non_file_urls_are_ignored() {
        ensure_sqlite_dir("sqlite::memory:");
        ensure_sqlite_dir("postgres://localhost/swap");
    }
}
