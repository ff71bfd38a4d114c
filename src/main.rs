//! Battery swap service
//!
//! Reads configuration from a TOML file (`SWAP_CONFIG`, or
//! ~/.config/swap-service/config.toml).

use tracing::{error, info};

use swap_service::server::{init_tracing, ServerHandle, ServerOptions};
use swap_service::{config_path_from_env, AppConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ── Load configuration ─────────────────────────────────────
    let config_path = config_path_from_env();
    let config = match AppConfig::load(&config_path) {
        Ok(cfg) => {
            init_tracing(&cfg);
            info!("Configuration loaded from {}", config_path.display());
            cfg
        }
        Err(e) => {
            let cfg = AppConfig::default();
            init_tracing(&cfg);
            error!("Failed to load config: {}. Using defaults.", e);
            cfg
        }
    };

    let handle = match ServerHandle::start(ServerOptions {
        config,
        auto_migrate: true,
    })
    .await
    {
        Ok(handle) => handle,
        Err(e) => {
            error!("Failed to start swap service: {}", e);
            return Err(e.into());
        }
    };

    handle.install_signal_handler();
    info!("🚀 Press Ctrl+C to shutdown gracefully.");

    handle.shutdown_signal().wait().await;
    handle.wait().await;

    Ok(())
}
