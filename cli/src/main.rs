//! Battery swap service - CLI server
//!
//! Headless booking / swap / subscription service suitable for deployment
//! as a systemd service, Docker container, or standalone process.
//!
//! ```sh
//! # Run with default config (~/.config/swap-service/config.toml)
//! swap-cli
//!
//! # Custom config path and port
//! swap-cli --config /etc/swap-service/config.toml --api-port 8080
//!
//! # Validate config without starting
//! swap-cli --check
//!
//! # Issue an operator API key
//! swap-cli --generate-key
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};

use swap_service::config::{default_config_path, AppConfig, CONFIG_ENV_VAR};
use swap_service::infrastructure::crypto::{generate_api_key, hash_api_key};
use swap_service::server::{init_tracing, ServerHandle, ServerOptions};

/// Battery swap booking, transaction and subscription service.
#[derive(Parser, Debug)]
#[command(
    name = "swap-cli",
    version,
    about = "Battery swap lifecycle service",
    long_about = "REST API + event stream for battery-swap bookings, swap \
                  transactions and package subscriptions.\n\n\
                  Default config: ~/.config/swap-service/config.toml"
)]
struct Cli {
    /// Path to the configuration file (TOML).
    #[arg(short, long, env = CONFIG_ENV_VAR)]
    config: Option<PathBuf>,

    /// Override the REST API listen port.
    #[arg(long)]
    api_port: Option<u16>,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(short, long)]
    log_level: Option<String>,

    /// Validate the configuration file and exit without starting the server.
    #[arg(long)]
    check: bool,

    /// Skip database migrations on startup.
    #[arg(long)]
    no_migrate: bool,

    /// Print a new operator API key and its config hash, then exit.
    #[arg(long)]
    generate_key: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.generate_key {
        let key = generate_api_key();
        println!("API key : {}", key);
        println!("Hash    : {}", hash_api_key(&key));
        println!();
        println!("Add the hash to [security] api_key_hashes and hand the key to the operator.");
        return Ok(());
    }

    // ── Load configuration ─────────────────────────────────────
    let config_path = cli.config.unwrap_or_else(default_config_path);
    let loaded = AppConfig::load(&config_path);
    let load_error = loaded.as_ref().err().map(|e| e.to_string());
    let mut config = loaded.unwrap_or_default();

    // ── Apply CLI overrides ────────────────────────────────────
    if let Some(port) = cli.api_port {
        config.server.api_port = port;
    }
    if let Some(ref level) = cli.log_level {
        config.logging.level = level.clone();
    }

    if cli.check {
        if let Some(e) = load_error {
            eprintln!("❌ Configuration is invalid: {}", e);
            std::process::exit(1);
        }
        println!("✅ Configuration is valid");
        println!("   Config file : {}", config_path.display());
        println!("   API address : {}:{}", config.server.api_host, config.server.api_port);
        println!("   Database    : {}", config.database.connection_url());
        println!("   Log level   : {}", config.logging.level);
        println!("   Operator keys: {}", config.security.api_key_hashes.len());
        return Ok(());
    }

    init_tracing(&config);
    match load_error {
        None => info!("Configuration loaded from {}", config_path.display()),
        Some(e) => {
            error!("Failed to load config from {}: {}", config_path.display(), e);
            error!("Using default configuration.");
        }
    }
    if let Some(port) = cli.api_port {
        info!("CLI override: api_port = {}", port);
    }
    if let Some(ref level) = cli.log_level {
        info!("CLI override: log_level = {}", level);
    }

    // ── Start server ───────────────────────────────────────────
    let handle = ServerHandle::start(ServerOptions {
        config,
        auto_migrate: !cli.no_migrate,
    })
    .await?;

    // Install OS signal handlers (SIGTERM, SIGINT)
    handle.install_signal_handler();

    info!("🚀 Press Ctrl+C to shutdown gracefully.");

    handle.shutdown_signal().wait().await;
    handle.wait().await;

    Ok(())
}
