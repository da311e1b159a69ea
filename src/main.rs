//! Tariff service CLI
//!
//! ```sh
//! # Run with default config (~/.config/tariff-service/config.toml)
//! tariff-service
//!
//! # Custom config path and port
//! tariff-service --config /etc/tariff-service/config.toml --api-port 8080
//!
//! # Validate config without starting
//! tariff-service --check
//!
//! # Forward exchange events to the Kafka relay topic instead of serving HTTP
//! tariff-service --relay
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};

use tariff_service::config::AppConfig;
use tariff_service::server::{init_tracing, run_relay_mode, BoxError, ServerHandle, ServerOptions};

/// Insurance tariff REST service with Redis caching and Kafka/RabbitMQ events.
#[derive(Parser, Debug)]
#[command(
    name = "tariff-service",
    version,
    about = "Insurance tariff REST service",
    long_about = "Tariff service: REST API for insurance tariffs, cached in Redis, \
                  with every change published to Kafka and RabbitMQ.\n\n\
                  Default config: ~/.config/tariff-service/config.toml"
)]
struct Cli {
    /// Path to the configuration file (TOML).
    #[arg(short, long, env = "TARIFF_CONFIG")]
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

    /// Skip creating the default admin user.
    #[arg(long)]
    no_admin: bool,

    /// Run the RabbitMQ to Kafka relay consumer instead of the API.
    #[arg(long, conflicts_with = "check")]
    relay: bool,
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let cli = Cli::parse();

    // ── Load configuration ─────────────────────────────────────
    let config_path = cli
        .config
        .unwrap_or_else(tariff_service::default_config_path);

    let mut config = match AppConfig::load(&config_path) {
        Ok(cfg) => cfg,
        Err(e) if cli.check => {
            eprintln!("❌ Invalid configuration in {}: {}", config_path.display(), e);
            std::process::exit(1);
        }
        Err(e) => {
            tracing_subscriber::fmt()
                .with_env_filter(tracing_subscriber::EnvFilter::new("info"))
                .init();
            error!("Failed to load config from {}: {}", config_path.display(), e);
            return Err(e.into());
        }
    };

    // ── Apply CLI overrides ────────────────────────────────────
    if let Some(ref level) = cli.log_level {
        config.logging.level = level.clone();
    }
    init_tracing(&config);
    info!("Configuration loaded from {}", config_path.display());

    if let Some(port) = cli.api_port {
        info!("CLI override: api_port = {}", port);
        config.server.api_port = port;
    }

    // ── Config validation mode ─────────────────────────────────
    if cli.check {
        println!("✅ Configuration is valid");
        println!("   Config file : {}", config_path.display());
        println!("   API address : {}", config.api_address());
        println!("   Database    : {}", config.database.url);
        println!("   Cache       : {:?} ({})", config.cache.backend, config.cache.url);
        println!(
            "   Kafka       : {} (topic {}, enabled: {})",
            config.kafka.bootstrap_servers, config.kafka.topic, config.kafka.enabled
        );
        println!(
            "   RabbitMQ    : exchange {} (enabled: {})",
            config.rabbit.exchange, config.rabbit.enabled
        );
        println!("   Dispatch    : {:?}", config.notifications.mode);
        println!("   Log level   : {}", config.logging.level);
        return Ok(());
    }

    if cli.relay {
        return run_relay_mode(config).await;
    }

    // ── Start server ───────────────────────────────────────────
    let handle = ServerHandle::start(ServerOptions {
        config,
        auto_migrate: !cli.no_migrate,
        create_default_admin: !cli.no_admin,
    })
    .await?;

    handle.install_signal_handler();

    info!("🚀 Press Ctrl+C to shutdown gracefully.");

    handle.shutdown_signal().wait().await;
    handle.wait().await;

    Ok(())
}
