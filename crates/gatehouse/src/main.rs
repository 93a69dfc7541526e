//! # Gatehouse - CAPTCHA access gateway
//!
//! Holds visitors at a reCAPTCHA challenge, throttles verification attempts
//! per IP and per browser fingerprint, and hands verified visitors the
//! protected destination URL.
//!
//! ## Architecture
//! ```text
//! Browser → Gatehouse → siteverify
//!              ↓
//!        Store (memory | Redis)
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod captcha;
mod clock;
mod config;
mod csrf;
mod identity;
mod routes;
mod state;
mod stats;
mod store;
mod throttle;

use config::AppConfig;
use state::AppState;
use store::{Store, sweeper_worker};

/// Gatehouse - CAPTCHA access gateway
#[derive(Parser, Debug)]
#[command(name = "gatehouse")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/gatehouse.toml")]
    config: String,

    /// Redis URL (overrides config; in-memory store when unset)
    #[arg(long, env = "REDIS_URL")]
    redis_url: Option<String>,

    /// Listen address (overrides config)
    #[arg(short, long, env = "LISTEN_ADDR")]
    listen: Option<String>,

    /// Listen on 0.0.0.0 at this port (overrides --listen)
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,

    /// reCAPTCHA secret key
    #[arg(long, env = "RECAPTCHA_SECRET", hide_env_values = true)]
    secret: Option<String>,

    /// Destination handed to verified visitors
    #[arg(long, env = "REDIRECT_URL")]
    redirect_url: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "LOG_LEVEL")]
    log_level: String,

    /// Enable JSON logging output
    #[arg(long, default_value = "false")]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional
    let _ = dotenvy::dotenv();

    // Parse CLI arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(&args.log_level, args.json_logs)?;

    info!("Starting Gatehouse v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = AppConfig::load(&args.config, &args)?;
    config.validate().context("Invalid configuration")?;
    info!("Configuration loaded from {}", args.config);

    // Create shutdown broadcast channel
    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);

    // Initialize application state
    let state = AppState::new(config.clone()).await?;
    info!(store = state.store.backend_name(), "Store ready");

    // Expired entries only vanish on their own in Redis
    if let Store::Memory(ref memory) = state.store {
        let memory = memory.clone();
        let interval = Duration::from_secs(config.throttle.sweep_interval_secs.max(1));
        let sweeper_shutdown = shutdown_tx.subscribe();
        tokio::spawn(async move {
            sweeper_worker(memory, interval, sweeper_shutdown).await;
        });
    }

    // Build router
    let app = routes::create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr))?;
    info!("Gatehouse listening on {}", config.listen_addr);

    // Handle graceful shutdown
    let shutdown_signal = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        }
        info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    };

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal)
    .await
    .context("Server error")?;

    info!("Gatehouse shutdown complete");
    Ok(())
}

/// Initialize structured logging with tracing
fn init_logging(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .init();
    }

    Ok(())
}
