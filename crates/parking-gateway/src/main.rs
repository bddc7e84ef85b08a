//! # Parking Gateway Server
//!
//! Loads `gateway.toml`, opens the database and serves the HTTP API until
//! Ctrl+C or SIGTERM.
//!
//! ## Usage
//! ```bash
//! # Default config location, overridable by environment
//! PARKING_DB_PATH=./parking_dev.db cargo run -p parking-gateway
//!
//! # Explicit config file
//! cargo run -p parking-gateway -- --config ./gateway.toml
//!
//! # More logging
//! RUST_LOG=debug cargo run -p parking-gateway
//! ```

use std::path::PathBuf;

use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use parking_gateway::{api, Gateway, GatewayConfig, GatewayError};

const DEFAULT_LOG_FILTER: &str = "info,parking=debug,sqlx=warn";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config_path = config_path_from_args();
    let config = GatewayConfig::load(config_path)?;

    info!(
        db = %config.database.path.display(),
        bind_addr = %config.server.bind_addr,
        "Configuration loaded"
    );

    let gateway = Gateway::from_config(&config).await?;
    let db = gateway.engine().database().clone();

    let listener = TcpListener::bind(&config.server.bind_addr)
        .await
        .map_err(|e| {
            GatewayError::Server(format!("Failed to bind to {}: {}", config.server.bind_addr, e))
        })?;

    info!(addr = %config.server.bind_addr, "Parking gateway listening");

    let served = axum::serve(listener, api::router(gateway))
        .with_graceful_shutdown(shutdown_signal())
        .await;

    db.close().await;

    if let Err(e) = served {
        error!(error = %e, "Server stopped with an error");
        return Err(GatewayError::Server(e.to_string()).into());
    }

    info!("Server shutdown complete");
    Ok(())
}

/// `RUST_LOG` wins; otherwise engine debug, sqlx warnings.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

/// `--config <PATH>` / `-c <PATH>`; anything else falls back to the default path.
fn config_path_from_args() -> Option<PathBuf> {
    let args: Vec<String> = std::env::args().collect();

    args.iter()
        .position(|arg| arg == "--config" || arg == "-c")
        .and_then(|i| args.get(i + 1))
        .map(PathBuf::from)
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
