//! jsonapi demo server.
//!
//! Loads an optional TOML config, mounts the demo routes and listens on
//! TCP, TLS or a unix socket depending on the `[listener]` section.
//!
//! ```text
//! jsonapi --config jsonapi.toml
//! jsonapi --addr :8080 --token s3cret
//! ```

mod demo;

use std::path::PathBuf;

use clap::Parser;

use jsonapi::config::{load_config, validate_config, ConfigError, ServerConfig};
use jsonapi::observability::{logging::init_logging, metrics::init_metrics};
use jsonapi::Server;

#[derive(Parser)]
#[command(name = "jsonapi")]
#[command(about = "Demo JSON API server", long_about = None)]
struct Args {
    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, overrides the config (e.g. ":8080")
    #[arg(short, long)]
    addr: Option<String>,

    /// Require `Authorization: Bearer <token>` on every request
    #[arg(short, long)]
    token: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };
    if let Some(addr) = args.addr {
        config.listener.address = addr;
        validate_config(&config).map_err(ConfigError::Validation)?;
    }

    init_logging(&config.observability)?;

    tracing::info!("jsonapi v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        address = %config.listener.address,
        tls = config.listener.tls.is_some(),
        unix = config.listener.unix.is_some(),
        request_timeout_secs = config.timeouts.request_secs,
        max_body_size = config.http.max_body_size,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let server = demo::app(Server::from_config(config), args.token);
    for (method, pattern) in server.routes() {
        tracing::info!(method = %method, pattern = %pattern, "Route");
    }
    server.run().await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
