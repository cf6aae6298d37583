//! Telemetry gateway (v1)
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌──────────────────────────────────────────────────────┐
//!                     │                  TELEMETRY GATEWAY                   │
//!                     │                                                      │
//!   Client Request    │  ┌──────────┐   ┌────────────┐   ┌───────────────┐   │
//!   ──────────────────┼─▶│  http    │──▶│ middleware │──▶│   routing     │   │
//!                     │  │  server  │   │ log/account│   │   dispatch    │   │
//!                     │  └──────────┘   │ /body      │   └──────┬────────┘   │
//!                     │                 └────────────┘          │            │
//!                     │                                         ▼            │
//!                     │                                  ┌─────────────┐     │
//!                     │                                  │    query    │     │
//!                     │                                  │   groups    │     │
//!                     │                                  └──────┬──────┘     │
//!                     │                                         ▼            │
//!   Client Response   │  ┌──────────┐                    ┌─────────────┐     │
//!   ◀─────────────────┼──│  stream  │◀───────────────────│ ApiHandler  │     │
//!                     │  │ SSE/JSON │                    └─────────────┘     │
//!                     │  └──────────┘                                        │
//!                     │                                                      │
//!                     │  config · observability · lifecycle · net            │
//!                     └──────────────────────────────────────────────────────┘
//! ```
//!
//! The binary serves every schema route with the built-in echo handler.

use std::path::PathBuf;

use clap::Parser;

use telemetry_gateway::config::{load_config, GatewayConfig};
use telemetry_gateway::http::echo::echo_handlers;
use telemetry_gateway::lifecycle::wait_for_signal;
use telemetry_gateway::observability::{logging, metrics};
use telemetry_gateway::routing::RouteSchema;

#[derive(Parser)]
#[command(name = "telemetry-gateway", version)]
#[command(about = "HTTP API gateway for telemetry queries", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// JSON route schema; overrides `schema_path` from the config.
    #[arg(short, long)]
    schema: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };

    logging::init(&config.observability)?;

    tracing::info!(version = %config.version, "telemetry-gateway starting");
    tracing::info!(
        server = %config.web.server,
        proto = config.web.proto.as_str(),
        max_body_bytes = config.limits.max_body_bytes,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics endpoint");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let schema = match cli.schema.or_else(|| {
        config
            .schema_path
            .as_deref()
            .map(|path| config.resolve_path(path))
    }) {
        Some(path) => {
            tracing::info!(path = %path.display(), "Loading route schema");
            RouteSchema::load(&path)?
        }
        None => {
            tracing::warn!("No route schema given; serving only GET /");
            RouteSchema::default()
        }
    };

    let handlers = echo_handlers(&schema);
    let server = telemetry_gateway::launch(&config, &schema, &handlers).await?;

    let signal = wait_for_signal().await;
    tracing::info!(signal, "Shutdown signal received");

    server.shutdown();
    server.closed().await;

    tracing::info!("Shutdown complete");
    Ok(())
}
