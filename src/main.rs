//! exchange-telemetry
//!
//! Runs instrumented loopback HTTP traffic and exposes the resulting metrics.
//!
//! ```text
//!   client pipeline                          server pipeline
//!  ┌──────────────────┐   LocalChannel    ┌──────────────────┐
//!  │ stats │ tracing  │ ◀───────────────▶ │ stats │ tracing  │
//!  └──────────────────┘                   └──────────────────┘
//!            │                                     │
//!            └────────────┬────────────────────────┘
//!                         ▼
//!               MetricsRegistry ──▶ GET /metrics
//!               Tracer ──▶ span log events
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::watch;

use exchange_telemetry::config::{load_config, TelemetryConfig};
use exchange_telemetry::observability::endpoint::serve_metrics;
use exchange_telemetry::observability::logging::init_logging;
use exchange_telemetry::workload::{run_workload, Loopback};
use exchange_telemetry::{MetricsRegistry, Tracer};

#[derive(Parser, Debug)]
#[command(name = "exchange-telemetry")]
#[command(about = "Traced loopback HTTP exchanges with Prometheus metrics", long_about = None)]
struct Cli {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `workload.requests`.
    #[arg(short, long)]
    requests: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => TelemetryConfig::default(),
    };
    if let Some(requests) = cli.requests {
        config.workload.requests = requests;
    }

    init_logging(&config.logging)?;
    tracing::info!("exchange-telemetry v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        address = %config.exchange.address,
        requests = config.workload.requests,
        connections = config.workload.connections,
        metrics_enabled = config.metrics.enabled,
        "Configuration loaded"
    );

    let registry = MetricsRegistry::from_config(&config.metrics)?;
    let tracer = Tracer::from_config(&config.tracing);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let endpoint = if config.metrics.enabled {
        let listener = TcpListener::bind(&config.metrics.bind_address).await?;
        let mut rx = shutdown_rx.clone();
        Some(tokio::spawn(serve_metrics(
            listener,
            registry.clone(),
            async move {
                let _ = rx.changed().await;
            },
        )))
    } else {
        None
    };

    let loopback = Loopback::new(registry.clone(), tracer.clone(), &config.exchange);
    let interrupted = tokio::select! {
        report = run_workload(&loopback, &config.workload) => {
            tracing::info!(
                succeeded = report.succeeded,
                failed = report.failed,
                "Loopback traffic done"
            );
            false
        }
        _ = shutdown_signal() => true,
    };

    match endpoint {
        Some(endpoint) => {
            if !interrupted {
                tracing::info!("Serving metrics until Ctrl+C");
                shutdown_signal().await;
            }
            let _ = shutdown_tx.send(true);
            endpoint.await??;
        }
        None => print!("{}", registry.render()),
    }

    tracer.flush();
    tracing::info!("Shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %error, "Failed to listen for Ctrl+C");
        return;
    }
    tracing::info!("Shutdown signal received");
}
