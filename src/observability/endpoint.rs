//! Prometheus scrape endpoint.

use std::future::Future;

use axum::{extract::State, http::header, response::IntoResponse, routing::get, Router};
use tokio::net::TcpListener;

use crate::observability::metrics::MetricsRegistry;

const CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Router serving `GET /metrics` from `registry`.
pub fn metrics_router(registry: MetricsRegistry) -> Router {
    Router::new()
        .route("/metrics", get(render_metrics))
        .with_state(registry)
}

async fn render_metrics(State(registry): State<MetricsRegistry>) -> impl IntoResponse {
    ([(header::CONTENT_TYPE, CONTENT_TYPE)], registry.render())
}

/// Serve the scrape endpoint on `listener` until `shutdown` resolves.
pub async fn serve_metrics<F>(
    listener: TcpListener,
    registry: MetricsRegistry,
    shutdown: F,
) -> Result<(), std::io::Error>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");

    axum::serve(listener, metrics_router(registry))
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!("Metrics endpoint stopped");
    Ok(())
}
