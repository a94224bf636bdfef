//! Configuration schema definitions.
//!
//! Every section derives Serde traits and carries defaults, so an empty file
//! (or no file at all) is a valid configuration.

use serde::{Deserialize, Serialize};

/// Default histogram buckets, in seconds.
pub const DEFAULT_LATENCY_BUCKETS: [f64; 14] = [
    0.005, 0.01, 0.025, 0.05, 0.075, 0.1, 0.25, 0.5, 0.75, 1.0, 2.5, 5.0, 7.5, 10.0,
];

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Exchange instrumentation settings.
    pub exchange: ExchangeConfig,

    /// Span creation and reporting.
    pub tracing: TracingConfig,

    /// Metrics recorder and scrape endpoint.
    pub metrics: MetricsConfig,

    /// Log output.
    pub logging: LoggingConfig,

    /// Loopback traffic generated by the binary.
    pub workload: WorkloadConfig,
}

/// Exchange instrumentation settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExchangeConfig {
    /// Value of the `address` metric label.
    pub address: String,

    /// Responder-side path prefixes to measure. Empty measures everything.
    pub paths_start_with: Vec<String>,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            address: ":0".to_string(),
            paths_start_with: Vec::new(),
        }
    }
}

/// Where finished spans go.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReporterKind {
    /// Structured log event per finished span.
    Log,
    /// Discard finished spans.
    None,
}

/// Tracing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TracingConfig {
    /// Attach a parent context to generated client requests.
    pub enabled: bool,

    /// Reporter for finished spans.
    pub reporter: ReporterKind,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            reporter: ReporterKind::Log,
        }
    }
}

/// Metrics configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Serve the scrape endpoint.
    pub enabled: bool,

    /// Scrape endpoint bind address.
    pub bind_address: String,

    /// Histogram buckets in seconds, strictly increasing.
    pub latency_buckets: Vec<f64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: "0.0.0.0:9090".to_string(),
            latency_buckets: DEFAULT_LATENCY_BUCKETS.to_vec(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Level filter (trace, debug, info, warn, error). `RUST_LOG` wins.
    pub level: String,

    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Loopback workload configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkloadConfig {
    /// Exchanges in total, spread over all connections. Zero runs until shutdown.
    pub requests: u64,

    /// Request path.
    pub path: String,

    /// Pause between exchanges in milliseconds.
    pub interval_ms: u64,

    /// Concurrent loopback connections.
    pub connections: u16,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            requests: 10,
            path: "/ping".to_string(),
            interval_ms: 100,
            connections: 1,
        }
    }
}
