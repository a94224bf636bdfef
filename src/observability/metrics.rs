//! Metrics collection.
//!
//! # Responsibilities
//! - Own the Prometheus recorder for the process
//! - Provide the per-role exchange and connection instruments
//! - Render the exposition text for the scrape endpoint
//!
//! # Design Decisions
//! - The recorder is never installed globally. A [`MetricsRegistry`] is
//!   created once and handed to every factory, so tests get isolated
//!   registries and nothing depends on hidden static state.
//! - Every recording call is scoped with [`metrics::with_local_recorder`].
//! - Label values are owned strings or `'static` slices.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use metrics::{
    counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Label, Unit,
};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle, PrometheusRecorder};

use crate::config::MetricsConfig;
use crate::error::TelemetryError;

/// Histogram name suffixes that get explicit buckets.
const LATENCY_SUFFIX: &str = "_latency_seconds";
const DURATION_SUFFIX: &str = "_duration_seconds";

/// Process-wide metrics handle, passed explicitly to whoever records.
#[derive(Clone)]
pub struct MetricsRegistry {
    recorder: Arc<PrometheusRecorder>,
    handle: PrometheusHandle,
}

impl MetricsRegistry {
    /// Build a Prometheus-backed registry with the given histogram buckets.
    pub fn prometheus(buckets: &[f64]) -> Result<Self, TelemetryError> {
        let recorder = PrometheusBuilder::new()
            .set_buckets_for_metric(Matcher::Suffix(LATENCY_SUFFIX.to_string()), buckets)?
            .set_buckets_for_metric(Matcher::Suffix(DURATION_SUFFIX.to_string()), buckets)?
            .build_recorder();
        let handle = recorder.handle();
        Ok(Self {
            recorder: Arc::new(recorder),
            handle,
        })
    }

    pub fn from_config(config: &MetricsConfig) -> Result<Self, TelemetryError> {
        Self::prometheus(&config.latency_buckets)
    }

    /// Run `f` with this registry's recorder as the thread's active recorder.
    pub fn scoped<T>(&self, f: impl FnOnce() -> T) -> T {
        metrics::with_local_recorder(&*self.recorder, f)
    }

    /// Prometheus exposition text.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

impl fmt::Debug for MetricsRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricsRegistry").finish_non_exhaustive()
    }
}

/// Metric name segment for a role: `client` or `server`.
pub type Subsystem = &'static str;

/// Exchange counter and latency histogram for one role.
#[derive(Debug, Clone)]
pub struct ExchangeMetrics {
    registry: MetricsRegistry,
    handled_total: String,
    handled_latency: String,
}

impl ExchangeMetrics {
    pub fn new(registry: MetricsRegistry, subsystem: Subsystem) -> Self {
        let handled_total = format!("http_{subsystem}_handled_total");
        let handled_latency = format!("http_{subsystem}_handled{LATENCY_SUFFIX}");
        registry.scoped(|| {
            describe_counter!(
                handled_total.clone(),
                Unit::Count,
                "Total number of HTTP exchanges completed"
            );
            describe_histogram!(
                handled_latency.clone(),
                Unit::Seconds,
                "Latency of HTTP exchanges, request start to response flushed"
            );
        });
        Self {
            registry,
            handled_total,
            handled_latency,
        }
    }

    /// Count one exchange and observe its latency.
    pub fn record_exchange(&self, address: &str, status: u16, method: &str, elapsed: Duration) {
        let labels = vec![
            Label::new("address", address.to_string()),
            Label::new("http_code", status.to_string()),
            Label::new("http_method", method.to_string()),
        ];
        self.registry.scoped(|| {
            counter!(self.handled_total.clone(), labels.clone()).increment(1);
            histogram!(self.handled_latency.clone(), labels).record(elapsed.as_secs_f64());
        });
    }
}

/// Connection-level instruments for one role.
#[derive(Debug, Clone)]
pub struct ConnectionMetrics {
    registry: MetricsRegistry,
    address: String,
    connections: String,
    connects: String,
    duration: String,
    sent: String,
    received: String,
}

/// Value of the `status` label on the connects counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectStatus {
    Active,
    Inactive,
    Failed,
}

impl ConnectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectStatus::Active => "active",
            ConnectStatus::Inactive => "inactive",
            ConnectStatus::Failed => "failed",
        }
    }
}

impl ConnectionMetrics {
    pub fn new(registry: MetricsRegistry, subsystem: Subsystem, address: &str) -> Self {
        let this = Self {
            registry,
            address: address.to_string(),
            connections: format!("channel_{subsystem}_connections_count"),
            connects: format!("channel_{subsystem}_connects_total"),
            duration: format!("channel_{subsystem}_connection{DURATION_SUFFIX}"),
            sent: format!("channel_{subsystem}_send_bytes"),
            received: format!("channel_{subsystem}_received_bytes"),
        };
        this.registry.scoped(|| {
            describe_gauge!(this.connections.clone(), "Currently open connections");
            describe_counter!(this.connects.clone(), "Connection lifecycle events by status");
            describe_histogram!(
                this.duration.clone(),
                Unit::Seconds,
                "Lifetime of closed connections"
            );
            describe_counter!(this.sent.clone(), Unit::Bytes, "Payload bytes written");
            describe_counter!(this.received.clone(), Unit::Bytes, "Payload bytes read");
        });
        this
    }

    pub fn record_connect(&self, status: ConnectStatus) {
        self.registry.scoped(|| {
            counter!(
                self.connects.clone(),
                "address" => self.address.clone(),
                "status" => status.as_str()
            )
            .increment(1);
        });
    }

    pub fn record_open(&self) {
        self.registry.scoped(|| {
            gauge!(self.connections.clone(), "address" => self.address.clone()).increment(1.0);
        });
    }

    /// Decrement the open gauge and observe how long the connection lived.
    pub fn record_close(&self, lifetime: Duration) {
        self.registry.scoped(|| {
            gauge!(self.connections.clone(), "address" => self.address.clone()).decrement(1.0);
            histogram!(self.duration.clone(), "address" => self.address.clone())
                .record(lifetime.as_secs_f64());
        });
    }

    pub fn record_sent(&self, bytes: usize) {
        self.registry.scoped(|| {
            counter!(self.sent.clone(), "address" => self.address.clone()).increment(bytes as u64);
        });
    }

    pub fn record_received(&self, bytes: usize) {
        self.registry.scoped(|| {
            counter!(self.received.clone(), "address" => self.address.clone())
                .increment(bytes as u64);
        });
    }
}
