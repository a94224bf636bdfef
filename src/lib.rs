//! Request/response telemetry for duplex HTTP pipelines.
//!
//! A per-connection state machine observes framed HTTP events, pairs every
//! request with its response, and emits exactly one latency observation and
//! at most one span per exchange, including when the peer disconnects.

pub mod clock;
pub mod config;
pub mod error;
pub mod http;
pub mod net;
pub mod observability;
pub mod workload;

pub use config::TelemetryConfig;
pub use error::{ChannelError, TelemetryError};
pub use self::http::{HttpTracingFactory, HttpTracingHandler, Role};
pub use observability::{MetricsRegistry, Tracer};
