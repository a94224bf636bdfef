//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! http handlers (per connection):
//!     → metrics.rs (exchange counters, latency histograms)
//!     → trace.rs + span.rs (OpenTelemetry spans, finished-span export)
//!     → propagation.rs (W3C trace context over header carriers)
//!
//! Consumers:
//!     → endpoint.rs (Prometheus scrape)
//!     → logging.rs (finished spans and diagnostics as log events)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Registry and tracer are injected, never global
//! - Tracing is opt-in per request (no parent, no span)

pub mod endpoint;
pub mod logging;
pub mod metrics;
pub mod propagation;
pub mod span;
pub mod trace;

pub use self::metrics::{ConnectStatus, ConnectionMetrics, ExchangeMetrics, MetricsRegistry};
pub use self::propagation::ContextPropagation;
pub use self::span::Span;
pub use self::trace::{LogExporter, Tracer};
