//! HTTP exchange instrumentation subsystem.
//!
//! # Data Flow
//! ```text
//! Pipeline events (net::HttpObject)
//!     → handler.rs (per-connection state machine, one open exchange)
//!     → context.rs (span + latency bookkeeping for that exchange)
//!         → carrier.rs (header Injector/Extractor for trace context)
//!         → peer.rs (peer tags)
//!     → observability (metrics registry, tracer)
//! ```
//!
//! factory.rs wires a registry and tracer into fresh handlers, one per
//! connection and role.

pub mod carrier;
pub mod context;
pub mod factory;
pub mod handler;
pub mod peer;

use opentelemetry::trace::SpanKind;

pub use carrier::HeaderCarrier;
pub use context::ExchangeTracingContext;
pub use factory::{HttpTracingFactory, HttpTracingFactoryBuilder};
pub use handler::{ExchangeState, HttpTracingHandler};
pub use peer::PeerAddressResolver;

/// Span tag keys.
pub mod tags {
    pub const COMPONENT: &str = "component";
    pub const SPAN_KIND: &str = "span.kind";
    pub const HTTP_METHOD: &str = "http.method";
    pub const HTTP_URL: &str = "http.url";
    pub const HTTP_STATUS_CODE: &str = "http.status_code";
    pub const HTTP_CONTENT_TYPE: &str = "http.content_type";
    pub const HTTP_CONTENT_LENGTH: &str = "http.content_length";
    pub const PEER_ADDRESS: &str = "peer.address";
    pub const PEER_HOSTNAME: &str = "peer.hostname";
    pub const PEER_PORT: &str = "peer.port";
    pub const ERROR: &str = "error";
    pub const ERROR_KIND: &str = "error.kind";
    pub const ERROR_MESSAGE: &str = "error.message";
    pub const EVENT: &str = "event";
}

/// Value of the `component` tag on every exchange span.
pub const COMPONENT_NAME: &str = "exchange-telemetry";

/// Which side of an exchange a handler observes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Writes requests, reads responses.
    Initiator,
    /// Reads requests, writes responses.
    Responder,
}

impl Role {
    /// Metric name segment.
    pub fn subsystem(&self) -> &'static str {
        match self {
            Role::Initiator => "client",
            Role::Responder => "server",
        }
    }

    /// Value of the `span.kind` tag.
    pub fn span_kind(&self) -> &'static str {
        self.subsystem()
    }

    pub fn otel_kind(&self) -> SpanKind {
        match self {
            Role::Initiator => SpanKind::Client,
            Role::Responder => SpanKind::Server,
        }
    }

    /// Span log marker emitted when the response is seen.
    pub fn response_marker(&self) -> &'static str {
        match self {
            Role::Initiator => "cr",
            Role::Responder => "ss",
        }
    }

    /// Status recorded when the peer closes before any response.
    pub fn peer_closed_status(&self) -> u16 {
        match self {
            Role::Initiator => 500,
            Role::Responder => 499,
        }
    }

    pub fn peer_closed_reason(&self) -> &'static str {
        match self {
            Role::Initiator => {
                "the server closed the connection before the client received the response"
            }
            Role::Responder => {
                "the client closed the connection before the server answered the request"
            }
        }
    }
}
