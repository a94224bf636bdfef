//! Trace context propagation over header carriers.
//!
//! The wire format is W3C Trace Context (`traceparent`, `tracestate`),
//! encoded and decoded by OpenTelemetry's [`TraceContextPropagator`].

use opentelemetry::propagation::{Extractor, Injector, TextMapPropagator};
use opentelemetry::trace::{SpanContext, TraceContextExt};
use opentelemetry::Context;
use opentelemetry_sdk::propagation::TraceContextPropagator;

/// Header carrying the propagated context.
pub const TRACEPARENT: &str = "traceparent";

/// Moves a [`SpanContext`] across a wire boundary.
#[derive(Debug, Clone, Default)]
pub struct ContextPropagation {
    propagator: TraceContextPropagator,
}

impl ContextPropagation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write `ctx` into an outgoing carrier.
    pub fn inject(&self, ctx: &SpanContext, carrier: &mut dyn Injector) {
        let cx = Context::new().with_remote_span_context(ctx.clone());
        self.propagator.inject_context(&cx, carrier);
    }

    /// Read a parent context from an incoming carrier. Missing or malformed
    /// headers yield `None`.
    pub fn extract(&self, carrier: &dyn Extractor) -> Option<SpanContext> {
        let cx = self.propagator.extract_with_context(&Context::new(), carrier);
        let span_context = cx.span().span_context().clone();
        span_context.is_valid().then_some(span_context)
    }
}
