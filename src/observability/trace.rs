//! Span creation and export.
//!
//! # Responsibilities
//! - Start root and child spans with identifiers from the SDK id generator
//! - Propagate contexts through [`ContextPropagation`]
//! - Export finished spans through an OpenTelemetry [`SpanExporter`]
//!
//! # Design Decisions
//! - [`Tracer`] is a cheap cloneable handle, injected into factories
//! - No global provider; tests build their own over an in-memory exporter
//! - Spans are exported synchronously as they finish

use std::borrow::Cow;
use std::fmt;

use futures_util::future::BoxFuture;
use opentelemetry::propagation::{Extractor, Injector};
use opentelemetry::trace::{
    SpanContext, SpanKind, TraceContextExt, TraceFlags, TraceState, TracerProvider as _,
};
use opentelemetry::{Context, KeyValue, Value};
use opentelemetry_sdk::export::trace::{ExportResult, SpanData, SpanExporter};
use opentelemetry_sdk::trace::{IdGenerator, RandomIdGenerator, Tracer as SdkTracer, TracerProvider};

use crate::config::{ReporterKind, TracingConfig};
use crate::observability::propagation::ContextPropagation;
use crate::observability::span::Span;

const INSTRUMENTATION_NAME: &str = env!("CARGO_PKG_NAME");

/// Emits each finished span as a structured `tracing` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogExporter;

impl SpanExporter for LogExporter {
    fn export(&mut self, batch: Vec<SpanData>) -> BoxFuture<'static, ExportResult> {
        for span in &batch {
            log_span(span);
        }
        Box::pin(std::future::ready(Ok(())))
    }
}

fn log_span(span: &SpanData) {
    let events: Vec<serde_json::Value> = span
        .events
        .iter()
        .map(|event| {
            serde_json::json!({
                "name": event.name,
                "attributes": attributes_json(&event.attributes),
            })
        })
        .collect();
    let duration = span
        .end_time
        .duration_since(span.start_time)
        .unwrap_or_default();

    tracing::info!(
        target: "exchange_telemetry::span",
        name = %span.name,
        kind = ?span.span_kind,
        trace_id = %span.span_context.trace_id(),
        span_id = %span.span_context.span_id(),
        parent_span_id = %span.parent_span_id,
        duration_us = duration.as_micros() as u64,
        status = ?span.status,
        attributes = %attributes_json(&span.attributes),
        events = %serde_json::Value::Array(events),
        "span finished"
    );
}

fn attributes_json(attributes: &[KeyValue]) -> serde_json::Value {
    let map = attributes
        .iter()
        .map(|kv| {
            let value = match &kv.value {
                Value::Bool(b) => serde_json::Value::from(*b),
                Value::I64(i) => serde_json::Value::from(*i),
                Value::F64(f) => serde_json::Value::from(*f),
                other => serde_json::Value::from(other.as_str().into_owned()),
            };
            (kv.key.as_str().to_string(), value)
        })
        .collect();
    serde_json::Value::Object(map)
}

/// Handle used to start spans and move their contexts across the wire.
#[derive(Clone)]
pub struct Tracer {
    provider: TracerProvider,
    tracer: SdkTracer,
    ids: RandomIdGenerator,
    propagation: ContextPropagation,
}

impl Tracer {
    /// A tracer exporting every finished span to `exporter` as it ends.
    pub fn with_exporter<E>(exporter: E) -> Self
    where
        E: SpanExporter + 'static,
    {
        Self::from_provider(TracerProvider::builder().with_simple_exporter(exporter).build())
    }

    fn from_provider(provider: TracerProvider) -> Self {
        let tracer = provider.tracer(INSTRUMENTATION_NAME);
        Self {
            provider,
            tracer,
            ids: RandomIdGenerator::default(),
            propagation: ContextPropagation::new(),
        }
    }

    /// A tracer that logs finished spans.
    pub fn logging() -> Self {
        Self::with_exporter(LogExporter)
    }

    /// A tracer without exporters. Spans are built and dropped.
    pub fn noop() -> Self {
        Self::from_provider(TracerProvider::builder().build())
    }

    /// Build the tracer selected by configuration. A disabled tracer drops spans.
    pub fn from_config(config: &TracingConfig) -> Self {
        if !config.enabled {
            return Self::noop();
        }
        match config.reporter {
            ReporterKind::Log => Self::logging(),
            ReporterKind::None => Self::noop(),
        }
    }

    /// Start a child of `parent`, or a root span when there is none.
    pub fn start_span(
        &self,
        name: impl Into<Cow<'static, str>>,
        kind: SpanKind,
        parent: Option<&SpanContext>,
    ) -> Span {
        match parent {
            Some(parent) => self.start_child(name, kind, parent),
            None => self.start_root(name, kind),
        }
    }

    /// Start a span with a new trace id.
    pub fn start_root(&self, name: impl Into<Cow<'static, str>>, kind: SpanKind) -> Span {
        let context = SpanContext::new(
            self.ids.new_trace_id(),
            self.ids.new_span_id(),
            TraceFlags::SAMPLED,
            false,
            TraceState::default(),
        );
        Span::new(self.tracer.clone(), name, kind, context, Context::new())
    }

    /// Start a span that continues `parent`'s trace.
    pub fn start_child(
        &self,
        name: impl Into<Cow<'static, str>>,
        kind: SpanKind,
        parent: &SpanContext,
    ) -> Span {
        let context = SpanContext::new(
            parent.trace_id(),
            self.ids.new_span_id(),
            parent.trace_flags(),
            false,
            parent.trace_state().clone(),
        );
        let parent_cx = Context::new().with_remote_span_context(parent.clone());
        Span::new(self.tracer.clone(), name, kind, context, parent_cx)
    }

    /// Write `ctx` into an outgoing carrier.
    pub fn inject(&self, ctx: &SpanContext, carrier: &mut dyn Injector) {
        self.propagation.inject(ctx, carrier);
    }

    /// Read a parent context from an incoming carrier.
    pub fn extract(&self, carrier: &dyn Extractor) -> Option<SpanContext> {
        self.propagation.extract(carrier)
    }

    /// Flush spans still held by the provider's processors.
    pub fn flush(&self) {
        for result in self.provider.force_flush() {
            if let Err(error) = result {
                tracing::warn!(error = %error, "Span flush failed");
            }
        }
    }
}

impl fmt::Debug for Tracer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracer").finish_non_exhaustive()
    }
}
