//! Exchange spans.
//!
//! An exchange span is assembled as an OpenTelemetry [`SpanBuilder`] and only
//! started on [`Span::finish`], so a discarded exchange never reaches the
//! exporter. Identifiers are minted up front so the context can be
//! propagated while the exchange is still open.

use std::borrow::Cow;
use std::fmt;
use std::time::SystemTime;

use opentelemetry::trace::{Event, Span as _, SpanBuilder, SpanContext, SpanKind, Status};
use opentelemetry::{Context, KeyValue, Value};
use opentelemetry_sdk::trace::Tracer as SdkTracer;

/// An open span. Owned by exactly one exchange; consumed by [`Span::finish`].
/// Dropping it reports nothing.
pub struct Span {
    builder: SpanBuilder,
    context: SpanContext,
    parent: Context,
    tracer: SdkTracer,
}

impl Span {
    pub(crate) fn new(
        tracer: SdkTracer,
        name: impl Into<Cow<'static, str>>,
        kind: SpanKind,
        context: SpanContext,
        parent: Context,
    ) -> Self {
        let builder = SpanBuilder::from_name(name)
            .with_kind(kind)
            .with_trace_id(context.trace_id())
            .with_span_id(context.span_id())
            .with_start_time(SystemTime::now());
        Self {
            builder,
            context,
            parent,
            tracer,
        }
    }

    pub fn context(&self) -> &SpanContext {
        &self.context
    }

    pub fn name(&self) -> &str {
        &self.builder.name
    }

    /// Set (or replace) an attribute.
    pub fn set_tag(&mut self, key: &'static str, value: impl Into<Value>) {
        let value = value.into();
        let attributes = self.builder.attributes.get_or_insert_with(Vec::new);
        match attributes.iter_mut().find(|kv| kv.key.as_str() == key) {
            Some(kv) => kv.value = value,
            None => attributes.push(KeyValue::new(key, value)),
        }
    }

    pub fn tag(&self, key: &str) -> Option<&Value> {
        self.builder
            .attributes
            .as_ref()?
            .iter()
            .find(|kv| kv.key.as_str() == key)
            .map(|kv| &kv.value)
    }

    /// Record a timestamped event.
    pub fn add_event(&mut self, name: &'static str, attributes: Vec<KeyValue>) {
        self.builder
            .events
            .get_or_insert_with(Vec::new)
            .push(Event::new(name, SystemTime::now(), attributes, 0));
    }

    pub fn set_error(&mut self, description: impl Into<Cow<'static, str>>) {
        self.builder.status = Status::error(description);
    }

    /// Start the underlying span with everything recorded so far and end it.
    pub fn finish(self) {
        let mut span = self.builder.start_with_context(&self.tracer, &self.parent);
        span.end();
    }
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Span")
            .field("name", &self.builder.name)
            .field("context", &self.context)
            .field("attributes", &self.builder.attributes)
            .finish_non_exhaustive()
    }
}
