//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;
use exchange_telemetry::clock::StepTicker;
use exchange_telemetry::config::schema::DEFAULT_LATENCY_BUCKETS;
use exchange_telemetry::http::HeaderCarrier;
use exchange_telemetry::net::{ChannelContext, HttpObject, LocalChannel, PeerAddress, Pipeline};
use exchange_telemetry::observability::ContextPropagation;
use exchange_telemetry::{HttpTracingFactory, MetricsRegistry, Tracer};
use http::Request;
use opentelemetry::trace::{SpanContext, SpanId, SpanKind, TraceFlags, TraceId, TraceState};
use opentelemetry::Value;
use opentelemetry_sdk::export::trace::SpanData;
use opentelemetry_sdk::testing::trace::InMemorySpanExporter;

/// Registry, in-memory span exporter and one factory per role.
///
/// Each role gets its own step ticker, so one exchange on one connection
/// always measures exactly one millisecond.
pub struct Harness {
    pub registry: MetricsRegistry,
    pub exporter: InMemorySpanExporter,
    pub tracer: Tracer,
    pub client: HttpTracingFactory,
    pub server: HttpTracingFactory,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_paths(Vec::<String>::new())
    }

    pub fn with_paths(paths: Vec<String>) -> Self {
        let registry = MetricsRegistry::prometheus(&DEFAULT_LATENCY_BUCKETS).unwrap();
        let exporter = InMemorySpanExporter::default();
        let tracer = Tracer::with_exporter(exporter.clone());
        let factory = || {
            HttpTracingFactory::builder(registry.clone())
                .tracer(tracer.clone())
                .ticker(Arc::new(StepTicker::millis()))
                .paths_start_with(paths.clone())
                .build()
        };
        let client = factory();
        let server = factory();
        Self {
            registry,
            exporter,
            tracer,
            client,
            server,
        }
    }

    pub fn client_pipeline(&self) -> Pipeline {
        Pipeline::new(ChannelContext::new(Some(PeerAddress::unresolved("localhost", 8080))))
            .add_last(self.client.new_client_handler())
    }

    pub fn server_pipeline(&self) -> Pipeline {
        let peer = PeerAddress::inet("127.0.0.1:40000".parse().unwrap());
        Pipeline::new(ChannelContext::new(Some(peer))).add_last(self.server.new_server_handler())
    }

    /// Both ends instrumented.
    pub fn connect(&self) -> (LocalChannel, LocalChannel) {
        LocalChannel::pair(self.client_pipeline(), self.server_pipeline())
    }

    pub fn render(&self) -> String {
        self.registry.render()
    }

    pub fn finished_spans(&self) -> Vec<SpanData> {
        self.exporter.get_finished_spans().unwrap()
    }
}

/// A pipeline with no handlers.
pub fn bare_pipeline() -> Pipeline {
    Pipeline::new(ChannelContext::default())
}

pub fn get(path: &str) -> HttpObject {
    HttpObject::request(Request::get(path).body(()).unwrap())
}

pub fn traced_get(path: &str, parent: &SpanContext) -> HttpObject {
    let mut request = Request::get(path).body(()).unwrap();
    ContextPropagation::new().inject(parent, &mut HeaderCarrier::new(request.headers_mut()));
    HttpObject::request(request)
}

/// A sampled remote context with fixed ids.
pub fn remote_parent(trace_id: &str, span_id: &str) -> SpanContext {
    SpanContext::new(
        TraceId::from_hex(trace_id).unwrap(),
        SpanId::from_hex(span_id).unwrap(),
        TraceFlags::SAMPLED,
        true,
        TraceState::default(),
    )
}

pub fn span_of_kind(spans: &[SpanData], kind: SpanKind) -> &SpanData {
    spans
        .iter()
        .find(|s| s.span_kind == kind)
        .unwrap_or_else(|| panic!("no {kind:?} span in {spans:#?}"))
}

pub fn attribute(span: &SpanData, key: &str) -> Option<Value> {
    span.attributes
        .iter()
        .find(|kv| kv.key.as_str() == key)
        .map(|kv| kv.value.clone())
}

pub fn event_names(span: &SpanData) -> Vec<String> {
    span.events.iter().map(|event| event.name.to_string()).collect()
}

pub fn event_attribute(span: &SpanData, name: &str, key: &str) -> Option<Value> {
    span.events
        .iter()
        .find(|event| event.name == name)?
        .attributes
        .iter()
        .find(|kv| kv.key.as_str() == key)
        .map(|kv| kv.value.clone())
}

pub fn end() -> HttpObject {
    HttpObject::last_content(Bytes::new())
}

/// One parsed exposition line.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub name: String,
    pub labels: BTreeMap<String, String>,
    pub value: f64,
}

/// Parse Prometheus text exposition into samples.
pub fn samples(text: &str) -> Vec<Sample> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let (series, value) = line.rsplit_once(' ')?;
            let value: f64 = value.parse().ok()?;
            let (name, labels) = match series.split_once('{') {
                Some((name, rest)) => (name, parse_labels(rest.trim_end_matches('}'))),
                None => (series, BTreeMap::new()),
            };
            Some(Sample {
                name: name.to_string(),
                labels,
                value,
            })
        })
        .collect()
}

fn parse_labels(body: &str) -> BTreeMap<String, String> {
    body.split(',')
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            Some((key.trim().to_string(), value.trim_matches('"').to_string()))
        })
        .collect()
}

/// Value of the sample `name` whose labels are exactly `labels`.
pub fn sample_value(text: &str, name: &str, labels: &[(&str, &str)]) -> Option<f64> {
    let wanted: BTreeMap<String, String> = labels
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    samples(text)
        .into_iter()
        .find(|s| s.name == name && s.labels == wanted)
        .map(|s| s.value)
}

/// All samples named `name`.
pub fn series(text: &str, name: &str) -> Vec<Sample> {
    samples(text).into_iter().filter(|s| s.name == name).collect()
}

pub fn exchange_labels<'a>(code: &'a str) -> [(&'static str, &'a str); 3] {
    [("address", ":0"), ("http_code", code), ("http_method", "GET")]
}

pub fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}
