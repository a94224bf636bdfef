//! Span and latency bookkeeping for one exchange.
//!
//! # Responsibilities
//! - Capture start time, method and status of the open exchange
//! - Create the exchange span (extract on the responder, inject on the initiator)
//! - Record exactly one metric observation and finish the span exactly once
//!
//! # Design Decisions
//! - One implementation for both roles; [`Role`] selects the span direction
//! - Every finalizing operation takes its inputs, so repeating it is a no-op
//! - No span without a parent context; spanless exchanges are still measured

use std::fmt;
use std::sync::Arc;

use http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use http::{request, response, HeaderMap};
use opentelemetry::KeyValue;

use crate::clock::{self, Ticker};
use crate::error::ChannelError;
use crate::http::carrier::HeaderCarrier;
use crate::http::peer::PeerAddressResolver;
use crate::http::{tags, Role, COMPONENT_NAME};
use crate::net::connection::ChannelContext;
use crate::observability::metrics::ExchangeMetrics;
use crate::observability::span::Span;
use crate::observability::trace::Tracer;

/// Collaborators shared by every exchange of one role.
pub struct ExchangeInstruments {
    role: Role,
    address: String,
    metrics: ExchangeMetrics,
    tracer: Tracer,
    ticker: Arc<dyn Ticker>,
    paths_start_with: Vec<String>,
}

impl ExchangeInstruments {
    pub fn new(
        role: Role,
        address: impl Into<String>,
        metrics: ExchangeMetrics,
        tracer: Tracer,
        ticker: Arc<dyn Ticker>,
    ) -> Self {
        Self {
            role,
            address: address.into(),
            metrics,
            tracer,
            ticker,
            paths_start_with: Vec::new(),
        }
    }

    /// Restrict responder measurement to URIs with one of these prefixes.
    pub fn with_paths(mut self, paths: Vec<String>) -> Self {
        self.paths_start_with = paths;
        self
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    fn measures(&self, path: &str) -> bool {
        self.role == Role::Initiator
            || self.paths_start_with.is_empty()
            || self.paths_start_with.iter().any(|p| path.starts_with(p.as_str()))
    }
}

impl fmt::Debug for ExchangeInstruments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExchangeInstruments")
            .field("role", &self.role)
            .field("address", &self.address)
            .field("paths_start_with", &self.paths_start_with)
            .finish_non_exhaustive()
    }
}

/// The open exchange of a connection.
#[derive(Debug, Default)]
pub struct Exchange {
    started_at: Option<u64>,
    method: Option<String>,
    status: Option<u16>,
    span: Option<Span>,
}

impl Exchange {
    pub fn method(&self) -> Option<&str> {
        self.method.as_deref()
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn span(&self) -> Option<&Span> {
        self.span.as_ref()
    }

    /// True while any bookkeeping for the exchange is outstanding.
    pub fn is_open(&self) -> bool {
        self.started_at.is_some()
            || self.method.is_some()
            || self.status.is_some()
            || self.span.is_some()
    }
}

/// Owns one connection's exchange bookkeeping for a given role.
#[derive(Debug)]
pub struct ExchangeTracingContext {
    instruments: Arc<ExchangeInstruments>,
    exchange: Exchange,
}

impl ExchangeTracingContext {
    pub fn new(instruments: Arc<ExchangeInstruments>) -> Self {
        Self {
            instruments,
            exchange: Exchange::default(),
        }
    }

    pub fn role(&self) -> Role {
        self.instruments.role
    }

    pub fn exchange(&self) -> &Exchange {
        &self.exchange
    }

    /// Begin an exchange from its request head.
    pub fn handle_request(&mut self, ctx: &mut ChannelContext, head: &mut request::Parts) {
        self.discard();
        let instruments = Arc::clone(&self.instruments);

        if !instruments.measures(head.uri.path()) {
            ctx.server_span = None;
            return;
        }

        self.exchange.started_at = Some(instruments.ticker.nano_time());
        self.exchange.method = Some(head.method.as_str().to_string());

        match instruments.role {
            Role::Responder => {
                let parent = instruments
                    .tracer
                    .extract(&HeaderCarrier::new(&mut head.headers));
                let span = parent.map(|parent| {
                    let mut span = instruments.tracer.start_child(
                        operation_name(head),
                        instruments.role.otel_kind(),
                        &parent,
                    );
                    tag_request(&mut span, Role::Responder, head);
                    PeerAddressResolver::apply(&mut span, ctx.peer());
                    span
                });
                ctx.server_span = span.as_ref().map(|span| span.context().clone());
                self.exchange.span = span;
            }
            Role::Initiator => {
                if let Some(parent) = ctx.client_parent.clone() {
                    let mut span = instruments.tracer.start_child(
                        operation_name(head),
                        instruments.role.otel_kind(),
                        &parent,
                    );
                    instruments
                        .tracer
                        .inject(span.context(), &mut HeaderCarrier::new(&mut head.headers));
                    tag_request(&mut span, Role::Initiator, head);
                    PeerAddressResolver::apply_hostname(&mut span, ctx.peer());
                    self.exchange.span = Some(span);
                }
            }
        }
    }

    /// Capture the response status and annotate the span.
    pub fn handle_response(&mut self, head: &response::Parts) {
        self.record_status(head.status.as_u16(), Some(&head.headers));
    }

    fn record_status(&mut self, status: u16, headers: Option<&HeaderMap>) {
        if self.exchange.started_at.is_none() {
            return;
        }
        self.exchange.status = Some(status);

        let role = self.instruments.role;
        let Some(span) = self.exchange.span.as_mut() else {
            return;
        };
        span.add_event(role.response_marker(), Vec::new());
        span.set_tag(tags::HTTP_STATUS_CODE, i64::from(status));

        let Some(headers) = headers else {
            return;
        };
        if let Some(content_type) = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()) {
            span.set_tag(tags::HTTP_CONTENT_TYPE, content_type.to_string());
        }
        let content_length = headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<i64>().ok());
        if let Some(length) = content_length {
            span.set_tag(tags::HTTP_CONTENT_LENGTH, length);
        }
    }

    /// Record the measurement and finish the span. Idempotent.
    pub fn completed(&mut self) {
        let started_at = self.exchange.started_at.take();
        let method = self.exchange.method.take();
        let status = self.exchange.status.take();

        if let (Some(started_at), Some(method), Some(status)) = (started_at, method, status) {
            let elapsed = clock::elapsed(started_at, self.instruments.ticker.nano_time());
            self.instruments.metrics.record_exchange(
                &self.instruments.address,
                status,
                &method,
                elapsed,
            );
        }

        if let Some(span) = self.exchange.span.take() {
            span.finish();
        }
    }

    /// Annotate the span with a failure seen on the connection.
    pub fn exception_caught(&mut self, error: &ChannelError) {
        self.annotate_error(error.kind(), &error.to_string());
    }

    /// Finalize an exchange whose peer went away before any response.
    pub fn handle_peer_closed(&mut self) {
        let role = self.instruments.role;
        self.record_status(role.peer_closed_status(), None);
        self.annotate_error(ChannelError::Closed.kind(), role.peer_closed_reason());
        self.completed();
    }

    /// Drop the open exchange without measuring it or reporting its span.
    pub fn discard(&mut self) {
        if self.exchange.is_open() {
            tracing::debug!(
                role = ?self.instruments.role,
                method = self.exchange.method.as_deref(),
                "Discarding unfinished exchange"
            );
        }
        self.exchange = Exchange::default();
    }

    fn annotate_error(&mut self, kind: &str, message: &str) {
        if let Some(span) = self.exchange.span.as_mut() {
            span.set_tag(tags::ERROR, true);
            span.set_error(message.to_string());
            span.add_event(
                tags::ERROR,
                vec![
                    KeyValue::new(tags::EVENT, "error"),
                    KeyValue::new(tags::ERROR_KIND, kind.to_string()),
                    KeyValue::new(tags::ERROR_MESSAGE, message.to_string()),
                ],
            );
        }
    }
}

fn operation_name(head: &request::Parts) -> String {
    format!("http.{}", head.method)
}

fn tag_request(span: &mut Span, role: Role, head: &request::Parts) {
    span.set_tag(tags::COMPONENT, COMPONENT_NAME);
    span.set_tag(tags::SPAN_KIND, role.span_kind());
    span.set_tag(tags::HTTP_METHOD, head.method.as_str().to_string());
    span.set_tag(tags::HTTP_URL, head.uri.to_string());
}
