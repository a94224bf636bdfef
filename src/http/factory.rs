//! Construction of per-connection tracing handlers.

use std::sync::Arc;

use crate::clock::{MonotonicTicker, Ticker};
use crate::config::ExchangeConfig;
use crate::http::context::{ExchangeInstruments, ExchangeTracingContext};
use crate::http::handler::HttpTracingHandler;
use crate::http::Role;
use crate::observability::metrics::{ExchangeMetrics, MetricsRegistry};
use crate::observability::trace::Tracer;

/// Produces fresh [`HttpTracingHandler`]s that share one registry and tracer.
///
/// Insert one handler per connection; handlers must never be shared.
#[derive(Debug, Clone)]
pub struct HttpTracingFactory {
    client: Arc<ExchangeInstruments>,
    server: Arc<ExchangeInstruments>,
}

impl HttpTracingFactory {
    pub fn builder(registry: MetricsRegistry) -> HttpTracingFactoryBuilder {
        HttpTracingFactoryBuilder {
            registry,
            address: ":0".to_string(),
            tracer: None,
            ticker: None,
            paths_start_with: Vec::new(),
        }
    }

    /// Factory configured from the `[exchange]` section.
    pub fn from_config(registry: MetricsRegistry, tracer: Tracer, config: &ExchangeConfig) -> Self {
        Self::builder(registry)
            .address(config.address.clone())
            .tracer(tracer)
            .paths_start_with(config.paths_start_with.clone())
            .build()
    }

    /// Handler for a connection that sends requests.
    pub fn new_client_handler(&self) -> HttpTracingHandler {
        HttpTracingHandler::new(ExchangeTracingContext::new(Arc::clone(&self.client)))
    }

    /// Handler for a connection that receives requests.
    pub fn new_server_handler(&self) -> HttpTracingHandler {
        HttpTracingHandler::new(ExchangeTracingContext::new(Arc::clone(&self.server)))
    }

    pub fn new_handler(&self, role: Role) -> HttpTracingHandler {
        match role {
            Role::Initiator => self.new_client_handler(),
            Role::Responder => self.new_server_handler(),
        }
    }

    /// Value of the `address` metric label.
    pub fn address(&self) -> &str {
        self.server.address()
    }
}

/// Builder for [`HttpTracingFactory`].
#[derive(Debug)]
pub struct HttpTracingFactoryBuilder {
    registry: MetricsRegistry,
    address: String,
    tracer: Option<Tracer>,
    ticker: Option<Arc<dyn Ticker>>,
    paths_start_with: Vec<String>,
}

impl HttpTracingFactoryBuilder {
    /// Value of the `address` metric label. Defaults to `":0"`.
    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    /// Set the address label from a host and port. An empty host renders as `":port"`.
    pub fn address_parts(self, host: &str, port: u16) -> Self {
        self.address(format!("{host}:{port}"))
    }

    /// Defaults to a tracer that logs finished spans.
    pub fn tracer(mut self, tracer: Tracer) -> Self {
        self.tracer = Some(tracer);
        self
    }

    pub fn ticker(mut self, ticker: Arc<dyn Ticker>) -> Self {
        self.ticker = Some(ticker);
        self
    }

    /// Only measure responder requests whose path starts with one of these.
    pub fn paths_start_with<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.paths_start_with = paths.into_iter().map(Into::into).collect();
        self
    }

    pub fn build(self) -> HttpTracingFactory {
        let tracer = self.tracer.unwrap_or_else(Tracer::logging);
        let ticker = self
            .ticker
            .unwrap_or_else(|| Arc::new(MonotonicTicker::new()));

        let instruments = |role: Role| {
            ExchangeInstruments::new(
                role,
                self.address.clone(),
                ExchangeMetrics::new(self.registry.clone(), role.subsystem()),
                tracer.clone(),
                Arc::clone(&ticker),
            )
        };
        let client = instruments(Role::Initiator);
        let server = instruments(Role::Responder).with_paths(self.paths_start_with.clone());

        HttpTracingFactory {
            client: Arc::new(client),
            server: Arc::new(server),
        }
    }
}
