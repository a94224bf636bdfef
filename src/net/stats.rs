//! Connection lifecycle and byte counters.

use std::sync::Arc;

use crate::clock::{self, MonotonicTicker, Ticker};
use crate::error::ChannelError;
use crate::http::Role;
use crate::net::connection::ChannelContext;
use crate::net::message::HttpObject;
use crate::net::pipeline::{ChannelHandler, WritePromise};
use crate::observability::metrics::{ConnectStatus, ConnectionMetrics, MetricsRegistry};

/// Builds one [`ConnectionStatsHandler`] per connection for a role.
#[derive(Debug, Clone)]
pub struct ConnectionStatsFactory {
    metrics: ConnectionMetrics,
    ticker: Arc<dyn Ticker>,
}

impl ConnectionStatsFactory {
    pub fn new(registry: MetricsRegistry, role: Role, address: &str) -> Self {
        Self {
            metrics: ConnectionMetrics::new(registry, role.subsystem(), address),
            ticker: Arc::new(MonotonicTicker::new()),
        }
    }

    pub fn with_ticker(mut self, ticker: Arc<dyn Ticker>) -> Self {
        self.ticker = ticker;
        self
    }

    pub fn new_handler(&self) -> ConnectionStatsHandler {
        ConnectionStatsHandler {
            metrics: self.metrics.clone(),
            ticker: self.ticker.clone(),
            opened_at: None,
        }
    }
}

/// Records open/close/failure events and payload bytes of one connection.
#[derive(Debug)]
pub struct ConnectionStatsHandler {
    metrics: ConnectionMetrics,
    ticker: Arc<dyn Ticker>,
    opened_at: Option<u64>,
}

impl ChannelHandler for ConnectionStatsHandler {
    fn channel_active(&mut self, _ctx: &mut ChannelContext) {
        self.opened_at = Some(self.ticker.nano_time());
        self.metrics.record_open();
        self.metrics.record_connect(ConnectStatus::Active);
    }

    fn channel_read(&mut self, _ctx: &mut ChannelContext, msg: &mut HttpObject) {
        let len = msg.payload_len();
        if len > 0 {
            self.metrics.record_received(len);
        }
    }

    fn write(&mut self, _ctx: &mut ChannelContext, msg: &mut HttpObject, _: &mut WritePromise) {
        let len = msg.payload_len();
        if len > 0 {
            self.metrics.record_sent(len);
        }
    }

    fn channel_inactive(&mut self, _ctx: &mut ChannelContext) {
        // The lifetime is observed once even if inactive were delivered twice.
        let Some(opened_at) = self.opened_at.take() else {
            return;
        };
        let lifetime = clock::elapsed(opened_at, self.ticker.nano_time());
        self.metrics.record_close(lifetime);
        self.metrics.record_connect(ConnectStatus::Inactive);
    }

    fn exception_caught(&mut self, _ctx: &mut ChannelContext, _error: &ChannelError) {
        self.metrics.record_connect(ConnectStatus::Failed);
    }
}
