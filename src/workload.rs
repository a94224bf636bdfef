//! Loopback traffic generator.
//!
//! # Responsibilities
//! - Assemble instrumented client and server pipelines over [`LocalChannel`]
//! - Serve `GET /ping` on the responder end
//! - Drive a fixed number of traced requests from the initiator end
//!
//! # Design Decisions
//! - One task per connection end, so every handler stays single-owner
//! - Each request runs under its own root span attached to the client
//!   connection, which the client handler continues and propagates

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use bytes::Bytes;
use http::header::{HeaderValue, CONTENT_LENGTH, CONTENT_TYPE, EXPECT};
use http::{Request, Response, StatusCode};
use opentelemetry::trace::SpanKind;
use tokio::task::JoinSet;

use crate::config::{ExchangeConfig, WorkloadConfig};
use crate::error::ChannelError;
use crate::http::{tags, HttpTracingFactory, Role};
use crate::net::{ChannelContext, ConnectionStatsFactory, HttpObject, LocalChannel, PeerAddress, Pipeline};
use crate::observability::metrics::MetricsRegistry;
use crate::observability::trace::Tracer;

const PING_PATH: &str = "/ping";
const SERVER_PORT: u16 = 8080;
const FIRST_CLIENT_PORT: u16 = 40000;

/// Builds connected, instrumented pipeline pairs.
#[derive(Debug, Clone)]
pub struct Loopback {
    tracing: HttpTracingFactory,
    client_stats: ConnectionStatsFactory,
    server_stats: ConnectionStatsFactory,
    tracer: Tracer,
}

impl Loopback {
    pub fn new(registry: MetricsRegistry, tracer: Tracer, exchange: &ExchangeConfig) -> Self {
        Self {
            tracing: HttpTracingFactory::from_config(registry.clone(), tracer.clone(), exchange),
            client_stats: ConnectionStatsFactory::new(
                registry.clone(),
                Role::Initiator,
                &exchange.address,
            ),
            server_stats: ConnectionStatsFactory::new(registry, Role::Responder, &exchange.address),
            tracer,
        }
    }

    pub fn tracer(&self) -> &Tracer {
        &self.tracer
    }

    /// Open connection number `index`: (client end, server end).
    pub fn connect(&self, index: u16) -> (LocalChannel, LocalChannel) {
        let server_addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), SERVER_PORT);
        let client_addr = SocketAddr::new(
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            FIRST_CLIENT_PORT.saturating_add(index),
        );

        let client = Pipeline::new(ChannelContext::new(Some(PeerAddress::resolved(
            "localhost",
            server_addr,
        ))))
        .add_last(self.client_stats.new_handler())
        .add_last(self.tracing.new_client_handler());

        let server = Pipeline::new(ChannelContext::new(Some(PeerAddress::inet(client_addr))))
            .add_last(self.server_stats.new_handler())
            .add_last(self.tracing.new_server_handler());

        LocalChannel::pair(client, server)
    }
}

/// Outcome of a workload run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkloadReport {
    pub succeeded: u64,
    pub failed: u64,
}

impl WorkloadReport {
    fn merge(&mut self, other: WorkloadReport) {
        self.succeeded += other.succeeded;
        self.failed += other.failed;
    }
}

/// Answer requests on `channel` until the peer goes away.
///
/// `GET /ping` gets a chunked `Pong`; anything else gets an empty 404.
/// `Expect: 100-continue` is acknowledged with an interim response first.
pub async fn serve_ping(mut channel: LocalChannel) -> Result<(), ChannelError> {
    let mut pending: Option<String> = None;
    while let Some(msg) = channel.read().await {
        if let Some(head) = msg.request_head() {
            let expects_continue = head
                .headers
                .get(EXPECT)
                .is_some_and(|v| v.as_bytes().eq_ignore_ascii_case(b"100-continue"));
            if expects_continue {
                channel.write(status_only(StatusCode::CONTINUE)).await?;
            }
            pending = Some(head.uri.path().to_string());
        }
        if msg.is_last() {
            if let Some(path) = pending.take() {
                respond(&mut channel, &path).await?;
            }
        }
    }
    Ok(())
}

async fn respond(channel: &mut LocalChannel, path: &str) -> Result<(), ChannelError> {
    if path != PING_PATH {
        return channel.write(status_only(StatusCode::NOT_FOUND)).await;
    }
    let mut head = Response::new(());
    head.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
    head.headers_mut()
        .insert(CONTENT_LENGTH, HeaderValue::from_static("4"));
    channel
        .write_all([
            HttpObject::response(head),
            HttpObject::content(Bytes::from_static(b"Po")),
            HttpObject::content(Bytes::from_static(b"ng")),
            HttpObject::last_content(Bytes::new()),
        ])
        .await
}

fn status_only(status: StatusCode) -> HttpObject {
    let mut res = Response::new(Bytes::new());
    *res.status_mut() = status;
    res.headers_mut()
        .insert(CONTENT_LENGTH, HeaderValue::from_static("0"));
    HttpObject::from(res)
}

/// Send `GET path` and wait for the final response status.
pub async fn send_get(channel: &mut LocalChannel, path: &str) -> Result<StatusCode, ChannelError> {
    let request = Request::get(path)
        .body(())
        .map_err(|e| ChannelError::Handler(e.to_string()))?;
    channel.write(HttpObject::request(request)).await?;
    channel.write(HttpObject::last_content(Bytes::new())).await?;

    let mut status = None;
    while let Some(msg) = channel.read().await {
        if msg.is_continue() {
            continue;
        }
        if let Some(head) = msg.response_head() {
            status = Some(head.status);
        }
        if msg.is_last() {
            return status.ok_or_else(|| ChannelError::Handler("response without head".into()));
        }
    }
    Err(ChannelError::Closed)
}

/// Issue `requests` traced GETs on one client connection.
pub async fn drive_client(
    channel: &mut LocalChannel,
    tracer: &Tracer,
    path: &str,
    requests: u64,
    interval: Duration,
) -> WorkloadReport {
    let mut report = WorkloadReport::default();
    for n in 0..requests {
        if n > 0 && !interval.is_zero() {
            tokio::time::sleep(interval).await;
        }

        let mut root = tracer.start_root("workload.request", SpanKind::Internal);
        channel.context_mut().attach_parent(Some(root.context().clone()));
        let result = send_get(channel, path).await;
        channel.context_mut().attach_parent(None);

        match result {
            Ok(status) => {
                root.set_tag(tags::HTTP_STATUS_CODE, i64::from(status.as_u16()));
                report.succeeded += 1;
                tracing::debug!(
                    connection_id = %channel.context().id(),
                    status = status.as_u16(),
                    "Request completed"
                );
            }
            Err(error) => {
                root.set_tag(tags::ERROR, true);
                report.failed += 1;
                tracing::warn!(
                    connection_id = %channel.context().id(),
                    error = %error,
                    "Request failed"
                );
                if matches!(error, ChannelError::Closed) {
                    root.finish();
                    break;
                }
            }
        }
        root.finish();
    }
    report
}

/// Share of `total` requests for connection `index`. The first connections
/// take the remainder; a zero total means unbounded.
fn requests_for(total: u64, connections: u16, index: u16) -> u64 {
    if total == 0 {
        return u64::MAX;
    }
    let connections = u64::from(connections);
    let index = u64::from(index);
    total / connections + u64::from(index < total % connections)
}

/// Run the configured workload across `config.connections` connections.
pub async fn run_workload(loopback: &Loopback, config: &WorkloadConfig) -> WorkloadReport {
    let connections = config.connections.max(1);
    let interval = Duration::from_millis(config.interval_ms);
    let mut tasks = JoinSet::new();

    for index in 0..connections {
        let share = requests_for(config.requests, connections, index);
        if share == 0 {
            continue;
        }

        let (mut client, server) = loopback.connect(index);
        let tracer = loopback.tracer().clone();
        let path = config.path.clone();
        tasks.spawn(async move {
            let server = tokio::spawn(serve_ping(server));
            let report = drive_client(&mut client, &tracer, &path, share, interval).await;
            client.close();
            match server.await {
                Ok(Err(error)) => tracing::warn!(error = %error, "Responder stopped with error"),
                Err(error) => tracing::error!(error = %error, "Responder task failed"),
                Ok(Ok(())) => {}
            }
            report
        });
    }

    let mut report = WorkloadReport::default();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(part) => report.merge(part),
            Err(error) => tracing::error!(error = %error, "Workload connection task failed"),
        }
    }

    tracing::info!(
        succeeded = report.succeeded,
        failed = report.failed,
        "Workload finished"
    );
    report
}
