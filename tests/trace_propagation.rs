//! Trace context crossing the wire between initiator and responder.

use bytes::Bytes;
use exchange_telemetry::http::tags;
use exchange_telemetry::net::HttpObject;
use exchange_telemetry::observability::propagation::TRACEPARENT;
use exchange_telemetry::workload::{drive_client, send_get, serve_ping};
use http::{Response, StatusCode};
use opentelemetry::trace::{SpanId, SpanKind};
use opentelemetry::Value;
use std::time::Duration;

mod common;

use common::{attribute, event_names, remote_parent, span_of_kind, traced_get, Harness};

#[tokio::test]
async fn responder_span_joins_the_initiator_trace() {
    let harness = Harness::new();
    let (mut client, server) = harness.connect();
    let responder = tokio::spawn(serve_ping(server));

    let root = harness.tracer.start_root("test.root", SpanKind::Internal);
    let root_ctx = root.context().clone();
    client.context_mut().attach_parent(Some(root_ctx.clone()));
    assert_eq!(send_get(&mut client, "/ping").await.unwrap(), StatusCode::OK);
    client.context_mut().attach_parent(None);
    root.finish();

    client.close();
    responder.await.unwrap().unwrap();

    let spans = harness.finished_spans();
    assert_eq!(spans.len(), 3, "{spans:#?}");
    let client_span = span_of_kind(&spans, SpanKind::Client);
    let server_span = span_of_kind(&spans, SpanKind::Server);

    assert_eq!(client_span.span_context.trace_id(), root_ctx.trace_id());
    assert_eq!(server_span.span_context.trace_id(), root_ctx.trace_id());
    assert_eq!(client_span.parent_span_id, root_ctx.span_id());
    assert_eq!(server_span.parent_span_id, client_span.span_context.span_id());

    for span in [client_span, server_span] {
        assert_eq!(span.name, "http.GET");
        assert_eq!(attribute(span, tags::HTTP_METHOD), Some(Value::from("GET")));
        assert_eq!(attribute(span, tags::HTTP_URL), Some(Value::from("/ping")));
        assert_eq!(attribute(span, tags::HTTP_STATUS_CODE), Some(Value::I64(200)));
        assert_eq!(attribute(span, tags::HTTP_CONTENT_LENGTH), Some(Value::I64(4)));
        assert_eq!(
            attribute(span, tags::HTTP_CONTENT_TYPE),
            Some(Value::from("text/plain"))
        );
        assert!(attribute(span, tags::ERROR).is_none());
    }

    assert_eq!(attribute(client_span, tags::SPAN_KIND), Some(Value::from("client")));
    assert_eq!(attribute(server_span, tags::SPAN_KIND), Some(Value::from("server")));
    assert_eq!(event_names(client_span), vec!["cr"]);
    assert_eq!(event_names(server_span), vec!["ss"]);
    assert_eq!(
        attribute(client_span, tags::PEER_HOSTNAME),
        Some(Value::from("localhost"))
    );
    assert_eq!(
        attribute(server_span, tags::PEER_ADDRESS),
        Some(Value::from("127.0.0.1:40000"))
    );
}

#[tokio::test]
async fn forwarded_request_continues_the_client_span_not_the_upstream() {
    let harness = Harness::new();
    let (mut client, server) = harness.connect();
    let responder = tokio::spawn(serve_ping(server));

    let upstream = remote_parent("00000000000000000000000000001111", "0000000000002222");
    let root = harness.tracer.start_root("test.root", SpanKind::Internal);
    let root_ctx = root.context().clone();
    client.context_mut().attach_parent(Some(root_ctx.clone()));

    // The request already carries a traceparent from an earlier hop.
    client.write(traced_get("/ping", &upstream)).await.unwrap();
    client.write(HttpObject::last_content(Bytes::new())).await.unwrap();
    loop {
        let msg = client.read().await.unwrap();
        if msg.is_last() {
            break;
        }
    }
    root.finish();
    client.close();
    responder.await.unwrap().unwrap();

    let spans = harness.finished_spans();
    let client_span = span_of_kind(&spans, SpanKind::Client);
    let server_span = span_of_kind(&spans, SpanKind::Server);
    assert_eq!(client_span.parent_span_id, root_ctx.span_id());
    assert_eq!(server_span.parent_span_id, client_span.span_context.span_id());
    assert_eq!(server_span.span_context.trace_id(), root_ctx.trace_id());
    assert_ne!(server_span.span_context.trace_id(), upstream.trace_id());
}

#[tokio::test]
async fn server_span_is_exposed_while_the_exchange_is_open() {
    let harness = Harness::new();
    let (mut client, mut server) = harness.connect();

    let root = harness.tracer.start_root("test.root", SpanKind::Internal);
    client.context_mut().attach_parent(Some(root.context().clone()));
    client.write(common::get("/ping")).await.unwrap();
    client.write(common::end()).await.unwrap();

    let head = server.read().await.unwrap();
    assert!(head.request_head().unwrap().headers.contains_key(TRACEPARENT));
    let server_span = server.context().server_span.clone().unwrap();
    assert_eq!(server_span.trace_id(), root.context().trace_id());
    assert!(server.read().await.unwrap().is_last());

    server
        .write_all([
            HttpObject::response(Response::new(())),
            HttpObject::last_content(Bytes::new()),
        ])
        .await
        .unwrap();
    assert!(server.context().server_span.is_none());

    let spans = harness.finished_spans();
    let finished = span_of_kind(&spans, SpanKind::Server);
    assert_eq!(finished.span_context.span_id(), server_span.span_id());
}

#[tokio::test]
async fn each_workload_request_is_its_own_trace() {
    let harness = Harness::new();
    let (mut client, server) = harness.connect();
    let responder = tokio::spawn(serve_ping(server));

    let report = drive_client(&mut client, &harness.tracer, "/ping", 2, Duration::ZERO).await;
    assert_eq!(report.succeeded, 2);
    client.close();
    responder.await.unwrap().unwrap();

    let spans = harness.finished_spans();
    let roots: Vec<_> = spans
        .iter()
        .filter(|s| s.parent_span_id == SpanId::INVALID)
        .collect();
    assert_eq!(roots.len(), 2);
    assert_ne!(
        roots[0].span_context.trace_id(),
        roots[1].span_context.trace_id()
    );
    for root in roots {
        let members = spans
            .iter()
            .filter(|s| s.span_context.trace_id() == root.span_context.trace_id())
            .count();
        assert_eq!(members, 3);
    }
}
