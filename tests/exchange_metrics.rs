//! Metric observations for complete exchanges over instrumented connections.

use exchange_telemetry::workload::{send_get, serve_ping};
use http::header::EXPECT;
use http::{Request, StatusCode};
use exchange_telemetry::net::HttpObject;

mod common;

use common::{approx_eq, end, exchange_labels, sample_value, series, Harness};

#[tokio::test]
async fn three_pings_record_three_observations_per_role() {
    let harness = Harness::new();
    let (mut client, server) = harness.connect();
    let responder = tokio::spawn(serve_ping(server));

    for _ in 0..3 {
        assert_eq!(send_get(&mut client, "/ping").await.unwrap(), StatusCode::OK);
    }
    client.close();
    responder.await.unwrap().unwrap();

    let text = harness.render();
    for role in ["client", "server"] {
        let total = format!("http_{role}_handled_total");
        let latency = format!("http_{role}_handled_latency_seconds");

        assert_eq!(sample_value(&text, &total, &exchange_labels("200")), Some(3.0), "{text}");
        assert_eq!(series(&text, &total).len(), 1, "unexpected label sets:\n{text}");
        assert_eq!(
            sample_value(&text, &format!("{latency}_count"), &exchange_labels("200")),
            Some(3.0)
        );
        let sum = sample_value(&text, &format!("{latency}_sum"), &exchange_labels("200")).unwrap();
        assert!(approx_eq(sum, 0.003), "{role} latency sum was {sum}");
    }
}

#[tokio::test]
async fn spanless_exchanges_are_still_measured() {
    let harness = Harness::new();
    let (mut client, server) = harness.connect();
    let responder = tokio::spawn(serve_ping(server));

    send_get(&mut client, "/ping").await.unwrap();
    client.close();
    responder.await.unwrap().unwrap();

    assert!(harness.finished_spans().is_empty());
    let text = harness.render();
    assert_eq!(
        sample_value(&text, "http_server_handled_total", &exchange_labels("200")),
        Some(1.0)
    );
}

#[tokio::test]
async fn continue_is_not_mistaken_for_the_response() {
    let harness = Harness::new();
    let (mut client, server) = harness.connect();
    let responder = tokio::spawn(serve_ping(server));

    let request = Request::get("/ping")
        .header(EXPECT, "100-continue")
        .body(())
        .unwrap();
    client.write(HttpObject::request(request)).await.unwrap();
    client.write(end()).await.unwrap();

    let interim = client.read().await.unwrap();
    assert!(interim.is_continue());
    let mut last = client.read().await.unwrap();
    assert_eq!(last.response_head().unwrap().status, StatusCode::OK);
    while !last.is_last() {
        last = client.read().await.unwrap();
    }

    client.close();
    responder.await.unwrap().unwrap();

    let text = harness.render();
    for role in ["client", "server"] {
        let total = format!("http_{role}_handled_total");
        assert_eq!(sample_value(&text, &total, &exchange_labels("200")), Some(1.0), "{text}");
        assert_eq!(sample_value(&text, &total, &exchange_labels("100")), None, "{text}");
    }
}

#[tokio::test]
async fn not_found_is_labelled_with_its_status() {
    let harness = Harness::new();
    let (mut client, server) = harness.connect();
    let responder = tokio::spawn(serve_ping(server));

    assert_eq!(
        send_get(&mut client, "/missing").await.unwrap(),
        StatusCode::NOT_FOUND
    );
    client.close();
    responder.await.unwrap().unwrap();

    let text = harness.render();
    assert_eq!(
        sample_value(&text, "http_server_handled_total", &exchange_labels("404")),
        Some(1.0)
    );
    assert_eq!(
        sample_value(&text, "http_client_handled_total", &exchange_labels("404")),
        Some(1.0)
    );
}

#[tokio::test]
async fn path_filter_limits_responder_measurement() {
    let harness = Harness::with_paths(vec!["/ping".into()]);
    let (mut client, server) = harness.connect();
    let responder = tokio::spawn(serve_ping(server));

    send_get(&mut client, "/missing").await.unwrap();
    send_get(&mut client, "/ping").await.unwrap();
    client.close();
    responder.await.unwrap().unwrap();

    let text = harness.render();
    assert_eq!(series(&text, "http_server_handled_total").len(), 1, "{text}");
    assert_eq!(
        sample_value(&text, "http_server_handled_total", &exchange_labels("200")),
        Some(1.0)
    );
    // The initiator is never filtered.
    assert_eq!(series(&text, "http_client_handled_total").len(), 2, "{text}");
}
