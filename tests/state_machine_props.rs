//! Randomized event sequences against a single responder handler.

use exchange_telemetry::error::ChannelError;
use exchange_telemetry::http::ExchangeState;
use exchange_telemetry::net::{ChannelContext, ChannelHandler, HttpObject, WritePromise};
use http::{Response, StatusCode};
use proptest::prelude::*;

mod common;

use common::{end, remote_parent, series, traced_get, Harness};

#[derive(Debug, Clone, Copy)]
enum Event {
    ReadRequest,
    ReadEnd,
    WriteResponse(u16),
    WriteContinue,
    WriteEnd,
    Flush,
    Exception,
    Inactive,
}

fn event() -> impl Strategy<Value = Event> {
    prop_oneof![
        3 => Just(Event::ReadRequest),
        1 => Just(Event::ReadEnd),
        3 => prop_oneof![Just(200u16), Just(404), Just(503)].prop_map(Event::WriteResponse),
        1 => Just(Event::WriteContinue),
        3 => Just(Event::WriteEnd),
        3 => Just(Event::Flush),
        1 => Just(Event::Exception),
        1 => Just(Event::Inactive),
    ]
}

fn response(status: u16) -> HttpObject {
    let mut head = Response::new(());
    *head.status_mut() = StatusCode::from_u16(status).unwrap();
    HttpObject::response(head)
}

struct Run {
    harness: Harness,
    requests: usize,
}

/// Feed `events` to a fresh responder handler the way a pipeline would,
/// ending with connection teardown.
fn run(events: &[Event]) -> Run {
    let harness = Harness::new();
    let parent = remote_parent("00000000000000000000000000000abc", "0000000000000def");
    let mut handler = harness.server.new_server_handler();
    let mut ctx = ChannelContext::default();
    let mut pending_flush = false;
    let mut requests = 0;
    let mut inactive = false;

    handler.channel_active(&mut ctx);
    for event in events {
        if inactive {
            break;
        }
        let mut promise = WritePromise::default();
        match *event {
            Event::ReadRequest => {
                requests += 1;
                handler.channel_read(&mut ctx, &mut traced_get("/ping", &parent));
            }
            Event::ReadEnd => handler.channel_read(&mut ctx, &mut end()),
            Event::WriteResponse(status) => {
                handler.write(&mut ctx, &mut response(status), &mut promise)
            }
            Event::WriteContinue => handler.write(&mut ctx, &mut response(100), &mut promise),
            Event::WriteEnd => handler.write(&mut ctx, &mut end(), &mut promise),
            Event::Flush => {
                if pending_flush {
                    pending_flush = false;
                    handler.write_complete(&mut ctx);
                }
            }
            Event::Exception => {
                handler.exception_caught(&mut ctx, &ChannelError::Handler("boom".into()))
            }
            Event::Inactive => {
                handler.channel_inactive(&mut ctx);
                inactive = true;
            }
        }
        pending_flush |= promise.has_listeners();
    }
    handler.channel_inactive(&mut ctx);
    assert_eq!(handler.state(), ExchangeState::Idle);
    assert!(!handler.context().exchange().is_open());

    Run { harness, requests }
}

fn handled_total(run: &Run) -> f64 {
    series(&run.harness.render(), "http_server_handled_total")
        .iter()
        .map(|s| s.value)
        .sum()
}

proptest! {
    #[test]
    fn side_effects_never_exceed_requests(events in prop::collection::vec(event(), 0..40)) {
        let run = run(&events);
        let handled = handled_total(&run);
        let spans = run.harness.finished_spans().len();

        prop_assert!(handled <= run.requests as f64, "handled {handled} > requests {}", run.requests);
        prop_assert!(spans <= run.requests, "spans {spans} > requests {}", run.requests);
        // Every reported span belongs to a measured exchange.
        prop_assert!(spans as f64 <= handled);
    }

    #[test]
    fn well_formed_exchanges_are_each_measured_once(count in 1usize..8, status in prop_oneof![Just(200u16), Just(500)]) {
        let events: Vec<Event> = (0..count)
            .flat_map(|_| [
                Event::ReadRequest,
                Event::ReadEnd,
                Event::WriteContinue,
                Event::WriteEnd,
                Event::WriteResponse(status),
                Event::WriteEnd,
                Event::Flush,
            ])
            .collect();
        let run = run(&events);

        prop_assert_eq!(handled_total(&run), count as f64);
        prop_assert_eq!(run.harness.finished_spans().len(), count);
    }
}
