//! Structured log events emitted by the dispatcher.
//!
//! Only events emitted on the calling thread are captured (decode, matching,
//! deadline and finalization); worker coroutines run on scheduler threads.

use brrtdispatch::context::RequestScope;
use brrtdispatch::decoder::RawRequest;
use brrtdispatch::ids::RequestId;
use brrtdispatch::payload::Payload;
use brrtdispatch::response::{Response, ResponseRecorder};
use brrtdispatch::router::RouteDescriptor;
use http::{Method, StatusCode};
use serde_json::json;
use std::time::Duration;

mod common;
mod tracing_util;
use common::fixtures::dispatcher;
use tracing_util::TestTracing;

#[test]
fn test_finalized_request_is_logged_with_fields() {
    let tracing = TestTracing::init();
    let route = RouteDescriptor::builder("ping")
        .handler(|_: &Payload, r: &mut Response| r.set_result(json!("pong")));
    let (dispatcher, _) = dispatcher(vec![route], 1_000);

    let recorder = ResponseRecorder::new();
    dispatcher
        .serve(RawRequest::new(Method::GET, "/ping"), recorder.sink())
        .unwrap();

    let matched = tracing.find("Route matched");
    assert_eq!(matched.len(), 1);
    assert_eq!(matched[0]["fields"]["tag"], json!("ping"));

    let finalized = tracing.find("Request finalized");
    assert_eq!(finalized.len(), 1);
    let fields = &finalized[0]["fields"];
    assert_eq!(fields["status"], json!(200));
    assert_eq!(fields["tag"], json!("ping"));
    assert!(fields["latency_ms"].is_u64());
    assert_eq!(
        fields["request_id"].as_str().map(str::len),
        Some(26),
        "request id is a ULID"
    );
}

#[test]
fn test_timeout_is_logged_as_error() {
    let tracing = TestTracing::init();
    let route = RouteDescriptor::builder("slow").handler(|_: &Payload, r: &mut Response| {
        may::coroutine::sleep(Duration::from_millis(80));
        r.set_result(json!("late"));
    });
    let (dispatcher, _) = dispatcher(vec![route], 20);

    let recorder = ResponseRecorder::new();
    dispatcher
        .serve(RawRequest::new(Method::GET, "/slow"), recorder.sink())
        .unwrap();

    let elapsed = tracing.find("Response deadline elapsed");
    assert_eq!(elapsed.len(), 1);
    assert_eq!(elapsed[0]["level"], json!("ERROR"));
    assert_eq!(elapsed[0]["fields"]["timeout_ms"], json!(20));
    assert_eq!(elapsed[0]["fields"]["tag"], json!("slow"));
}

#[test]
fn test_double_finalize_is_logged() {
    let tracing = TestTracing::init();
    let (dispatcher, _) = dispatcher(vec![], 1_000);
    let recorder = ResponseRecorder::new();
    let response = Response::new(recorder.sink());
    let scope = RequestScope {
        tag: Some("twice".into()),
        request_id: RequestId::new(),
    };

    assert!(dispatcher
        .finalize(&scope, &response, StatusCode::OK)
        .is_ok());
    assert!(dispatcher
        .finalize(&scope, &response, StatusCode::OK)
        .is_err());

    let attempts = tracing.find("Attempted to finalize an already finalized response");
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0]["level"], json!("ERROR"));
    assert_eq!(attempts[0]["fields"]["tag"], json!("twice"));
}

#[test]
fn test_unmatched_route_is_logged() {
    let tracing = TestTracing::init();
    let (dispatcher, _) = dispatcher(vec![], 1_000);
    let recorder = ResponseRecorder::new();
    dispatcher
        .serve(RawRequest::new(Method::GET, "/nowhere"), recorder.sink())
        .unwrap();

    let unmatched = tracing.find("Route unmatched");
    assert_eq!(unmatched.len(), 1);
    assert_eq!(unmatched[0]["fields"]["action"], json!("nowhere"));
}
