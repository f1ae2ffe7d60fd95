//! Route table publication while requests are in flight.

use brrtdispatch::decoder::RawRequest;
use brrtdispatch::dispatcher::Dispatcher;
use brrtdispatch::payload::Payload;
use brrtdispatch::response::{Response, ResponseRecorder};
use brrtdispatch::router::{Matcher, RouteDescriptor, RouteDescriptorBuilder, RouteTable};
use http::{Method, StatusCode};
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

mod common;

fn version_route(version: u32, started: Arc<AtomicBool>) -> RouteDescriptorBuilder {
    RouteDescriptor::builder("version").handler(move |_: &Payload, r: &mut Response| {
        started.store(true, Ordering::SeqCst);
        may::coroutine::sleep(Duration::from_millis(30));
        r.set_result(json!(version));
    })
}

#[test]
fn test_publish_does_not_disturb_in_flight_requests() {
    common::test_server::setup_may_runtime();
    let started = Arc::new(AtomicBool::new(false));
    let table = Arc::new(
        RouteTable::builder()
            .route(version_route(1, Arc::clone(&started)))
            .build(),
    );
    let dispatcher = Arc::new(Dispatcher::builder(Arc::clone(&table) as Arc<dyn Matcher>).build());

    let in_flight = {
        let dispatcher = Arc::clone(&dispatcher);
        std::thread::spawn(move || {
            let recorder = ResponseRecorder::new();
            dispatcher
                .serve(RawRequest::new(Method::GET, "/version"), recorder.sink())
                .unwrap();
            recorder
        })
    };
    while !started.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(1));
    }
    table.publish(RouteTable::builder().route(version_route(2, Arc::new(AtomicBool::new(false)))));

    let first = in_flight.join().unwrap();
    assert_eq!(first.json(), json!({"result": 1}));

    let recorder = ResponseRecorder::new();
    dispatcher
        .serve(RawRequest::new(Method::GET, "/version"), recorder.sink())
        .unwrap();
    assert_eq!(recorder.json(), json!({"result": 2}));
}

#[test]
fn test_custom_matcher() {
    struct Fallback(Arc<RouteDescriptor>);

    impl Matcher for Fallback {
        fn match_route(
            &self,
            _: &Payload,
        ) -> Result<Arc<RouteDescriptor>, brrtdispatch::router::RouteNotFound> {
            Ok(Arc::clone(&self.0))
        }
    }

    struct Exploding;

    impl Matcher for Exploding {
        fn match_route(
            &self,
            _: &Payload,
        ) -> Result<Arc<RouteDescriptor>, brrtdispatch::router::RouteNotFound> {
            panic!("matcher bug")
        }
    }

    common::test_server::setup_may_runtime();
    let fallback = RouteDescriptor::builder("fallback")
        .handler(|p: &Payload, r: &mut Response| r.set_result(json!(p.action)))
        .build();
    let dispatcher = Dispatcher::builder(Arc::new(Fallback(Arc::new(fallback)))).build();
    let recorder = ResponseRecorder::new();
    dispatcher
        .serve(RawRequest::new(Method::GET, "/any/thing"), recorder.sink())
        .unwrap();
    assert_eq!(recorder.json(), json!({"result": "any:thing"}));

    let dispatcher = Dispatcher::builder(Arc::new(Exploding)).build();
    let recorder = ResponseRecorder::new();
    dispatcher
        .serve(RawRequest::new(Method::GET, "/any"), recorder.sink())
        .unwrap();
    assert_eq!(recorder.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
    assert_eq!(
        recorder.json()["error"]["message"],
        json!("panic occurred while handling request: matcher bug")
    );
    assert_eq!(
        recorder.header("content-type").as_deref(),
        Some("application/json")
    );
}
