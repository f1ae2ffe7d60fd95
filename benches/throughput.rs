use brrtdispatch::decoder::{Decoder, JsonDecoder, RawRequest};
use brrtdispatch::dispatcher::Dispatcher;
use brrtdispatch::payload::Payload;
use brrtdispatch::processor::ApiKeyProcessor;
use brrtdispatch::response::{Response, ResponseRecorder};
use brrtdispatch::router::{Matcher, RouteDescriptor, RouteTable};
use criterion::{criterion_group, criterion_main, Criterion};
use http::{HeaderValue, Method};
use serde_json::json;
use std::hint::black_box;
use std::sync::Arc;

fn zoo_table() -> RouteTable {
    let actions = [
        "zoo:animals",
        "zoo:animals:create",
        "zoo:animals:update",
        "zoo:animals:toys",
        "zoo:habitats:sections",
        "inventory:feeds:items:batches",
        "health",
    ];
    actions
        .iter()
        .fold(RouteTable::builder(), |table, action| {
            table.route(
                RouteDescriptor::builder(*action)
                    .processor(ApiKeyProcessor::new().with_key("bench", "bench-key"))
                    .handler(|p: &Payload, r: &mut Response| {
                        r.set_result(json!({ "action": p.action, "n": p.body.len() }));
                    }),
            )
        })
        .build()
}

fn request(path: &str) -> RawRequest {
    let mut raw = RawRequest::new(Method::POST, path)
        .with_json(&json!({ "name": "Fluffy", "tags": ["cat", "indoor"], "age": 3 }));
    raw.headers
        .insert("x-api-key", HeaderValue::from_static("bench-key"));
    raw
}

fn bench_decode_and_match(c: &mut Criterion) {
    let table = zoo_table();
    c.bench_function("decode_and_match", |b| {
        let paths = [
            "/zoo/animals?limit=10",
            "/zoo/animals/toys",
            "/zoo/habitats/sections",
            "/inventory/feeds/items/batches",
            "/missing/route",
        ];
        b.iter(|| {
            for path in paths.iter() {
                if let Ok(payload) = JsonDecoder.decode(request(path)) {
                    black_box(table.match_route(&payload).is_ok());
                }
            }
        })
    });
}

fn bench_dispatch_round_trip(c: &mut Criterion) {
    may::config().set_stack_size(0x8000);
    let dispatcher = Dispatcher::builder(Arc::new(zoo_table()))
        .response_timeout_ms(1_000)
        .build();
    c.bench_function("dispatch_round_trip", |b| {
        b.iter(|| {
            let recorder = ResponseRecorder::new();
            let _ = dispatcher.serve(request("/zoo/animals/create"), recorder.sink());
            black_box(recorder.status());
        })
    });
}

criterion_group!(benches, bench_decode_and_match, bench_dispatch_round_trip);
criterion_main!(benches);
