//! # BRRTDispatch
//!
//! **BRRTDispatch** is the request-dispatch core of a coroutine-powered backend: it sits between
//! an inbound HTTP request and a registered application handler, built on the `may` runtime.
//!
//! ## Overview
//!
//! For every request the dispatcher:
//!
//! 1. decodes the raw request into a [`Payload`](payload::Payload)
//! 2. matches it against a route table to get a processor chain and a handler
//! 3. runs chain + handler in a worker coroutine under a response deadline
//! 4. contains panics at two levels so a faulty handler never takes the process down
//! 5. writes exactly one JSON response, with `Content-Type: application/json` on every path
//!
//! ## Architecture
//!
//! - **[`decoder`]** - Raw request to [`Payload`](payload::Payload) (`JsonDecoder`)
//! - **[`router`]** - Route descriptors, the [`Matcher`](router::Matcher) contract and the lock-free [`RouteTable`](router::RouteTable)
//! - **[`processor`]** - Fail-fast pre-handler chain and built-in authentication processors
//! - **[`handler`]** - Terminal business-logic units
//! - **[`dispatcher`]** - Lifecycle orchestration, panic guard and deadlines
//! - **[`response`]** - Single-write responses with an atomic ownership claim
//! - **[`server`]** - `may_minihttp` host embedding
//! - **[`config`]**, **[`runtime_config`]**, **[`logging`]**, **[`metrics`]** - Ambient concerns
//!
//! ### Request Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Host as Host<br/>(may_minihttp)
//!     participant D as Dispatcher
//!     participant Dec as Decoder
//!     participant M as Matcher
//!     participant W as Worker coroutine
//!     participant T as Deadline timer
//!     participant S as ResponseSink
//!
//!     Host->>D: serve(raw, sink)
//!     D->>Dec: decode(raw)
//!     alt decode error
//!         D->>S: 400 RequestMalformed
//!     end
//!     D->>M: match_route(&payload)
//!     alt no route
//!         D->>S: 404 UndefinedOperation
//!     end
//!     D->>W: spawn(chain + handler, guarded)
//!     D->>T: arm(timeout)
//!     par worker finishes first
//!         W->>W: claim()
//!         W-->>D: Completed(response, status)
//!         D->>S: result or error
//!     and deadline fires first
//!         T-->>D: DeadlineElapsed
//!         D->>D: claim()
//!         D->>S: 503 ResponseTimeout
//!         W->>W: claim() fails, result dropped
//!     end
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use brrtdispatch::decoder::RawRequest;
//! use brrtdispatch::dispatcher::Dispatcher;
//! use brrtdispatch::payload::Payload;
//! use brrtdispatch::processor::ApiKeyProcessor;
//! use brrtdispatch::response::{Response, ResponseRecorder};
//! use brrtdispatch::router::{RouteDescriptor, RouteTable};
//! use http::Method;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let table = Arc::new(
//!     RouteTable::builder()
//!         .route(
//!             RouteDescriptor::builder("record:query")
//!                 .processor(ApiKeyProcessor::new().with_key("web", "secret"))
//!                 .handler(|payload: &Payload, res: &mut Response| {
//!                     res.set_result(json!({ "user": payload.principal }));
//!                 }),
//!         )
//!         .build(),
//! );
//! let dispatcher = Dispatcher::builder(table).response_timeout_ms(1_000).build();
//!
//! let recorder = ResponseRecorder::new();
//! let raw = RawRequest::new(Method::POST, "/record/query")
//!     .with_json(&json!({ "api_key": "secret" }));
//! dispatcher.serve(raw, recorder.sink()).unwrap();
//!
//! assert_eq!(recorder.status().map(|s| s.as_u16()), Some(200));
//! assert_eq!(recorder.json(), json!({ "result": { "user": "web" } }));
//! ```
//!
//! ## Error Model
//!
//! Request-time failures are data: processors and handlers record an
//! [`Error`](error::Error) on the response and the dispatcher maps it to a
//! status with [`default_status`](error::default_status). Timeouts always look
//! the same to clients:
//!
//! ```json
//! {"error": {"name": "ResponseTimeout", "code": 122, "message": "Service taking too long to respond."}}
//! ```
//!
//! ## Configuration
//!
//! See [`config::DispatchConfig`] for the YAML layout and the `BRRTD_*`
//! environment overrides, and [`logging::LogConfig`] for the log setup.

pub mod config;
pub mod context;
pub mod decoder;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod ids;
pub mod logging;
pub mod metrics;
pub mod payload;
pub mod processor;
pub mod response;
pub mod router;
pub mod runtime_config;
pub mod server;

pub use config::DispatchConfig;
pub use dispatcher::{Dispatcher, DispatcherBuilder};
pub use error::{DispatchError, Error, ErrorCode};
pub use payload::Payload;
pub use response::{Response, ResponseRecorder, ResponseSink};
pub use router::{RouteDescriptor, RouteTable};
