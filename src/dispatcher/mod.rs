//! # Dispatcher Module
//!
//! The dispatcher owns the lifecycle of a request from raw input to the single
//! response write.
//!
//! ## Request Lifecycle
//!
//! ```text
//! Decoding -> Matching -> Preprocessing -> Handling -> Finalizing -> Done
//! ```
//!
//! Any stage may jump straight to `Finalizing` carrying an error, and
//! `Finalizing` is entered exactly once.
//!
//! 1. **Decode** the [`RawRequest`](crate::decoder::RawRequest); failure is
//!    answered with `RequestMalformed` (400).
//! 2. **Match** a [`RouteDescriptor`](crate::router::RouteDescriptor); no match
//!    is answered with `UndefinedOperation` (404).
//! 3. Derive a child [`Context`](crate::context::Context) tagged with the route
//!    and spawn a **worker coroutine** running the processor chain and the
//!    handler under the inner panic guard.
//! 4. **Race** the worker against the response deadline on one channel.
//! 5. **Finalize** once: resolve the status, set `Content-Type` and `Server`,
//!    serialize under the outer panic guard and write to the sink.
//!
//! ## Ownership of the response
//!
//! Worker and deadline both want to finalize. Each [`Response`](crate::response::Response)
//! carries an atomic claim and the side that claims first owns the write:
//!
//! - the worker claims when it finishes and hands the response back over the
//!   channel; a worker that loses the claim drops its result
//! - the dispatcher claims when the deadline fires and writes the fixed
//!   `ResponseTimeout` error; if it loses, the worker's result is already on
//!   its way and is written instead
//!
//! A worker that outlives its deadline is not stopped. It keeps running in
//! the background and can observe [`Context::is_cancelled`](crate::context::Context::is_cancelled)
//! only through its own ancestors; its eventual result never reaches the wire.
//!
//! ## Panic containment
//!
//! [`guard::catch`] is installed around chain + handler inside the worker and
//! around route matching and response rendering in the dispatcher. Recovered
//! panics become `InternalFault` (500) responses. A failing sink is not
//! recovered: it is returned as [`DispatchError::Write`](crate::error::DispatchError::Write).

mod core;
pub mod deadline;
pub mod guard;

pub use self::core::{Dispatcher, DispatcherBuilder, Signal};
