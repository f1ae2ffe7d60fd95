//! # Server Module
//!
//! Embedding of the [`Dispatcher`](crate::dispatcher::Dispatcher) into a
//! `may_minihttp` HTTP/1.1 server. The dispatcher stays transport-neutral:
//! [`DispatchService`] converts each minihttp request into a
//! [`RawRequest`](crate::decoder::RawRequest), lets the dispatcher write into a
//! [`ResponseRecorder`](crate::response::ResponseRecorder) and copies the
//! recorded response back onto the connection.
//!
//! ```rust,no_run
//! use brrtdispatch::dispatcher::Dispatcher;
//! use brrtdispatch::router::RouteTable;
//! use brrtdispatch::server::DispatchService;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let table = Arc::new(RouteTable::builder().build());
//! let dispatcher = Arc::new(Dispatcher::builder(table).build());
//! let handle = DispatchService::new(dispatcher)
//!     .start("127.0.0.1:8080")
//!     .unwrap();
//! handle.wait_ready(Duration::from_secs(1)).unwrap();
//! handle.join().unwrap();
//! ```

mod service;

pub use self::service::{DispatchService, ServerHandle};
