//! # Router Module
//!
//! Route resolution for the dispatcher. A route is an immutable
//! [`RouteDescriptor`]: a tag, an ordered processor chain and a terminal
//! handler. The dispatcher consumes routes through the [`Matcher`] trait, so
//! hosts can plug in any lookup strategy.
//!
//! [`RouteTable`] is the stock matcher. It keys routes by the payload's
//! `action` and is published through `ArcSwap`: concurrent requests read the
//! current table without locking, and reconfiguration swaps in a complete new
//! table at once.
//!
//! ```rust
//! use brrtdispatch::payload::Payload;
//! use brrtdispatch::response::Response;
//! use brrtdispatch::router::{RouteDescriptor, RouteTable};
//! use serde_json::json;
//!
//! let table = RouteTable::builder()
//!     .route(
//!         RouteDescriptor::builder("ping")
//!             .handler(|_: &Payload, res: &mut Response| res.set_result(json!("pong"))),
//!     )
//!     .build();
//! assert!(table.contains("ping"));
//! ```

mod core;

pub use self::core::{
    Matcher, RouteDescriptor, RouteDescriptorBuilder, RouteNotFound, RouteTable,
    RouteTableBuilder,
};
