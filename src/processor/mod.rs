//! # Processor Module
//!
//! Pre-processing chains run in registration order in front of a route's
//! handler. Each processor may record an error on the response; the chain stops
//! at the first one that does (fail-fast) and the handler is never invoked.
//!
//! ## Status hints
//!
//! A processor returns a status hint. `200 OK` means "no opinion": when the
//! processor also recorded an error, the final status comes from the error's
//! canonical mapping. Any other status is kept as an explicit override.
//!
//! ```rust
//! use brrtdispatch::error::{Error, ErrorCode};
//! use brrtdispatch::payload::Payload;
//! use brrtdispatch::response::Response;
//! use http::StatusCode;
//!
//! let require_body = |payload: &mut Payload, response: &mut Response| {
//!     if payload.body.is_empty() {
//!         response.set_error(Error::new(ErrorCode::InvalidArgument, "empty body"));
//!     }
//!     StatusCode::OK
//! };
//! # let _ = require_body;
//! ```

mod auth;
mod core;

pub use self::auth::{ApiKeyProcessor, RequireAuthenticated, API_KEY_HEADER};
pub use self::core::{run_chain, Processor};
