//! Decoded per-request input.
//!
//! A [`Payload`] is created by the [`Decoder`](crate::decoder::Decoder), owned by
//! the request's task tree and never shared between requests. Processors receive
//! it mutably (to record a principal, normalise fields); the handler sees it
//! read-only.

use crate::context::Context;
use crate::ids::RequestId;
use http::{HeaderMap, Method};
use serde_json::{Map, Value};
use smallvec::SmallVec;
use std::sync::Arc;

/// Maximum number of query parameters before heap allocation.
pub const MAX_INLINE_PARAMS: usize = 8;

/// Stack-allocated query parameter storage for the hot path.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// Per-request decoded input plus its cancellable context.
#[derive(Debug, Clone)]
pub struct Payload {
    /// Execution context; replaced by the dispatcher with a derived, tagged child
    pub context: Context,
    /// HTTP method of the raw request
    pub method: Method,
    /// Request path without the query string
    pub path: String,
    /// Route key consulted by the matcher
    pub action: String,
    /// Request headers
    pub headers: HeaderMap,
    /// Query string parameters in arrival order
    pub query_params: ParamVec,
    /// JSON object body (`{}` when the request had no body)
    pub body: Map<String, Value>,
    /// Identity recorded by an authentication processor
    pub principal: Option<String>,
}

impl Payload {
    /// Empty payload for `action`, mostly useful to hosts that decode themselves.
    #[must_use]
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            context: Context::new(RequestId::new()),
            method: Method::POST,
            path: String::from("/"),
            action: action.into(),
            headers: HeaderMap::new(),
            query_params: ParamVec::new(),
            body: Map::new(),
            principal: None,
        }
    }

    #[must_use]
    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn set_context(&mut self, context: Context) {
        self.context = context;
    }

    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.context.request_id()
    }

    #[must_use]
    pub fn tag(&self) -> Option<&str> {
        self.context.tag()
    }

    /// Get a header value by name (case-insensitive per RFC 7230).
    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Get a query parameter by name; the last occurrence wins.
    #[inline]
    #[must_use]
    pub fn get_query_param(&self, name: &str) -> Option<&str> {
        self.query_params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Get a top-level field of the JSON body.
    #[inline]
    #[must_use]
    pub fn get_param(&self, name: &str) -> Option<&Value> {
        self.body.get(name)
    }
}
