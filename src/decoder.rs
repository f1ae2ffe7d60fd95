//! Turning raw requests into [`Payload`]s.
//!
//! The dispatcher only depends on the [`Decoder`] trait; [`JsonDecoder`] is the
//! stock implementation for JSON-over-HTTP APIs. A decode failure ends the
//! request immediately with a `RequestMalformed` error (400).

use crate::context::Context;
use crate::ids::{RequestId, REQUEST_ID_HEADER};
use crate::payload::{ParamVec, Payload};
use http::{HeaderMap, Method};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;

/// Transport-neutral request as handed over by the host.
#[derive(Debug, Clone)]
pub struct RawRequest {
    pub method: Method,
    /// Request target including the query string
    pub path: String,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl RawRequest {
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            body: Vec::new(),
        }
    }

    /// Set a JSON body.
    #[must_use]
    pub fn with_json(mut self, body: &Value) -> Self {
        self.body = body.to_string().into_bytes();
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }
}

/// Why a raw request could not be decoded.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid JSON body: {0}")]
    InvalidJson(#[source] serde_json::Error),
    #[error("JSON body must be an object")]
    NotAnObject,
    #[error("invalid request method: {0}")]
    Method(#[source] http::method::InvalidMethod),
    #[error("failed to read request body: {0}")]
    Body(#[source] std::io::Error),
}

/// Decoder contract consumed by the dispatcher.
pub trait Decoder: Send + Sync {
    fn decode(&self, raw: RawRequest) -> Result<Payload, DecodeError>;
}

/// Decodes JSON bodies and URL query strings.
///
/// The route key (`action`) is the body's `action` string when present,
/// otherwise it is derived from the path: `/record/query` becomes `record:query`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonDecoder;

impl Decoder for JsonDecoder {
    fn decode(&self, raw: RawRequest) -> Result<Payload, DecodeError> {
        let RawRequest {
            method,
            path: target,
            headers,
            body,
        } = raw;

        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path.to_string(), Some(query)),
            None => (target.clone(), None),
        };
        let query_params = query.map(parse_query_params).unwrap_or_default();
        let body = parse_body(&body)?;

        let action = body
            .get("action")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| action_from_path(&path));

        let request_id = RequestId::from_header_or_new(
            headers
                .get(REQUEST_ID_HEADER)
                .and_then(|v| v.to_str().ok()),
        );

        debug!(
            request_id = %request_id,
            method = %method,
            path = %path,
            action = %action,
            query_param_count = query_params.len(),
            body_fields = body.len(),
            "Request decoded"
        );

        Ok(Payload {
            context: Context::new(request_id),
            method,
            path,
            action,
            headers,
            query_params,
            body,
            principal: None,
        })
    }
}

/// URL-decode a query string into ordered parameters.
#[must_use]
pub fn parse_query_params(query: &str) -> ParamVec {
    url::form_urlencoded::parse(query.as_bytes())
        .map(|(k, v)| (Arc::from(k.as_ref()), v.into_owned()))
        .collect()
}

fn parse_body(bytes: &[u8]) -> Result<Map<String, Value>, DecodeError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }
    match serde_json::from_slice::<Value>(bytes).map_err(DecodeError::InvalidJson)? {
        Value::Object(map) => Ok(map),
        _ => Err(DecodeError::NotAnObject),
    }
}

fn action_from_path(path: &str) -> String {
    path.trim_matches('/').replace('/', ":")
}
