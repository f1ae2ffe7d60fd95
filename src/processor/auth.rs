use super::Processor;
use crate::error::{Error, ErrorCode};
use crate::payload::Payload;
use crate::response::Response;
use http::StatusCode;
use std::collections::HashMap;
use tracing::debug;

/// Header carrying the client API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Requires a known API key in the `x-api-key` header or the body `api_key` field.
///
/// On success the key's name is recorded as the payload principal so later
/// processors and the handler can see who called.
#[derive(Debug, Clone, Default)]
pub struct ApiKeyProcessor {
    keys: HashMap<String, String>,
}

impl ApiKeyProcessor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `key`, identifying its holder as `name`.
    #[must_use]
    pub fn with_key(mut self, name: impl Into<String>, key: impl Into<String>) -> Self {
        self.keys.insert(key.into(), name.into());
        self
    }
}

impl Processor for ApiKeyProcessor {
    fn preprocess(&self, payload: &mut Payload, response: &mut Response) -> StatusCode {
        let presented = payload
            .get_header(API_KEY_HEADER)
            .or_else(|| payload.get_param("api_key").and_then(|v| v.as_str()));

        match presented.and_then(|key| self.keys.get(key)) {
            Some(name) => {
                payload.principal = Some(name.clone());
                StatusCode::OK
            }
            None => {
                debug!(
                    request_id = %payload.request_id(),
                    key_present = presented.is_some(),
                    "API key rejected"
                );
                response.set_error(Error::new(
                    ErrorCode::AccessKeyNotAccepted,
                    "Cannot verify api key.",
                ));
                StatusCode::UNAUTHORIZED
            }
        }
    }
}

/// Rejects requests that no earlier processor authenticated.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequireAuthenticated;

impl Processor for RequireAuthenticated {
    fn preprocess(&self, payload: &mut Payload, response: &mut Response) -> StatusCode {
        if payload.principal.is_none() {
            response.set_error(Error::new(
                ErrorCode::NotAuthenticated,
                "Authentication is required for this action.",
            ));
        }
        StatusCode::OK
    }
}
