//! # Error Module
//!
//! Request-time failures travel as data: a handler or processor records an
//! [`Error`] on the [`Response`](crate::response::Response) and the dispatcher
//! turns it into a JSON body plus a status code during finalization. Nothing in
//! the request path raises these across task boundaries.
//!
//! Every [`ErrorCode`] has a canonical HTTP status given by [`default_status`].
//! The numeric codes are stable and are part of the wire format:
//!
//! ```json
//! {"error": {"name": "UndefinedOperation", "code": 117, "message": "route unmatched: record:query"}}
//! ```
//!
//! Boundary failures of the library itself (writing the response twice, a
//! failing sink) are reported through [`DispatchError`].

use http::StatusCode;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::io;

/// Stable error codes exposed to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotAuthenticated,
    PermissionDenied,
    AccessKeyNotAccepted,
    AccessTokenNotAccepted,
    InvalidCredentials,
    BadRequest,
    InvalidArgument,
    Duplicated,
    ResourceNotFound,
    NotSupported,
    NotImplemented,
    ConstraintViolated,
    /// No route is registered for the requested action
    UndefinedOperation,
    /// The response budget elapsed before the handler finished
    ResponseTimeout,
    /// The raw request could not be decoded
    RequestMalformed,
    /// A runtime fault (panic) was recovered while serving the request
    InternalFault,
    /// Application-defined code outside the built-in set
    Custom(u32),
}

/// Codes at or above this value are server-side failures.
pub const SERVER_ERROR_CODE_BASE: u32 = 10000;

impl ErrorCode {
    /// Numeric code written to the `code` field of the error body.
    #[must_use]
    pub fn as_u32(self) -> u32 {
        match self {
            ErrorCode::NotAuthenticated => 101,
            ErrorCode::PermissionDenied => 102,
            ErrorCode::AccessKeyNotAccepted => 103,
            ErrorCode::AccessTokenNotAccepted => 104,
            ErrorCode::InvalidCredentials => 105,
            ErrorCode::BadRequest => 107,
            ErrorCode::InvalidArgument => 108,
            ErrorCode::Duplicated => 109,
            ErrorCode::ResourceNotFound => 110,
            ErrorCode::NotSupported => 111,
            ErrorCode::NotImplemented => 112,
            ErrorCode::ConstraintViolated => 113,
            ErrorCode::UndefinedOperation => 117,
            ErrorCode::ResponseTimeout => 122,
            ErrorCode::RequestMalformed => 130,
            ErrorCode::InternalFault => SERVER_ERROR_CODE_BASE,
            ErrorCode::Custom(code) => code,
        }
    }

    /// Symbolic name written to the `name` field of the error body.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            ErrorCode::NotAuthenticated => "NotAuthenticated",
            ErrorCode::PermissionDenied => "PermissionDenied",
            ErrorCode::AccessKeyNotAccepted => "AccessKeyNotAccepted",
            ErrorCode::AccessTokenNotAccepted => "AccessTokenNotAccepted",
            ErrorCode::InvalidCredentials => "InvalidCredentials",
            ErrorCode::BadRequest => "BadRequest",
            ErrorCode::InvalidArgument => "InvalidArgument",
            ErrorCode::Duplicated => "Duplicated",
            ErrorCode::ResourceNotFound => "ResourceNotFound",
            ErrorCode::NotSupported => "NotSupported",
            ErrorCode::NotImplemented => "NotImplemented",
            ErrorCode::ConstraintViolated => "ConstraintViolated",
            ErrorCode::UndefinedOperation => "UndefinedOperation",
            ErrorCode::ResponseTimeout => "ResponseTimeout",
            ErrorCode::RequestMalformed => "RequestMalformed",
            ErrorCode::InternalFault => "UnexpectedError",
            ErrorCode::Custom(code) if code >= SERVER_ERROR_CODE_BASE => "UnexpectedError",
            ErrorCode::Custom(_) => "ApplicationError",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), self.as_u32())
    }
}

/// A (code, message) pair carried on the response.
#[derive(Debug, Clone, PartialEq)]
pub struct Error {
    code: ErrorCode,
    message: String,
    info: Option<Value>,
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            info: None,
        }
    }

    /// Attach structured details rendered under `info`.
    #[must_use]
    pub fn with_info(mut self, info: Value) -> Self {
        self.info = Some(info);
        self
    }

    pub fn request_malformed(reason: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::RequestMalformed,
            format!("fails to decode the request: {reason}"),
        )
    }

    pub fn undefined_operation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::UndefinedOperation, message)
    }

    pub fn internal_fault(description: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::InternalFault,
            format!("panic occurred while handling request: {description}"),
        )
    }

    pub fn response_timeout() -> Self {
        Self::new(
            ErrorCode::ResponseTimeout,
            "Service taking too long to respond.",
        )
    }

    #[must_use]
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn info(&self) -> Option<&Value> {
        self.info.as_ref()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for Error {}

impl Serialize for Error {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let fields = if self.info.is_some() { 4 } else { 3 };
        let mut state = serializer.serialize_struct("Error", fields)?;
        state.serialize_field("name", self.code.name())?;
        state.serialize_field("code", &self.code.as_u32())?;
        state.serialize_field("message", &self.message)?;
        if let Some(info) = &self.info {
            state.serialize_field("info", info)?;
        }
        state.end()
    }
}

/// Canonical HTTP status for an error.
///
/// Codes without an explicit entry fall back by range: client codes map to
/// `400 Bad Request`, server codes to `500 Internal Server Error`.
#[must_use]
pub fn default_status(err: &Error) -> StatusCode {
    match err.code() {
        ErrorCode::NotAuthenticated
        | ErrorCode::AccessKeyNotAccepted
        | ErrorCode::AccessTokenNotAccepted
        | ErrorCode::InvalidCredentials => StatusCode::UNAUTHORIZED,
        ErrorCode::PermissionDenied => StatusCode::FORBIDDEN,
        ErrorCode::BadRequest | ErrorCode::InvalidArgument | ErrorCode::RequestMalformed => {
            StatusCode::BAD_REQUEST
        }
        ErrorCode::ResourceNotFound | ErrorCode::UndefinedOperation => StatusCode::NOT_FOUND,
        ErrorCode::Duplicated | ErrorCode::ConstraintViolated => StatusCode::CONFLICT,
        ErrorCode::NotSupported | ErrorCode::NotImplemented => StatusCode::NOT_IMPLEMENTED,
        ErrorCode::ResponseTimeout => StatusCode::SERVICE_UNAVAILABLE,
        ErrorCode::InternalFault => StatusCode::INTERNAL_SERVER_ERROR,
        ErrorCode::Custom(code) if code < SERVER_ERROR_CODE_BASE => StatusCode::BAD_REQUEST,
        ErrorCode::Custom(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Failures of the single response write.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The response write target was already consumed.
    #[error("response already finalized")]
    AlreadyFinalized,
    /// The sink failed while writing the already-decided response.
    #[error("failed to write response: {0}")]
    Write(#[source] io::Error),
}
