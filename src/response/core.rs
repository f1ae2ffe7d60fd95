use crate::error::Error;
use http::{HeaderMap, StatusCode};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Status line and headers of a finalized response.
#[derive(Debug, Clone)]
pub struct ResponseHead {
    pub status: StatusCode,
    pub headers: HeaderMap,
}

/// The wire-side destination of a response, consumed by its single write.
pub trait ResponseSink: Send {
    /// Write status, headers and the serialized body.
    ///
    /// A failure here happens after the response was decided and cannot be
    /// turned into another response.
    fn write(self: Box<Self>, head: ResponseHead, body: Vec<u8>) -> io::Result<()>;
}

struct TargetState {
    created_at: Instant,
    claimed: AtomicBool,
    sink: Mutex<Option<Box<dyn ResponseSink>>>,
}

/// Shared handle to a response's sink plus its ownership claim.
#[derive(Clone)]
pub struct WriteTarget(Arc<TargetState>);

impl WriteTarget {
    pub fn new(sink: Box<dyn ResponseSink>) -> Self {
        Self(Arc::new(TargetState {
            created_at: Instant::now(),
            claimed: AtomicBool::new(false),
            sink: Mutex::new(Some(sink)),
        }))
    }

    /// Try to become the single owner of finalization.
    ///
    /// Returns `true` for exactly one caller over the target's lifetime.
    #[must_use]
    pub fn claim(&self) -> bool {
        self.0
            .claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    #[must_use]
    pub fn is_claimed(&self) -> bool {
        self.0.claimed.load(Ordering::Acquire)
    }

    /// Take the sink out; `None` once the response has been written.
    #[must_use]
    pub fn take_sink(&self) -> Option<Box<dyn ResponseSink>> {
        self.0.sink.lock().take()
    }

    /// Time since the response was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.0.created_at.elapsed()
    }

    /// Whether the sink has already been consumed.
    #[must_use]
    pub fn is_finalized(&self) -> bool {
        self.0.sink.lock().is_none()
    }
}

impl fmt::Debug for WriteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteTarget")
            .field("claimed", &self.is_claimed())
            .field("finalized", &self.is_finalized())
            .finish()
    }
}

/// Per-request mutable output container.
#[derive(Debug)]
pub struct Response {
    error: Option<Error>,
    result: Option<Value>,
    target: WriteTarget,
}

impl Response {
    pub fn new(sink: Box<dyn ResponseSink>) -> Self {
        Self {
            error: None,
            result: None,
            target: WriteTarget::new(sink),
        }
    }

    pub fn set_error(&mut self, error: Error) {
        self.error = Some(error);
    }

    pub fn set_result(&mut self, result: Value) {
        self.result = Some(result);
    }

    #[must_use]
    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    #[must_use]
    pub fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    #[must_use]
    pub fn target(&self) -> &WriteTarget {
        &self.target
    }

    #[must_use]
    pub fn is_finalized(&self) -> bool {
        self.target.is_finalized()
    }

    /// Serializable view of the body; an error hides any partial result.
    #[must_use]
    pub fn body(&self) -> ResponseBody<'_> {
        match &self.error {
            Some(error) => ResponseBody {
                result: None,
                error: Some(error),
            },
            None => ResponseBody {
                result: self.result.as_ref(),
                error: None,
            },
        }
    }
}

/// JSON shape written to the wire: `{"result": ...}` or `{"error": {...}}`.
#[derive(Debug, Serialize)]
pub struct ResponseBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'a Error>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::response::ResponseRecorder;
    use serde_json::json;

    #[test]
    fn test_claim_is_granted_once() {
        let recorder = ResponseRecorder::new();
        let target = WriteTarget::new(recorder.sink());
        assert!(target.claim());
        assert!(!target.claim());
        assert!(target.is_claimed());
    }

    #[test]
    fn test_sink_is_taken_once() {
        let recorder = ResponseRecorder::new();
        let response = Response::new(recorder.sink());
        assert!(!response.is_finalized());
        assert!(response.target().take_sink().is_some());
        assert!(response.target().take_sink().is_none());
        assert!(response.is_finalized());
    }

    #[test]
    fn test_error_hides_result_in_body() {
        let recorder = ResponseRecorder::new();
        let mut response = Response::new(recorder.sink());
        response.set_result(json!({"ok": true}));
        assert_eq!(
            serde_json::to_value(response.body()).unwrap(),
            json!({"result": {"ok": true}})
        );

        response.set_error(Error::new(ErrorCode::PermissionDenied, "nope"));
        let body = serde_json::to_value(response.body()).unwrap();
        assert!(body.get("result").is_none());
        assert_eq!(body["error"]["code"], json!(102));
    }
}
