use super::core::{ResponseHead, ResponseSink};
use http::{HeaderMap, StatusCode};
use parking_lot::Mutex;
use serde_json::Value;
use std::io;
use std::sync::Arc;

#[derive(Debug, Default)]
struct Recorded {
    writes: usize,
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: Vec<u8>,
}

/// In-memory response sink.
///
/// Hosts that need to post-process a response (the `may_minihttp` adapter) and
/// tests both use it. Cloning shares the recorded state; [`sink`](Self::sink)
/// hands out the write side.
#[derive(Debug, Clone, Default)]
pub struct ResponseRecorder {
    inner: Arc<Mutex<Recorded>>,
}

struct RecorderSink {
    inner: Arc<Mutex<Recorded>>,
}

impl ResponseSink for RecorderSink {
    fn write(self: Box<Self>, head: ResponseHead, body: Vec<u8>) -> io::Result<()> {
        let mut recorded = self.inner.lock();
        recorded.writes += 1;
        recorded.status = Some(head.status);
        recorded.headers = head.headers;
        recorded.body = body;
        Ok(())
    }
}

impl ResponseRecorder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink writing into this recorder.
    #[must_use]
    pub fn sink(&self) -> Box<dyn ResponseSink> {
        Box::new(RecorderSink {
            inner: Arc::clone(&self.inner),
        })
    }

    /// Number of writes received across every sink handed out.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.inner.lock().writes
    }

    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        self.inner.lock().status
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<String> {
        self.inner
            .lock()
            .headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }

    #[must_use]
    pub fn headers(&self) -> HeaderMap {
        self.inner.lock().headers.clone()
    }

    #[must_use]
    pub fn body(&self) -> Vec<u8> {
        self.inner.lock().body.clone()
    }

    /// Body parsed as JSON, `Value::Null` when empty or not JSON.
    #[must_use]
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.inner.lock().body).unwrap_or(Value::Null)
    }
}
