use crate::context::RequestScope;
use crate::decoder::{DecodeError, RawRequest};
use crate::dispatcher::Dispatcher;
use crate::error::Error;
use crate::ids::{RequestId, REQUEST_ID_HEADER};
use crate::metrics::DispatchMetrics;
use crate::response::{Response, ResponseRecorder};
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use may::coroutine::JoinHandle;
use may_minihttp::{HttpServer as MiniHttpServer, HttpService, Request, Response as HttpResponse};
use std::io::{self, Read};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// `may_minihttp` service backed by a [`Dispatcher`].
///
/// Besides dispatched requests it answers `GET /health` and, when the
/// dispatcher was built with metrics, `GET /metrics` in Prometheus format.
#[derive(Clone)]
pub struct DispatchService {
    dispatcher: Arc<Dispatcher>,
    // minihttp only accepts 'static header lines; built once per service.
    server_header: &'static str,
}

impl DispatchService {
    #[must_use]
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        let line = format!(
            "Server: {}",
            String::from_utf8_lossy(dispatcher.server_header().as_bytes())
        );
        Self {
            dispatcher,
            server_header: Box::leak(line.into_boxed_str()),
        }
    }

    #[must_use]
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Bind `addr` and serve every connection through this service.
    ///
    /// # Errors
    ///
    /// Returns an error if the address does not resolve or cannot be bound.
    pub fn start<A: ToSocketAddrs>(self, addr: A) -> io::Result<ServerHandle> {
        let addr = addr
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "address did not resolve"))?;
        let timeout = self.dispatcher.response_timeout();
        let handle = MiniHttpServer(self).start(addr)?;
        info!(
            %addr,
            timeout_ms = timeout.map_or(0, |t| t.as_millis() as u64),
            "Dispatch server listening"
        );
        Ok(ServerHandle { addr, handle })
    }

    fn write_metrics(&self, res: &mut HttpResponse, metrics: &DispatchMetrics) {
        res.status_code(200, "OK");
        res.header("Content-Type: text/plain; version=0.0.4");
        res.header(self.server_header);
        res.body_vec(metrics.render_prometheus().into_bytes());
    }

    fn copy_recorded(&self, recorder: &ResponseRecorder, res: &mut HttpResponse) {
        let (status, body) = match recorder.status() {
            Some(status) => (status, recorder.body()),
            None => {
                error!("Dispatcher returned without writing a response");
                let err = Error::internal_fault("response was not written");
                let body = serde_json::to_vec(&serde_json::json!({ "error": err }))
                    .unwrap_or_default();
                (StatusCode::INTERNAL_SERVER_ERROR, body)
            }
        };
        res.status_code(
            usize::from(status.as_u16()),
            status.canonical_reason().unwrap_or("Unknown"),
        );
        res.header("Content-Type: application/json");
        res.header(self.server_header);
        res.body_vec(body);
    }
}

impl HttpService for DispatchService {
    fn call(&mut self, req: Request, res: &mut HttpResponse) -> io::Result<()> {
        let method = req.method().to_string();
        let target = req.path().to_string();

        if method == "GET" && target == "/health" {
            res.status_code(200, "OK");
            res.header("Content-Type: application/json");
            res.header(self.server_header);
            res.body(r#"{"status":"ok"}"#);
            return Ok(());
        }
        if method == "GET" && target == "/metrics" {
            if let Some(metrics) = self.dispatcher.metrics() {
                self.write_metrics(res, metrics);
                return Ok(());
            }
        }

        let mut headers = HeaderMap::with_capacity(req.headers().len());
        for h in req.headers() {
            match (
                HeaderName::from_bytes(h.name.as_bytes()),
                HeaderValue::from_bytes(h.value),
            ) {
                (Ok(name), Ok(value)) => {
                    headers.append(name, value);
                }
                _ => debug!(header = %h.name, "Skipping invalid request header"),
            }
        }

        let mut body = Vec::new();
        let read = req.body().read_to_end(&mut body).map(|_| body);

        let recorder = ResponseRecorder::new();
        let outcome = match raw_request(&method, target, headers, read) {
            Ok(raw) => self.dispatcher.serve(raw, recorder.sink()),
            Err((e, headers)) => {
                let scope = RequestScope {
                    tag: None,
                    request_id: RequestId::from_header_or_new(
                        headers
                            .get(REQUEST_ID_HEADER)
                            .and_then(|v| v.to_str().ok()),
                    ),
                };
                info!(request_id = %scope.request_id, error = %e, "Request decode failed");
                if let Some(metrics) = self.dispatcher.metrics() {
                    metrics.inc_decode_failure();
                }
                let mut response = Response::new(recorder.sink());
                self.dispatcher
                    .respond_error(&scope, &mut response, Error::request_malformed(&e))
            }
        };
        if let Err(e) = outcome {
            error!(error = %e, "Dispatch failed");
        }

        self.copy_recorded(&recorder, res);
        Ok(())
    }
}

/// Assemble the transport-neutral request, handing the headers back on
/// failure so the error response can still echo the request id.
fn raw_request(
    method: &str,
    path: String,
    headers: HeaderMap,
    body: io::Result<Vec<u8>>,
) -> Result<RawRequest, (DecodeError, HeaderMap)> {
    let method = match Method::from_bytes(method.as_bytes()) {
        Ok(method) => method,
        Err(e) => return Err((DecodeError::Method(e), headers)),
    };
    match body {
        Ok(body) => Ok(RawRequest {
            method,
            path,
            headers,
            body,
        }),
        Err(e) => Err((DecodeError::Body(e), headers)),
    }
}

/// Running [`DispatchService`] listener.
pub struct ServerHandle {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl ServerHandle {
    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Poll the listening address until it accepts a connection or `timeout` passes.
    ///
    /// # Errors
    ///
    /// `TimedOut` when nothing accepted within `timeout`.
    pub fn wait_ready(&self, timeout: Duration) -> io::Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            if TcpStream::connect(self.addr).is_ok() {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("dispatch server on {} not accepting", self.addr),
                ));
            }
            thread::sleep(Duration::from_millis(5));
        }
    }

    /// Cancel the accept loop and wait for it to unwind.
    pub fn stop(self) {
        // SAFETY: may marks coroutine cancellation unsafe. The handle belongs
        // to the accept loop started by `DispatchService::start` and is still live.
        unsafe {
            self.handle.coroutine().cancel();
        }
        if self.handle.join().is_err() {
            debug!(addr = %self.addr, "Accept loop unwound on cancellation");
        }
    }

    /// Block until the accept loop exits.
    ///
    /// # Errors
    ///
    /// The panic payload if the accept loop panicked.
    pub fn join(self) -> std::thread::Result<()> {
        self.handle.join()
    }
}
