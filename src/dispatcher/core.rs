use super::{deadline, guard};
use crate::config::DispatchConfig;
use crate::context::RequestScope;
use crate::decoder::{Decoder, JsonDecoder, RawRequest};
use crate::error::{default_status, DispatchError, Error};
use crate::ids::{RequestId, REQUEST_ID_HEADER};
use crate::metrics::DispatchMetrics;
use crate::payload::Payload;
use crate::processor::run_chain;
use crate::response::{Response, ResponseBody, ResponseHead, ResponseSink, WriteTarget};
use crate::router::{Matcher, RouteDescriptor};
use http::header::{CONTENT_TYPE, SERVER};
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use may::coroutine;
use may::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Last-resort body when even the fault body cannot be serialized.
const FALLBACK_BODY: &[u8] =
    br#"{"error":{"name":"UnexpectedError","code":10000,"message":"failed to serialize response"}}"#;

/// Messages on a request's race channel.
pub enum Signal {
    /// The worker claimed the response and hands it back with its status.
    Completed(Response, StatusCode),
    /// The deadline elapsed.
    DeadlineElapsed,
}

/// Per-request lifecycle orchestrator.
///
/// `serve` decodes, matches, runs the route's processor chain and handler in a
/// worker coroutine under a panic guard, races it against the response
/// deadline and writes exactly one response. A single `Dispatcher` is shared
/// by every in-flight request.
pub struct Dispatcher {
    decoder: Arc<dyn Decoder>,
    matcher: Arc<dyn Matcher>,
    timeout: Option<Duration>,
    stack_size: usize,
    server_header: HeaderValue,
    metrics: Option<Arc<DispatchMetrics>>,
}

impl Dispatcher {
    /// Start building a dispatcher around `matcher`.
    #[must_use]
    pub fn builder(matcher: Arc<dyn Matcher>) -> DispatcherBuilder {
        DispatcherBuilder {
            decoder: Arc::new(JsonDecoder),
            matcher,
            config: DispatchConfig::default(),
            metrics: None,
        }
    }

    #[must_use]
    pub fn response_timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Value written to the `Server` header of every response.
    #[must_use]
    pub fn server_header(&self) -> &HeaderValue {
        &self.server_header
    }

    #[must_use]
    pub fn metrics(&self) -> Option<&Arc<DispatchMetrics>> {
        self.metrics.as_ref()
    }

    /// Decode `raw` and dispatch it, writing the response into `sink`.
    ///
    /// # Errors
    ///
    /// Only write-side failures are returned: every request-time failure is
    /// already reported to the client as a JSON error.
    pub fn serve(&self, raw: RawRequest, sink: Box<dyn ResponseSink>) -> Result<(), DispatchError> {
        let mut response = Response::new(sink);
        // The decoder consumes the request; keep the raw id for its error path.
        let request_id_header = raw.headers.get(REQUEST_ID_HEADER).cloned();

        match self.decoder.decode(raw) {
            Ok(payload) => self.dispatch(payload, response),
            Err(e) => {
                let request_id = RequestId::from_header_or_new(
                    request_id_header.as_ref().and_then(|v| v.to_str().ok()),
                );
                info!(request_id = %request_id, error = %e, "Request decode failed");
                if let Some(metrics) = &self.metrics {
                    metrics.inc_decode_failure();
                }
                let scope = RequestScope {
                    tag: None,
                    request_id,
                };
                self.respond_error(&scope, &mut response, Error::request_malformed(&e))
            }
        }
    }

    /// Dispatch an already decoded payload.
    ///
    /// # Errors
    ///
    /// See [`serve`](Self::serve).
    pub fn handle(&self, payload: Payload, sink: Box<dyn ResponseSink>) -> Result<(), DispatchError> {
        self.dispatch(payload, Response::new(sink))
    }

    /// Record `error` on `response` and finalize it with the error's canonical status.
    ///
    /// # Errors
    ///
    /// See [`finalize`](Self::finalize).
    pub fn respond_error(
        &self,
        scope: &RequestScope,
        response: &mut Response,
        error: Error,
    ) -> Result<(), DispatchError> {
        response.set_error(error);
        self.finalize(scope, response, StatusCode::OK)
    }

    /// Write `response` to its sink, exactly once.
    ///
    /// A `2xx` status with an error on the response resolves to the
    /// error's canonical status.
    ///
    /// # Errors
    ///
    /// [`DispatchError::AlreadyFinalized`] when the sink was already consumed
    /// (nothing is written), [`DispatchError::Write`] when the sink failed.
    pub fn finalize(
        &self,
        scope: &RequestScope,
        response: &Response,
        status: StatusCode,
    ) -> Result<(), DispatchError> {
        self.write(scope, response.target(), status, &response.body())
    }

    fn dispatch(&self, mut payload: Payload, mut response: Response) -> Result<(), DispatchError> {
        let route = match guard::catch(|| self.matcher.match_route(&payload)) {
            Ok(Ok(route)) => route,
            Ok(Err(not_found)) => {
                if let Some(metrics) = &self.metrics {
                    metrics.inc_unmatched_route();
                }
                let scope = payload.context().scope().clone();
                return self.respond_error(
                    &scope,
                    &mut response,
                    Error::undefined_operation(not_found.to_string()),
                );
            }
            Err(fault) => {
                error!(
                    request_id = %payload.request_id(),
                    action = %payload.action,
                    panic_message = %fault,
                    backtrace = %fault.backtrace(),
                    "Route matcher panicked"
                );
                if let Some(metrics) = &self.metrics {
                    metrics.inc_recovered_fault();
                }
                let scope = payload.context().scope().clone();
                return self.respond_error(
                    &scope,
                    &mut response,
                    Error::internal_fault(fault.description()),
                );
            }
        };

        let context = payload.context().child().with_tag(Arc::clone(route.tag()));
        payload.set_context(context);
        let scope = payload.context().scope().clone();
        let target = response.target().clone();

        let (tx, rx) = mpsc::channel();
        if let Err(e) = self.spawn_worker(route, payload, response, tx.clone()) {
            error!(
                request_id = %scope.request_id,
                tag = scope.tag_or_empty(),
                error = %e,
                stack_size = self.stack_size,
                "Failed to spawn worker coroutine"
            );
            if !target.claim() {
                return Err(DispatchError::AlreadyFinalized);
            }
            let err = Error::internal_fault(format!("failed to spawn worker: {e}"));
            return self.write(&scope, &target, StatusCode::OK, &error_body(&err));
        }

        let armed = deadline::arm(self.timeout, tx, Signal::DeadlineElapsed);
        let outcome = self.await_outcome(&rx, &scope, &target);
        drop(armed);
        outcome
    }

    fn spawn_worker(
        &self,
        route: Arc<RouteDescriptor>,
        payload: Payload,
        response: Response,
        tx: Sender<Signal>,
    ) -> std::io::Result<()> {
        let metrics = self.metrics.clone();

        // SAFETY: may::coroutine::Builder::spawn() is marked unsafe by the may runtime.
        // The closure is 'static: it owns the payload, the response and an Arc
        // of the route, and reports back only through the race channel.
        let spawned = unsafe {
            coroutine::Builder::new()
                .stack_size(self.stack_size)
                .spawn(move || run_worker(&route, payload, response, &tx, metrics.as_deref()))
        };
        spawned.map(|_| ())
    }

    /// Block on the race channel until one side owns the response.
    fn await_outcome(
        &self,
        rx: &Receiver<Signal>,
        scope: &RequestScope,
        target: &WriteTarget,
    ) -> Result<(), DispatchError> {
        loop {
            match rx.recv() {
                Ok(Signal::Completed(response, status)) => {
                    return self.finalize(scope, &response, status);
                }
                Ok(Signal::DeadlineElapsed) => {
                    if target.claim() {
                        error!(
                            request_id = %scope.request_id,
                            tag = scope.tag_or_empty(),
                            timeout_ms = self.timeout.map_or(0, |t| t.as_millis() as u64),
                            "Response deadline elapsed"
                        );
                        if let Some(metrics) = &self.metrics {
                            metrics.inc_timeout();
                        }
                        let err = Error::response_timeout();
                        return self.write(scope, target, StatusCode::OK, &error_body(&err));
                    }
                    // The worker claimed first; its Completed signal is in flight.
                    debug!(
                        request_id = %scope.request_id,
                        tag = scope.tag_or_empty(),
                        "Deadline elapsed after the worker claimed the response"
                    );
                }
                Err(_) => {
                    error!(
                        request_id = %scope.request_id,
                        tag = scope.tag_or_empty(),
                        "Worker exited without reporting a result"
                    );
                    if !target.claim() {
                        return Err(DispatchError::AlreadyFinalized);
                    }
                    let err = Error::internal_fault("worker exited without reporting a result");
                    return self.write(scope, target, StatusCode::OK, &error_body(&err));
                }
            }
        }
    }

    fn write(
        &self,
        scope: &RequestScope,
        target: &WriteTarget,
        status: StatusCode,
        body: &ResponseBody<'_>,
    ) -> Result<(), DispatchError> {
        let (status, bytes) = match guard::catch(|| render(status, body)) {
            Ok(Ok(rendered)) => rendered,
            Ok(Err(e)) => {
                error!(
                    request_id = %scope.request_id,
                    tag = scope.tag_or_empty(),
                    error = %e,
                    "Failed to serialize response"
                );
                fault_response(format!("failed to serialize response: {e}"))
            }
            Err(fault) => {
                error!(
                    request_id = %scope.request_id,
                    tag = scope.tag_or_empty(),
                    panic_message = %fault,
                    backtrace = %fault.backtrace(),
                    "Panic while rendering response"
                );
                if let Some(metrics) = &self.metrics {
                    metrics.inc_recovered_fault();
                }
                fault_response(fault.description())
            }
        };

        let Some(sink) = target.take_sink() else {
            error!(
                request_id = %scope.request_id,
                tag = scope.tag_or_empty(),
                status = status.as_u16(),
                "Attempted to finalize an already finalized response"
            );
            return Err(DispatchError::AlreadyFinalized);
        };

        let head = ResponseHead {
            status,
            headers: self.headers(scope),
        };
        let latency = target.elapsed();
        if let Err(e) = sink.write(head, bytes) {
            error!(
                request_id = %scope.request_id,
                tag = scope.tag_or_empty(),
                status = status.as_u16(),
                error = %e,
                "Failed to write response"
            );
            return Err(DispatchError::Write(e));
        }

        if let Some(metrics) = &self.metrics {
            metrics.record_request(latency);
        }
        info!(
            request_id = %scope.request_id,
            tag = scope.tag_or_empty(),
            status = status.as_u16(),
            latency_ms = latency.as_millis() as u64,
            "Request finalized"
        );
        Ok(())
    }

    fn headers(&self, scope: &RequestScope) -> HeaderMap {
        let mut headers = HeaderMap::with_capacity(3);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(SERVER, self.server_header.clone());
        if let Ok(id) = HeaderValue::from_str(&scope.request_id.to_string()) {
            headers.insert(HeaderName::from_static(REQUEST_ID_HEADER), id);
        }
        headers
    }
}

/// Builder for [`Dispatcher`].
pub struct DispatcherBuilder {
    decoder: Arc<dyn Decoder>,
    matcher: Arc<dyn Matcher>,
    config: DispatchConfig,
    metrics: Option<Arc<DispatchMetrics>>,
}

impl DispatcherBuilder {
    /// Replace the default [`JsonDecoder`].
    #[must_use]
    pub fn decoder(mut self, decoder: Arc<dyn Decoder>) -> Self {
        self.decoder = decoder;
        self
    }

    #[must_use]
    pub fn config(mut self, config: DispatchConfig) -> Self {
        self.config = config;
        self
    }

    /// Shortcut for setting only the response deadline in milliseconds.
    #[must_use]
    pub fn response_timeout_ms(mut self, millis: i64) -> Self {
        self.config.http.response_timeout_ms = millis;
        self
    }

    #[must_use]
    pub fn metrics(mut self, metrics: Arc<DispatchMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    #[must_use]
    pub fn build(self) -> Dispatcher {
        let server_header = HeaderValue::from_str(&self.config.server_header()).unwrap_or_else(|e| {
            warn!(
                server_name = %self.config.http.server_name,
                error = %e,
                "Invalid server name, using the default"
            );
            HeaderValue::from_static(concat!("BRRTDispatch/", env!("CARGO_PKG_VERSION")))
        });

        let timeout = self.config.response_timeout();
        info!(
            timeout_ms = timeout.map_or(0, |t| t.as_millis() as u64),
            stack_size = self.config.runtime.stack_size,
            server = ?server_header,
            "Dispatcher configured"
        );

        Dispatcher {
            decoder: self.decoder,
            matcher: self.matcher,
            timeout,
            stack_size: self.config.runtime.stack_size,
            server_header,
            metrics: self.metrics,
        }
    }
}

/// Worker coroutine body: chain + handler under the inner panic guard, then
/// claim the response.
fn run_worker(
    route: &RouteDescriptor,
    mut payload: Payload,
    mut response: Response,
    tx: &Sender<Signal>,
    metrics: Option<&DispatchMetrics>,
) {
    let status = match guard::catch(|| run_route(route, &mut payload, &mut response)) {
        Ok(status) => status,
        Err(fault) => {
            error!(
                request_id = %payload.request_id(),
                tag = %route.tag(),
                panic_message = %fault,
                backtrace = %fault.backtrace(),
                "Recovered panic while handling request"
            );
            if let Some(metrics) = metrics {
                metrics.inc_recovered_fault();
            }
            let err = Error::internal_fault(fault.description());
            let status = default_status(&err);
            response.set_error(err);
            status
        }
    };

    payload.context().cancel();

    if response.target().claim() {
        // The dispatcher only disappears once the response is written.
        let _ = tx.send(Signal::Completed(response, status));
    } else {
        debug!(
            request_id = %payload.request_id(),
            tag = %route.tag(),
            status = status.as_u16(),
            "Late result discarded after response deadline"
        );
        if let Some(metrics) = metrics {
            metrics.inc_late_result_discarded();
        }
    }
}

fn run_route(route: &RouteDescriptor, payload: &mut Payload, response: &mut Response) -> StatusCode {
    let status = run_chain(route.processors(), payload, response);
    if response.error().is_some() {
        return status;
    }
    route.handler().handle(payload, response);
    status
}

fn render(status: StatusCode, body: &ResponseBody<'_>) -> serde_json::Result<(StatusCode, Vec<u8>)> {
    let status = match body.error {
        Some(err) if status.is_success() => default_status(err),
        _ => status,
    };
    Ok((status, serde_json::to_vec(body)?))
}

fn error_body(err: &Error) -> ResponseBody<'_> {
    ResponseBody {
        result: None,
        error: Some(err),
    }
}

fn fault_response(description: impl std::fmt::Display) -> (StatusCode, Vec<u8>) {
    let err = Error::internal_fault(description);
    let bytes = serde_json::to_vec(&error_body(&err)).unwrap_or_else(|_| FALLBACK_BODY.to_vec());
    (default_status(&err), bytes)
}
