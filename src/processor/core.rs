use crate::error::default_status;
use crate::payload::Payload;
use crate::response::Response;
use http::StatusCode;
use std::sync::Arc;
use tracing::debug;

/// Ordered pre-handler validation or transformation unit.
pub trait Processor: Send + Sync {
    /// Inspect or adjust the request; record an error on `response` to stop the chain.
    fn preprocess(&self, payload: &mut Payload, response: &mut Response) -> StatusCode;
}

impl<F> Processor for F
where
    F: Fn(&mut Payload, &mut Response) -> StatusCode + Send + Sync,
{
    fn preprocess(&self, payload: &mut Payload, response: &mut Response) -> StatusCode {
        self(payload, response)
    }
}

/// Run `processors` in order against the same payload/response pair.
///
/// Returns the status to respond with. The chain halts at the first processor
/// that records an error; its hint is kept unless it is a success (`2xx`)
/// status, in which case the error's canonical status is used.
pub fn run_chain(
    processors: &[Arc<dyn Processor>],
    payload: &mut Payload,
    response: &mut Response,
) -> StatusCode {
    let mut status = StatusCode::OK;
    for (idx, processor) in processors.iter().enumerate() {
        status = processor.preprocess(payload, response);
        if let Some(err) = response.error() {
            if status.is_success() {
                status = default_status(err);
            }
            debug!(
                request_id = %payload.request_id(),
                tag = payload.tag().unwrap_or(""),
                processor_idx = idx,
                processor_name = std::any::type_name_of_val(processor.as_ref()),
                error_code = err.code().as_u32(),
                status = status.as_u16(),
                "Processor short-circuited the chain"
            );
            return status;
        }
    }
    status
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, ErrorCode};
    use crate::response::ResponseRecorder;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting(counter: Arc<AtomicUsize>) -> Arc<dyn Processor> {
        Arc::new(move |_: &mut Payload, _: &mut Response| {
            counter.fetch_add(1, Ordering::SeqCst);
            StatusCode::OK
        })
    }

    #[test]
    fn test_empty_chain_is_ok() {
        let recorder = ResponseRecorder::new();
        let mut response = Response::new(recorder.sink());
        let mut payload = Payload::new("noop");
        assert_eq!(run_chain(&[], &mut payload, &mut response), StatusCode::OK);
    }

    #[test]
    fn test_chain_stops_at_first_error() {
        let after = Arc::new(AtomicUsize::new(0));
        let failing: Arc<dyn Processor> = Arc::new(|_: &mut Payload, r: &mut Response| {
            r.set_error(Error::new(ErrorCode::PermissionDenied, "denied"));
            StatusCode::OK
        });
        let chain = vec![counting(Arc::new(AtomicUsize::new(0))), failing, counting(after.clone())];

        let recorder = ResponseRecorder::new();
        let mut response = Response::new(recorder.sink());
        let mut payload = Payload::new("guarded");
        let status = run_chain(&chain, &mut payload, &mut response);

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(after.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_success_hint_resolves_to_error_status() {
        let no_content: Arc<dyn Processor> = Arc::new(|_: &mut Payload, r: &mut Response| {
            r.set_error(Error::new(ErrorCode::NotAuthenticated, "who are you"));
            StatusCode::NO_CONTENT
        });
        let recorder = ResponseRecorder::new();
        let mut response = Response::new(recorder.sink());
        let mut payload = Payload::new("login");
        assert_eq!(
            run_chain(&[no_content], &mut payload, &mut response),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn test_explicit_hint_overrides_mapping() {
        let teapot: Arc<dyn Processor> = Arc::new(|_: &mut Payload, r: &mut Response| {
            r.set_error(Error::new(ErrorCode::InvalidArgument, "short and stout"));
            StatusCode::IM_A_TEAPOT
        });
        let recorder = ResponseRecorder::new();
        let mut response = Response::new(recorder.sink());
        let mut payload = Payload::new("brew");
        assert_eq!(
            run_chain(&[teapot], &mut payload, &mut response),
            StatusCode::IM_A_TEAPOT
        );
    }
}
