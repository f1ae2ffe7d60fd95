//! Terminal business-logic units.

use crate::payload::Payload;
use crate::response::Response;

/// The terminal unit of a route.
///
/// Invoked only when every processor of the route completed without recording
/// an error. A handler reports its outcome by mutating `response`
/// ([`Response::set_result`] or [`Response::set_error`]). Panics are contained
/// by the dispatcher and answered with an internal-fault error.
pub trait Handler: Send + Sync {
    fn handle(&self, payload: &Payload, response: &mut Response);
}

impl<F> Handler for F
where
    F: Fn(&Payload, &mut Response) + Send + Sync,
{
    fn handle(&self, payload: &Payload, response: &mut Response) {
        self(payload, response);
    }
}
