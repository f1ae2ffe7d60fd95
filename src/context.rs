//! Request-scoped execution context.
//!
//! A [`Context`] carries the typed [`RequestScope`] (route tag and request id)
//! that logging and downstream components read, plus a cancellation flag. The
//! dispatcher derives a child context per request before launching the worker
//! coroutine; the worker cancels it when it finishes, which is the "done"
//! signal observable by anything holding a clone.
//!
//! Cancellation flows downward only: cancelling a child never touches its
//! parent, while a cancelled parent is visible through every descendant.

use crate::ids::RequestId;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Typed request-scoped values, passed by value down the call chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestScope {
    /// Tag of the matched route, set once matching succeeded
    pub tag: Option<Arc<str>>,
    /// Stable identifier of the request
    pub request_id: RequestId,
}

impl RequestScope {
    /// Tag for log fields; empty before matching.
    #[must_use]
    pub fn tag_or_empty(&self) -> &str {
        self.tag.as_deref().unwrap_or("")
    }
}

#[derive(Debug)]
struct CancelState {
    cancelled: AtomicBool,
    parent: Option<Arc<CancelState>>,
}

impl CancelState {
    fn is_cancelled(&self) -> bool {
        if self.cancelled.load(Ordering::Acquire) {
            return true;
        }
        self.parent.as_ref().is_some_and(|p| p.is_cancelled())
    }
}

/// Cancellable execution context of one request.
#[derive(Debug, Clone)]
pub struct Context {
    scope: RequestScope,
    state: Arc<CancelState>,
}

impl Context {
    /// Root context for a freshly decoded request.
    #[must_use]
    pub fn new(request_id: RequestId) -> Self {
        Self {
            scope: RequestScope {
                tag: None,
                request_id,
            },
            state: Arc::new(CancelState {
                cancelled: AtomicBool::new(false),
                parent: None,
            }),
        }
    }

    /// Derive a cancellable child carrying the same scope.
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            scope: self.scope.clone(),
            state: Arc::new(CancelState {
                cancelled: AtomicBool::new(false),
                parent: Some(Arc::clone(&self.state)),
            }),
        }
    }

    /// Attach the matched route tag.
    #[must_use]
    pub fn with_tag(mut self, tag: Arc<str>) -> Self {
        self.scope.tag = Some(tag);
        self
    }

    /// Cancel this context and every context derived from it.
    pub fn cancel(&self) {
        self.state.cancelled.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.state.is_cancelled()
    }

    #[must_use]
    pub fn scope(&self) -> &RequestScope {
        &self.scope
    }

    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.scope.request_id
    }

    #[must_use]
    pub fn tag(&self) -> Option<&str> {
        self.scope.tag.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_cancel_does_not_reach_parent() {
        let root = Context::new(RequestId::new());
        let child = root.child();
        child.cancel();
        assert!(child.is_cancelled());
        assert!(!root.is_cancelled());
    }

    #[test]
    fn test_parent_cancel_reaches_descendants() {
        let root = Context::new(RequestId::new());
        let grandchild = root.child().child();
        root.cancel();
        assert!(grandchild.is_cancelled());
    }

    #[test]
    fn test_tag_is_scoped_to_derived_context() {
        let root = Context::new(RequestId::new());
        let tagged = root.child().with_tag(Arc::from("record:query"));
        assert_eq!(tagged.tag(), Some("record:query"));
        assert_eq!(root.tag(), None);
        assert_eq!(tagged.request_id(), root.request_id());
        assert_eq!(tagged.scope().tag_or_empty(), "record:query");
    }
}
