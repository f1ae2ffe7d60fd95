use crate::error::{Error, ErrorCode};
use crate::handler::Handler;
use crate::payload::Payload;
use crate::processor::Processor;
use crate::response::Response;
use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Immutable `{tag, processors, handler}` resolved per request.
pub struct RouteDescriptor {
    tag: Arc<str>,
    processors: Vec<Arc<dyn Processor>>,
    handler: Arc<dyn Handler>,
}

impl RouteDescriptor {
    /// Start building a route; without an explicit handler it answers
    /// `NotImplemented`.
    #[must_use]
    pub fn builder(tag: impl Into<Arc<str>>) -> RouteDescriptorBuilder {
        RouteDescriptorBuilder {
            tag: tag.into(),
            processors: Vec::new(),
            handler: None,
        }
    }

    #[must_use]
    pub fn tag(&self) -> &Arc<str> {
        &self.tag
    }

    #[must_use]
    pub fn processors(&self) -> &[Arc<dyn Processor>] {
        &self.processors
    }

    #[must_use]
    pub fn handler(&self) -> &dyn Handler {
        self.handler.as_ref()
    }
}

impl fmt::Debug for RouteDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteDescriptor")
            .field("tag", &self.tag)
            .field("processors", &self.processors.len())
            .finish_non_exhaustive()
    }
}

/// Builder for [`RouteDescriptor`].
pub struct RouteDescriptorBuilder {
    tag: Arc<str>,
    processors: Vec<Arc<dyn Processor>>,
    handler: Option<Arc<dyn Handler>>,
}

impl RouteDescriptorBuilder {
    /// Append a processor; processors run in the order they are added.
    #[must_use]
    pub fn processor(mut self, processor: impl Processor + 'static) -> Self {
        self.processors.push(Arc::new(processor));
        self
    }

    /// Append an already shared processor.
    #[must_use]
    pub fn shared_processor(mut self, processor: Arc<dyn Processor>) -> Self {
        self.processors.push(processor);
        self
    }

    #[must_use]
    pub fn handler(mut self, handler: impl Handler + 'static) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    #[must_use]
    pub fn build(self) -> RouteDescriptor {
        let handler = self.handler.unwrap_or_else(|| {
            let tag = Arc::clone(&self.tag);
            Arc::new(move |_: &Payload, res: &mut Response| {
                res.set_error(Error::new(
                    ErrorCode::NotImplemented,
                    format!("no handler is bound to `{tag}`"),
                ));
            })
        });
        RouteDescriptor {
            tag: self.tag,
            processors: self.processors,
            handler,
        }
    }
}

/// No route matched the payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("route unmatched: {action}")]
pub struct RouteNotFound {
    pub action: String,
}

/// Route matcher contract consumed by the dispatcher.
pub trait Matcher: Send + Sync {
    fn match_route(&self, payload: &Payload) -> Result<Arc<RouteDescriptor>, RouteNotFound>;
}

type Routes = HashMap<String, Arc<RouteDescriptor>>;

/// Action-keyed route table, read lock-free at request time.
pub struct RouteTable {
    routes: ArcSwap<Routes>,
}

impl RouteTable {
    #[must_use]
    pub fn builder() -> RouteTableBuilder {
        RouteTableBuilder {
            routes: HashMap::new(),
        }
    }

    /// Replace the whole table; requests already matched keep their route.
    pub fn publish(&self, next: RouteTableBuilder) {
        let previous = self.routes.swap(Arc::new(next.routes));
        info!(
            previous_routes = previous.len(),
            routes = self.routes.load().len(),
            "Route table published"
        );
    }

    #[must_use]
    pub fn contains(&self, action: &str) -> bool {
        self.routes.load().contains_key(action)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.load().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.load().is_empty()
    }
}

impl Matcher for RouteTable {
    fn match_route(&self, payload: &Payload) -> Result<Arc<RouteDescriptor>, RouteNotFound> {
        let routes = self.routes.load();
        match routes.get(payload.action.as_str()) {
            Some(route) => {
                debug!(
                    request_id = %payload.request_id(),
                    action = %payload.action,
                    tag = %route.tag(),
                    "Route matched"
                );
                Ok(Arc::clone(route))
            }
            None => {
                debug!(
                    request_id = %payload.request_id(),
                    action = %payload.action,
                    available_routes = routes.len(),
                    "Route unmatched"
                );
                Err(RouteNotFound {
                    action: payload.action.clone(),
                })
            }
        }
    }
}

/// Builder for [`RouteTable`] contents.
pub struct RouteTableBuilder {
    routes: Routes,
}

impl RouteTableBuilder {
    /// Register a route under its own tag.
    #[must_use]
    pub fn route(self, route: RouteDescriptorBuilder) -> Self {
        let route = route.build();
        let action = route.tag().to_string();
        self.route_as(action, route)
    }

    /// Register a route under an action that differs from its tag.
    #[must_use]
    pub fn route_as(mut self, action: impl Into<String>, route: RouteDescriptor) -> Self {
        let action = action.into();
        if self.routes.insert(action.clone(), Arc::new(route)).is_some() {
            warn!(action = %action, "Replaced existing route");
        }
        self
    }

    #[must_use]
    pub fn build(self) -> RouteTable {
        RouteTable {
            routes: ArcSwap::from_pointee(self.routes),
        }
    }
}
