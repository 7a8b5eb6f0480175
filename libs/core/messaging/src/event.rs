//! Event registration.

use crate::handler::BoxHandler;
use crate::middleware::Middleware;
use std::fmt;

/// Default number of concurrently outstanding messages per event.
pub const DEFAULT_THROTTLE: usize = 1;

/// A named event bound to a subscription and its handler.
///
/// ```rust,ignore
/// let event = Event::new("AddArticle", "add-article-sub", handler)
///     .with_middleware(audit())
///     .throttle(1);
/// ```
pub struct Event {
    pub(crate) name: String,
    pub(crate) subscription_id: String,
    pub(crate) handler: BoxHandler,
    pub(crate) middlewares: Vec<Middleware>,
    pub(crate) throttle: usize,
}

impl Event {
    pub fn new(
        name: impl Into<String>,
        subscription_id: impl Into<String>,
        handler: BoxHandler,
    ) -> Self {
        Self {
            name: name.into(),
            subscription_id: subscription_id.into(),
            handler,
            middlewares: Vec::new(),
            throttle: DEFAULT_THROTTLE,
        }
    }

    /// Add an event specific middleware. Runs inside the global ones.
    pub fn with_middleware(mut self, middleware: Middleware) -> Self {
        self.middlewares.push(middleware);
        self
    }

    /// Maximum number of messages handled at the same time.
    pub fn throttle(mut self, throttle: usize) -> Self {
        self.throttle = throttle;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("name", &self.name)
            .field("subscription_id", &self.subscription_id)
            .field("middlewares", &self.middlewares.len())
            .field("throttle", &self.throttle)
            .finish()
    }
}
