//! Middleware pipeline.
//!
//! Maintains a priority-sorted chain of [`Middleware`] and runs a message
//! through it.

use std::sync::Arc;

use cellbridge_core::SessionMessage;
use tracing::{debug, warn};

use super::handler::{Middleware, SessionInfo};

/// Ordered chain of middleware.
///
/// Sorted by priority (descending). The sort is stable, so equal priorities
/// keep registration order.
#[derive(Clone, Default)]
pub struct Pipeline {
    middleware: Vec<Arc<dyn Middleware>>,
}

impl Pipeline {
    /// Create an empty pipeline. It passes every message through.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`register`](Self::register).
    #[must_use]
    pub fn with(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.register(middleware);
        self
    }

    /// Register a middleware, replacing any with the same name.
    pub fn register(&mut self, middleware: Arc<dyn Middleware>) {
        let name = middleware.name().to_string();
        self.middleware.retain(|m| m.name() != name);

        debug!(name = %name, priority = middleware.priority(), "registering middleware");
        self.middleware.push(middleware);
        self.middleware
            .sort_by_key(|m| std::cmp::Reverse(m.priority()));
    }

    /// Unregister by name. Returns `true` if a middleware was removed.
    pub fn unregister(&mut self, name: &str) -> bool {
        let before = self.middleware.len();
        self.middleware.retain(|m| m.name() != name);
        let found = self.middleware.len() < before;
        if found {
            debug!(name = %name, "unregistered middleware");
        }
        found
    }

    /// Names in execution order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.middleware.iter().map(|m| m.name().to_string()).collect()
    }

    /// Number of registered middleware.
    #[must_use]
    pub fn len(&self) -> usize {
        self.middleware.len()
    }

    /// Whether no middleware is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.middleware.is_empty()
    }

    /// Run `message` through every middleware in order.
    ///
    /// Returns `None` as soon as one middleware drops the message.
    pub async fn process(
        &self,
        mut message: SessionMessage,
        info: &SessionInfo,
    ) -> Option<SessionMessage> {
        for middleware in &self.middleware {
            let original = message.clone();
            match middleware.process(message, info).await {
                Ok(Some(next)) => message = next,
                Ok(None) => {
                    debug!(
                        name = %middleware.name(),
                        message = original.label(),
                        "message dropped by middleware"
                    );
                    return None;
                }
                Err(e) => {
                    warn!(
                        name = %middleware.name(),
                        error = %e,
                        "middleware error (fail-open)"
                    );
                    message = original;
                }
            }
        }
        Some(message)
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("middleware", &self.names())
            .finish()
    }
}
