//! Middleware trait.

use async_trait::async_trait;
use cellbridge_core::{ConnectionId, KernelId, SessionId, SessionMessage};

use crate::errors::MiddlewareError;

/// Read-only view of the session a message is flowing through.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionInfo {
    /// Session id.
    pub session_id: SessionId,
    /// Kernel bound to the session.
    pub kernel_id: KernelId,
    /// Current notebook path.
    pub notebook_path: String,
    /// Attached connections, in attach order.
    pub connection_ids: Vec<ConnectionId>,
}

/// An interceptor in a session's message pipeline.
///
/// # Priority
///
/// Higher priority middleware runs first. Default priority is 0; equal
/// priorities run in registration order.
///
/// # Errors
///
/// An `Err` from [`process`](Middleware::process) is logged and the message
/// continues to the next middleware unchanged (fail-open).
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Unique name. Registering a second middleware with the same name
    /// replaces the first.
    fn name(&self) -> &str;

    /// Execution priority. Higher runs first. Default: 0.
    fn priority(&self) -> i32 {
        0
    }

    /// Inspect a message.
    ///
    /// Return `Some` to continue (with the same or a different message) or
    /// `None` to drop it.
    async fn process(
        &self,
        message: SessionMessage,
        info: &SessionInfo,
    ) -> Result<Option<SessionMessage>, MiddlewareError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use cellbridge_core::actions::Action;

    struct Passthrough;

    #[async_trait]
    impl Middleware for Passthrough {
        fn name(&self) -> &str {
            "passthrough"
        }
        async fn process(
            &self,
            message: SessionMessage,
            _info: &SessionInfo,
        ) -> Result<Option<SessionMessage>, MiddlewareError> {
            Ok(Some(message))
        }
    }

    fn info() -> SessionInfo {
        SessionInfo {
            session_id: "s1".into(),
            kernel_id: "k1".into(),
            notebook_path: "a.ipynb".into(),
            connection_ids: vec!["u1".into()],
        }
    }

    #[test]
    fn default_priority_is_zero() {
        assert_eq!(Passthrough.priority(), 0);
    }

    #[tokio::test]
    async fn process_returns_message() {
        let out = Passthrough
            .process(Action::ExecuteCells.into(), &info())
            .await
            .unwrap();
        assert_eq!(out, Some(SessionMessage::Action(Action::ExecuteCells)));
    }
}
