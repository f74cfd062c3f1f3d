//! The envelope every message travels in through the middleware pipeline.

use serde::{Deserialize, Serialize};

use crate::actions::Action;
use crate::kernel::KernelEvent;

/// A message flowing through a session, in either direction.
///
/// Middleware may return a different variant than it received; the router
/// dispatches on whatever comes out of the pipeline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", content = "message", rename_all = "camelCase")]
pub enum SessionMessage {
    /// Action sent by a user connection.
    Action(Action),
    /// Event emitted by the kernel.
    Kernel(KernelEvent),
}

impl SessionMessage {
    /// Short label for logs (`cell.execute`, `kernel.executeReply`, ...).
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Action(action) => action.kind(),
            Self::Kernel(KernelEvent::ExecuteReply(_)) => "kernel.executeReply",
            Self::Kernel(KernelEvent::OutputData(_)) => "kernel.outputData",
            Self::Kernel(KernelEvent::Status(_)) => "kernel.status",
            Self::Kernel(KernelEvent::ExecutionComplete { .. }) => "kernel.executionComplete",
        }
    }
}

impl From<Action> for SessionMessage {
    fn from(action: Action) -> Self {
        Self::Action(action)
    }
}

impl From<KernelEvent> for SessionMessage {
    fn from(event: KernelEvent) -> Self {
        Self::Kernel(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::KernelStatus;
    use crate::updates::KernelState;

    #[test]
    fn labels() {
        assert_eq!(SessionMessage::from(Action::ExecuteCells).label(), "notebook.executeCells");
        let status = KernelEvent::Status(KernelStatus {
            status: KernelState::Dead,
        });
        assert_eq!(SessionMessage::from(status).label(), "kernel.status");
    }
}
