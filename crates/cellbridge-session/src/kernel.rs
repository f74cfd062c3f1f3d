//! Kernel binding.
//!
//! The session talks to its kernel through the narrow [`Kernel`] trait:
//! fire-and-forget [`execute`](Kernel::execute) requests out, and a stream of
//! [`KernelEvent`]s back in through the [`KernelEventSink`] registered with
//! [`subscribe`](Kernel::subscribe). Process lifecycle and transport are the
//! implementor's concern.

use cellbridge_core::KernelId;
use cellbridge_core::kernel::{ExecuteRequest, KernelEvent};
use tokio::sync::mpsc;

use crate::errors::{KernelError, SessionError};
use crate::session::Inbound;

/// An execution backend bound to one session.
pub trait Kernel: Send + Sync {
    /// Kernel identifier.
    fn id(&self) -> &KernelId;

    /// Queue `request` for execution. Must not wait for the result; every
    /// reply and output arrives later as a [`KernelEvent`] carrying the
    /// request's id.
    fn execute(&self, request: ExecuteRequest) -> Result<(), KernelError>;

    /// Register where events for the session should be delivered.
    fn subscribe(&self, sink: KernelEventSink);
}

/// Delivers kernel events to a session.
#[derive(Clone, Debug)]
pub struct KernelEventSink {
    tx: mpsc::Sender<Inbound>,
}

impl KernelEventSink {
    pub(crate) fn new(tx: mpsc::Sender<Inbound>) -> Self {
        Self { tx }
    }

    /// Deliver an event, waiting for queue space.
    pub async fn emit(&self, event: KernelEvent) -> Result<(), SessionError> {
        self.tx
            .send(Inbound::Kernel(event))
            .await
            .map_err(|_| SessionError::Closed)
    }

    /// Deliver an event without waiting. Fails if the queue is full or the
    /// session has exited.
    pub fn try_emit(&self, event: KernelEvent) -> Result<(), SessionError> {
        self.tx
            .try_send(Inbound::Kernel(event))
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => SessionError::QueueFull,
                mpsc::error::TrySendError::Closed(_) => SessionError::Closed,
            })
    }

    /// Whether the session has exited.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
