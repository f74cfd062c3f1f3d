//! Session error types.

use cellbridge_core::{ConnectionId, ProtocolError, RequestId};
use cellbridge_notebook::NotebookError;
use thiserror::Error;

/// Errors surfaced by [`Session`](crate::Session) and
/// [`SessionHandle`](crate::SessionHandle).
#[derive(Debug, Error)]
pub enum SessionError {
    /// Loading, saving or serializing the notebook failed.
    #[error(transparent)]
    Notebook(#[from] NotebookError),

    /// The session task has exited.
    #[error("session closed")]
    Closed,

    /// The session's inbound queue is full.
    #[error("session inbound queue full")]
    QueueFull,
}

/// Errors a kernel reports when accepting a request.
#[derive(Debug, Error)]
pub enum KernelError {
    /// Kernel process is not reachable.
    #[error("kernel unavailable: {0}")]
    Unavailable(String),

    /// Kernel refused the request.
    #[error("kernel rejected request {request_id}: {reason}")]
    Rejected {
        /// The refused request.
        request_id: RequestId,
        /// Kernel-supplied reason.
        reason: String,
    },
}

/// Errors on a user connection.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The peer has gone away.
    #[error("connection {0} closed")]
    Closed(ConnectionId),

    /// The outbound buffer is full.
    #[error("connection {0} send buffer full")]
    Full(ConnectionId),

    /// An update could not be encoded.
    #[error("failed to encode update: {0}")]
    Encode(#[from] serde_json::Error),

    /// An inbound frame could not be decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// No session has attached this connection yet.
    #[error("connection {0} is not attached to a session")]
    NotAttached(ConnectionId),

    /// The session this connection was attached to has exited.
    #[error("session closed")]
    SessionClosed,
}

/// Errors raised by middleware.
///
/// The pipeline treats every middleware error as "continue unchanged".
#[derive(Debug, Error)]
pub enum MiddlewareError {
    /// Middleware handler failed.
    #[error("middleware '{name}' failed: {message}")]
    Failed {
        /// Middleware name.
        name: String,
        /// Error message from the middleware.
        message: String,
    },

    /// Generic internal error.
    #[error("{0}")]
    Internal(String),
}
