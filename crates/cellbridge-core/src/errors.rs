//! Wire protocol errors.

use thiserror::Error;

/// Errors decoding a wire message.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Payload was not valid JSON or did not match the expected shape.
    #[error("invalid message: {0}")]
    Json(#[from] serde_json::Error),

    /// The discriminating tag field was absent or not a string.
    #[error("message has no '{0}' tag")]
    MissingTag(&'static str),

    /// The action tag names no known action.
    #[error("no handler for action message type \"{0}\"")]
    UnknownAction(String),
}
