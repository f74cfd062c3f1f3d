//! Messages exchanged with a kernel.
//!
//! The kernel knows nothing about notebooks: it receives code tagged with a
//! [`RequestId`] and echoes that id on every event the request produces.

use serde::{Deserialize, Serialize};

use crate::ids::{CellId, RequestId, WorksheetId};
use crate::notebook::MimetypeBundle;
use crate::updates::KernelState;

/// Request to execute one cell's source.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteRequest {
    /// Correlation id echoed on every resulting event.
    pub request_id: RequestId,
    /// Worksheet of the originating cell.
    pub worksheet_id: WorksheetId,
    /// Originating cell.
    pub cell_id: CellId,
    /// Source text to execute.
    pub code: String,
}

/// Error raised by user code inside the kernel.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionError {
    /// Exception class name (e.g. `ZeroDivisionError`).
    pub name: String,
    /// Exception message.
    pub message: String,
    /// Traceback lines, outermost first.
    #[serde(default)]
    pub traceback: Vec<String>,
}

/// Final reply to an execute request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteReply {
    /// Id of the request this replies to.
    pub request_id: RequestId,
    /// Kernel execution counter assigned to the request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_counter: Option<u64>,
    /// Present when the executed code raised.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ExecutionError>,
}

/// A streamed output item produced while executing a request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputData {
    /// Id of the request that produced the output.
    pub request_id: RequestId,
    /// Output kind (`result`, `stdout`, `stderr`, ...).
    #[serde(rename = "type")]
    pub output_type: String,
    /// Payload keyed by MIME type.
    pub mimetype_bundle: MimetypeBundle,
}

/// Kernel state change, independent of any request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KernelStatus {
    /// New kernel state.
    pub status: KernelState,
}

/// Everything a kernel can emit towards its session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum KernelEvent {
    /// Final reply for a request.
    ExecuteReply(ExecuteReply),
    /// Streamed output for a request.
    OutputData(OutputData),
    /// Kernel state change.
    Status(KernelStatus),
    /// No further events will arrive for this request.
    #[serde(rename_all = "camelCase")]
    ExecutionComplete {
        /// The finished request.
        request_id: RequestId,
    },
}

impl KernelEvent {
    /// The request this event belongs to, if any.
    #[must_use]
    pub fn request_id(&self) -> Option<&RequestId> {
        match self {
            Self::ExecuteReply(reply) => Some(&reply.request_id),
            Self::OutputData(output) => Some(&output.request_id),
            Self::ExecutionComplete { request_id } => Some(request_id),
            Self::Status(_) => None,
        }
    }
}
