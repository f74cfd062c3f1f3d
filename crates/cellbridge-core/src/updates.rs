//! Updates broadcast from a session to its connections.
//!
//! The wire form is a JSON object tagged by `"update"`.

use serde::{Deserialize, Serialize};

use crate::actions::{AddCell, MoveCell, UpdateCell};
use crate::notebook::{CellRef, Notebook};

/// Lifecycle state reported by a kernel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KernelState {
    /// Process is starting up.
    Starting,
    /// Ready for requests.
    Idle,
    /// Executing a request.
    Busy,
    /// Restarting after a crash or explicit restart.
    Restarting,
    /// Process exited.
    Dead,
}

/// A change to session or notebook state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "update")]
pub enum Update {
    /// Complete notebook contents, sent when a connection attaches.
    #[serde(rename = "notebook.snapshot")]
    Snapshot {
        /// Full notebook.
        notebook: Notebook,
    },
    /// A cell changed (same shape as the `cell.update` action).
    #[serde(rename = "cell.update")]
    CellUpdate(UpdateCell),
    /// A cell was inserted.
    #[serde(rename = "worksheet.addCell")]
    AddCell(AddCell),
    /// A cell was removed.
    #[serde(rename = "worksheet.deleteCell")]
    DeleteCell(CellRef),
    /// A cell was moved.
    #[serde(rename = "worksheet.moveCell")]
    MoveCell(MoveCell),
    /// Several updates applied together, in order.
    #[serde(rename = "composite")]
    Composite {
        /// Updates in application order.
        #[serde(rename = "subUpdates")]
        sub_updates: Vec<Update>,
    },
    /// Notebook metadata changed (currently only the path).
    #[serde(rename = "notebook.metadata")]
    Metadata {
        /// New notebook path.
        path: String,
    },
    /// Kernel state changed.
    #[serde(rename = "notebook.sessionStatus")]
    SessionStatus {
        /// Current kernel state.
        #[serde(rename = "kernelState")]
        kernel_state: KernelState,
    },
}

impl Update {
    /// Wire tag of this update.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Snapshot { .. } => "notebook.snapshot",
            Self::CellUpdate(_) => "cell.update",
            Self::AddCell(_) => "worksheet.addCell",
            Self::DeleteCell(_) => "worksheet.deleteCell",
            Self::MoveCell(_) => "worksheet.moveCell",
            Self::Composite { .. } => "composite",
            Self::Metadata { .. } => "notebook.metadata",
            Self::SessionStatus { .. } => "notebook.sessionStatus",
        }
    }
}
