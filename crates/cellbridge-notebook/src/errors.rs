//! Notebook and storage error types.

use cellbridge_core::{CellId, WorksheetId};
use thiserror::Error;

/// Errors from the storage layer.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Underlying I/O failure.
    #[error("storage I/O error for '{path}': {source}")]
    Io {
        /// Path being read or written.
        path: String,
        /// The I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Path escapes the storage root or is otherwise unusable.
    #[error("invalid storage path: {0}")]
    InvalidPath(String),
}

/// Errors from the document model, serializers and persistence.
#[derive(Debug, Error)]
pub enum NotebookError {
    /// No worksheet with this id.
    #[error("worksheet not found: {0}")]
    WorksheetNotFound(WorksheetId),

    /// No cell with this id in the worksheet.
    #[error("cell not found: {cell_id} in worksheet {worksheet_id}")]
    CellNotFound {
        /// Worksheet searched.
        worksheet_id: WorksheetId,
        /// Missing cell.
        cell_id: CellId,
    },

    /// A cell with this id already exists in the notebook.
    #[error("duplicate cell id: {0}")]
    DuplicateCell(CellId),

    /// A cell cannot be placed relative to itself.
    #[error("cannot move cell {0} after itself")]
    InvalidMove(CellId),

    /// Serialized data could not be encoded or decoded.
    #[error("notebook serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Serialized data is valid JSON but not a supported notebook format.
    #[error("unsupported notebook format: {0}")]
    UnsupportedFormat(String),

    /// Storage failure.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Result type for notebook operations.
pub type Result<T> = std::result::Result<T, NotebookError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_not_found_display() {
        let err = NotebookError::CellNotFound {
            worksheet_id: "w1".into(),
            cell_id: "c9".into(),
        };
        assert_eq!(err.to_string(), "cell not found: c9 in worksheet w1");
    }

    #[test]
    fn storage_error_is_transparent() {
        let err: NotebookError = StorageError::InvalidPath("../x".into()).into();
        assert_eq!(err.to_string(), "invalid storage path: ../x");
    }
}
