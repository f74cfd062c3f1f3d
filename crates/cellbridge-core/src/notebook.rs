//! Notebook document data.
//!
//! A notebook is an ordered list of worksheets, each an ordered list of
//! cells. These are plain data types; mutation rules live in the
//! `cellbridge-notebook` crate.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ids::{CellId, NotebookId, WorksheetId};

/// Free-form metadata attached to notebooks, worksheets and cells.
pub type Metadata = Map<String, Value>;

/// Output payload keyed by MIME type (e.g. `text/plain`, `image/png`).
pub type MimetypeBundle = Map<String, Value>;

/// Root notebook document.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notebook {
    /// Notebook identifier.
    pub id: NotebookId,
    /// Notebook-level metadata.
    #[serde(default)]
    pub metadata: Metadata,
    /// Worksheets in display order.
    #[serde(default)]
    pub worksheets: Vec<Worksheet>,
}

/// An ordered group of cells.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Worksheet {
    /// Worksheet identifier.
    pub id: WorksheetId,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Worksheet-level metadata.
    #[serde(default)]
    pub metadata: Metadata,
    /// Cells in display order.
    #[serde(default)]
    pub cells: Vec<Cell>,
}

/// Kind of a cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellType {
    /// Executable source code.
    #[default]
    Code,
    /// Markdown prose.
    Markdown,
    /// Section heading.
    Heading,
}

impl CellType {
    /// Whether cells of this type are sent to the kernel for execution.
    #[must_use]
    pub fn is_executable(self) -> bool {
        matches!(self, Self::Code)
    }
}

/// A single executable or content block.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cell {
    /// Cell identifier.
    pub id: CellId,
    /// Cell kind.
    #[serde(rename = "type")]
    pub cell_type: CellType,
    /// Source text.
    #[serde(default)]
    pub source: String,
    /// Prompt shown next to the cell (the kernel's execution counter).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// Cell-level metadata.
    #[serde(default)]
    pub metadata: Metadata,
    /// Outputs produced by executing the cell.
    #[serde(default)]
    pub outputs: Vec<CellOutput>,
}

impl Cell {
    /// Create an empty cell of the given type.
    #[must_use]
    pub fn new(id: impl Into<CellId>, cell_type: CellType, source: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            cell_type,
            source: source.into(),
            ..Self::default()
        }
    }
}

/// One output item attached to a cell.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellOutput {
    /// Output kind (`result`, `stdout`, `stderr`, `error`, ...).
    #[serde(rename = "type")]
    pub output_type: String,
    /// Payload keyed by MIME type.
    #[serde(default)]
    pub mimetype_bundle: MimetypeBundle,
}

/// Location of a cell inside a notebook.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellRef {
    /// Worksheet containing the cell.
    pub worksheet_id: WorksheetId,
    /// The cell.
    pub cell_id: CellId,
}

impl CellRef {
    /// Build a reference from its parts.
    #[must_use]
    pub fn new(worksheet_id: impl Into<WorksheetId>, cell_id: impl Into<CellId>) -> Self {
        Self {
            worksheet_id: worksheet_id.into(),
            cell_id: cell_id.into(),
        }
    }
}
