//! The notebook created when nothing exists at a path yet.

use cellbridge_core::notebook::{Cell, CellType, Notebook, Worksheet};
use cellbridge_core::{CellId, NotebookId, WorksheetId};

/// Name given to the first worksheet of a new notebook.
pub const STARTER_WORKSHEET_NAME: &str = "Untitled Sheet";

/// Create a blank notebook: one worksheet holding one empty code cell.
#[must_use]
pub fn create_starter_notebook() -> Notebook {
    Notebook {
        id: NotebookId::new(),
        metadata: Default::default(),
        worksheets: vec![Worksheet {
            id: WorksheetId::new(),
            name: STARTER_WORKSHEET_NAME.to_string(),
            metadata: Default::default(),
            cells: vec![Cell::new(CellId::new(), CellType::Code, "")],
        }],
    }
}
