//! Document model: the single entry point for notebook mutations.
//!
//! [`NotebookSession`] owns the notebook. Every change goes through
//! [`apply`](NotebookSession::apply), which validates the mutation, changes
//! the document and returns the [`Update`] describing the delta. A failed
//! mutation leaves the document untouched.

use cellbridge_core::actions::{AddCell, MoveCell, Mutation, UpdateCell};
use cellbridge_core::notebook::{Cell, CellRef, Notebook, Worksheet};
use cellbridge_core::updates::Update;
use cellbridge_core::{CellId, WorksheetId};

use crate::errors::{NotebookError, Result};

/// Owner of one notebook document.
#[derive(Clone, Debug)]
pub struct NotebookSession {
    notebook: Notebook,
}

impl NotebookSession {
    /// Wrap an existing notebook.
    #[must_use]
    pub fn new(notebook: Notebook) -> Self {
        Self { notebook }
    }

    /// Read-only view of the document.
    #[must_use]
    pub fn data(&self) -> &Notebook {
        &self.notebook
    }

    /// Consume the session and return the document.
    #[must_use]
    pub fn into_data(self) -> Notebook {
        self.notebook
    }

    /// Look up a cell by id within a worksheet.
    #[must_use]
    pub fn cell(&self, cell_id: &CellId, worksheet_id: &WorksheetId) -> Option<&Cell> {
        self.notebook
            .worksheets
            .iter()
            .find(|ws| &ws.id == worksheet_id)?
            .cells
            .iter()
            .find(|cell| &cell.id == cell_id)
    }

    /// Every executable cell, in document order.
    #[must_use]
    pub fn executable_cells(&self) -> Vec<CellRef> {
        self.notebook
            .worksheets
            .iter()
            .flat_map(|ws| {
                ws.cells
                    .iter()
                    .filter(|cell| cell.cell_type.is_executable())
                    .map(|cell| CellRef::new(ws.id.clone(), cell.id.clone()))
            })
            .collect()
    }

    /// Apply a mutation and return the update describing it.
    pub fn apply(&mut self, mutation: Mutation) -> Result<Update> {
        match mutation {
            Mutation::UpdateCell(update) => self.update_cell(update),
            Mutation::ClearOutput(cell_ref) => self.clear_output(&cell_ref),
            Mutation::AddCell(add) => self.add_cell(add),
            Mutation::DeleteCell(cell_ref) => self.delete_cell(cell_ref),
            Mutation::MoveCell(mv) => self.move_cell(mv),
            Mutation::ClearOutputs => Ok(self.clear_outputs()),
        }
    }

    fn update_cell(&mut self, update: UpdateCell) -> Result<Update> {
        let cell = self.cell_mut(&update.worksheet_id, &update.cell_id)?;
        if let Some(source) = &update.source {
            cell.source.clone_from(source);
        }
        if let Some(prompt) = &update.prompt {
            cell.prompt = Some(prompt.clone());
        }
        if let Some(metadata) = &update.metadata {
            cell.metadata.clone_from(metadata);
        }
        if let Some(outputs) = &update.outputs {
            if update.replace_outputs {
                cell.outputs.clone_from(outputs);
            } else {
                cell.outputs.extend(outputs.iter().cloned());
            }
        }
        Ok(Update::CellUpdate(update))
    }

    fn clear_output(&mut self, cell_ref: &CellRef) -> Result<Update> {
        self.cell_mut(&cell_ref.worksheet_id, &cell_ref.cell_id)?
            .outputs
            .clear();
        Ok(Update::CellUpdate(cleared(cell_ref)))
    }

    fn add_cell(&mut self, add: AddCell) -> Result<Update> {
        if self.contains_cell(&add.cell.id) {
            return Err(NotebookError::DuplicateCell(add.cell.id));
        }
        let worksheet = self.worksheet_mut(&add.worksheet_id)?;
        let index = insertion_index(worksheet, add.insert_after.as_ref())?;
        worksheet.cells.insert(index, add.cell.clone());
        Ok(Update::AddCell(add))
    }

    fn delete_cell(&mut self, cell_ref: CellRef) -> Result<Update> {
        let worksheet = self.worksheet_mut(&cell_ref.worksheet_id)?;
        let index = position(worksheet, &cell_ref.cell_id)?;
        let _ = worksheet.cells.remove(index);
        Ok(Update::DeleteCell(cell_ref))
    }

    fn move_cell(&mut self, mv: MoveCell) -> Result<Update> {
        if mv.insert_after.as_ref() == Some(&mv.cell_id) {
            return Err(NotebookError::InvalidMove(mv.cell_id));
        }
        // Validate the destination before detaching the cell from its source.
        let _ = insertion_index(
            self.worksheet(&mv.destination_worksheet_id)?,
            mv.insert_after.as_ref(),
        )?;
        let source = self.worksheet_mut(&mv.source_worksheet_id)?;
        let from = position(source, &mv.cell_id)?;
        let cell = source.cells.remove(from);

        let destination = self.worksheet_mut(&mv.destination_worksheet_id)?;
        let to = insertion_index(destination, mv.insert_after.as_ref())?;
        destination.cells.insert(to, cell);
        Ok(Update::MoveCell(mv))
    }

    fn clear_outputs(&mut self) -> Update {
        let mut sub_updates = Vec::new();
        for worksheet in &mut self.notebook.worksheets {
            for cell in &mut worksheet.cells {
                if cell.outputs.is_empty() {
                    continue;
                }
                cell.outputs.clear();
                sub_updates.push(Update::CellUpdate(cleared(&CellRef::new(
                    worksheet.id.clone(),
                    cell.id.clone(),
                ))));
            }
        }
        Update::Composite { sub_updates }
    }

    fn contains_cell(&self, cell_id: &CellId) -> bool {
        self.notebook
            .worksheets
            .iter()
            .any(|ws| ws.cells.iter().any(|cell| &cell.id == cell_id))
    }

    fn worksheet(&self, worksheet_id: &WorksheetId) -> Result<&Worksheet> {
        self.notebook
            .worksheets
            .iter()
            .find(|ws| &ws.id == worksheet_id)
            .ok_or_else(|| NotebookError::WorksheetNotFound(worksheet_id.clone()))
    }

    fn worksheet_mut(&mut self, worksheet_id: &WorksheetId) -> Result<&mut Worksheet> {
        self.notebook
            .worksheets
            .iter_mut()
            .find(|ws| &ws.id == worksheet_id)
            .ok_or_else(|| NotebookError::WorksheetNotFound(worksheet_id.clone()))
    }

    fn cell_mut(&mut self, worksheet_id: &WorksheetId, cell_id: &CellId) -> Result<&mut Cell> {
        self.worksheet_mut(worksheet_id)?
            .cells
            .iter_mut()
            .find(|cell| &cell.id == cell_id)
            .ok_or_else(|| NotebookError::CellNotFound {
                worksheet_id: worksheet_id.clone(),
                cell_id: cell_id.clone(),
            })
    }
}

fn cleared(cell_ref: &CellRef) -> UpdateCell {
    UpdateCell {
        outputs: Some(Vec::new()),
        replace_outputs: true,
        ..UpdateCell::for_cell(cell_ref)
    }
}

fn position(worksheet: &Worksheet, cell_id: &CellId) -> Result<usize> {
    worksheet
        .cells
        .iter()
        .position(|cell| &cell.id == cell_id)
        .ok_or_else(|| NotebookError::CellNotFound {
            worksheet_id: worksheet.id.clone(),
            cell_id: cell_id.clone(),
        })
}

fn insertion_index(worksheet: &Worksheet, insert_after: Option<&CellId>) -> Result<usize> {
    match insert_after {
        None => Ok(0),
        Some(after) => position(worksheet, after).map(|i| i + 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use cellbridge_core::notebook::{CellOutput, CellType};

    fn make_notebook() -> NotebookSession {
        NotebookSession::new(Notebook {
            id: "nb".into(),
            metadata: Default::default(),
            worksheets: vec![
                Worksheet {
                    id: "w1".into(),
                    name: "First".into(),
                    metadata: Default::default(),
                    cells: vec![
                        Cell::new("c1", CellType::Code, "1+1"),
                        Cell::new("m1", CellType::Markdown, "# notes"),
                        Cell::new("c2", CellType::Code, "x = 2"),
                    ],
                },
                Worksheet {
                    id: "w2".into(),
                    name: "Second".into(),
                    metadata: Default::default(),
                    cells: vec![Cell::new("c3", CellType::Code, "print(x)")],
                },
            ],
        })
    }

    fn output(kind: &str) -> CellOutput {
        CellOutput {
            output_type: kind.into(),
            mimetype_bundle: Default::default(),
        }
    }

    fn ids(nb: &NotebookSession, ws: usize) -> Vec<&str> {
        nb.data().worksheets[ws]
            .cells
            .iter()
            .map(|c| c.id.as_str())
            .collect()
    }

    #[test]
    fn cell_lookup() {
        let nb = make_notebook();
        assert_eq!(nb.cell(&"c1".into(), &"w1".into()).unwrap().source, "1+1");
        assert!(nb.cell(&"c1".into(), &"w2".into()).is_none());
        assert!(nb.cell(&"zz".into(), &"w1".into()).is_none());
    }

    #[test]
    fn executable_cells_in_document_order() {
        let nb = make_notebook();
        let cells: Vec<_> = nb
            .executable_cells()
            .into_iter()
            .map(|r| r.cell_id.into_inner())
            .collect();
        assert_eq!(cells, ["c1", "c2", "c3"]);
    }

    #[test]
    fn update_cell_appends_outputs_by_default() {
        let mut nb = make_notebook();
        let mut update = UpdateCell::for_cell(&CellRef::new("w1", "c1"));
        update.outputs = Some(vec![output("stdout")]);
        let _ = nb.apply(Mutation::UpdateCell(update.clone())).unwrap();
        let delta = nb.apply(Mutation::UpdateCell(update.clone())).unwrap();
        assert_eq!(delta, Update::CellUpdate(update));
        assert_eq!(nb.cell(&"c1".into(), &"w1".into()).unwrap().outputs.len(), 2);
    }

    #[test]
    fn update_cell_replaces_outputs_and_sets_prompt() {
        let mut nb = make_notebook();
        let mut append = UpdateCell::for_cell(&CellRef::new("w1", "c1"));
        append.outputs = Some(vec![output("stdout"), output("stdout")]);
        let _ = nb.apply(Mutation::UpdateCell(append)).unwrap();

        let mut replace = UpdateCell::for_cell(&CellRef::new("w1", "c1"));
        replace.outputs = Some(vec![output("result")]);
        replace.replace_outputs = true;
        replace.prompt = Some("4".into());
        replace.source = Some("2+2".into());
        let _ = nb.apply(Mutation::UpdateCell(replace)).unwrap();

        let cell = nb.cell(&"c1".into(), &"w1".into()).unwrap();
        assert_eq!(cell.outputs, vec![output("result")]);
        assert_eq!(cell.prompt.as_deref(), Some("4"));
        assert_eq!(cell.source, "2+2");
    }

    #[test]
    fn update_missing_cell_fails_without_change() {
        let mut nb = make_notebook();
        let before = nb.data().clone();
        let err = nb
            .apply(Mutation::UpdateCell(UpdateCell::for_cell(&CellRef::new("w1", "nope"))))
            .unwrap_err();
        assert_matches!(err, NotebookError::CellNotFound { .. });
        assert_eq!(nb.data(), &before);
    }

    #[test]
    fn clear_output_reports_replacement() {
        let mut nb = make_notebook();
        let mut update = UpdateCell::for_cell(&CellRef::new("w1", "c1"));
        update.outputs = Some(vec![output("stdout")]);
        let _ = nb.apply(Mutation::UpdateCell(update)).unwrap();

        let delta = nb.apply(Mutation::ClearOutput(CellRef::new("w1", "c1"))).unwrap();
        assert_matches!(delta, Update::CellUpdate(ref u) if u.replace_outputs && u.outputs == Some(vec![]));
        assert!(nb.cell(&"c1".into(), &"w1".into()).unwrap().outputs.is_empty());
    }

    #[test]
    fn add_cell_at_top_and_after() {
        let mut nb = make_notebook();
        let _ = nb
            .apply(Mutation::AddCell(AddCell {
                worksheet_id: "w1".into(),
                cell: Cell::new("top", CellType::Code, ""),
                insert_after: None,
            }))
            .unwrap();
        let _ = nb
            .apply(Mutation::AddCell(AddCell {
                worksheet_id: "w1".into(),
                cell: Cell::new("mid", CellType::Code, ""),
                insert_after: Some("m1".into()),
            }))
            .unwrap();
        assert_eq!(ids(&nb, 0), ["top", "c1", "m1", "mid", "c2"]);
    }

    #[test]
    fn add_duplicate_cell_rejected() {
        let mut nb = make_notebook();
        let err = nb
            .apply(Mutation::AddCell(AddCell {
                worksheet_id: "w1".into(),
                cell: Cell::new("c3", CellType::Code, ""),
                insert_after: None,
            }))
            .unwrap_err();
        assert_matches!(err, NotebookError::DuplicateCell(ref id) if id.as_str() == "c3");
    }

    #[test]
    fn add_to_missing_worksheet_rejected() {
        let mut nb = make_notebook();
        let err = nb
            .apply(Mutation::AddCell(AddCell {
                worksheet_id: "w9".into(),
                cell: Cell::new("new", CellType::Code, ""),
                insert_after: None,
            }))
            .unwrap_err();
        assert_matches!(err, NotebookError::WorksheetNotFound(_));
    }

    #[test]
    fn delete_cell() {
        let mut nb = make_notebook();
        let delta = nb.apply(Mutation::DeleteCell(CellRef::new("w1", "m1"))).unwrap();
        assert_eq!(delta, Update::DeleteCell(CellRef::new("w1", "m1")));
        assert_eq!(ids(&nb, 0), ["c1", "c2"]);
    }

    #[test]
    fn move_cell_across_worksheets() {
        let mut nb = make_notebook();
        let _ = nb
            .apply(Mutation::MoveCell(MoveCell {
                source_worksheet_id: "w1".into(),
                destination_worksheet_id: "w2".into(),
                cell_id: "c1".into(),
                insert_after: Some("c3".into()),
            }))
            .unwrap();
        assert_eq!(ids(&nb, 0), ["m1", "c2"]);
        assert_eq!(ids(&nb, 1), ["c3", "c1"]);
    }

    #[test]
    fn move_cell_within_worksheet() {
        let mut nb = make_notebook();
        let _ = nb
            .apply(Mutation::MoveCell(MoveCell {
                source_worksheet_id: "w1".into(),
                destination_worksheet_id: "w1".into(),
                cell_id: "c1".into(),
                insert_after: Some("c2".into()),
            }))
            .unwrap();
        assert_eq!(ids(&nb, 0), ["m1", "c2", "c1"]);
    }

    #[test]
    fn move_to_bad_destination_keeps_cell() {
        let mut nb = make_notebook();
        let err = nb
            .apply(Mutation::MoveCell(MoveCell {
                source_worksheet_id: "w1".into(),
                destination_worksheet_id: "w2".into(),
                cell_id: "c1".into(),
                insert_after: Some("missing".into()),
            }))
            .unwrap_err();
        assert_matches!(err, NotebookError::CellNotFound { .. });
        assert_eq!(ids(&nb, 0), ["c1", "m1", "c2"]);
    }

    #[test]
    fn move_after_itself_rejected() {
        let mut nb = make_notebook();
        let err = nb
            .apply(Mutation::MoveCell(MoveCell {
                source_worksheet_id: "w1".into(),
                destination_worksheet_id: "w1".into(),
                cell_id: "c1".into(),
                insert_after: Some("c1".into()),
            }))
            .unwrap_err();
        assert_matches!(err, NotebookError::InvalidMove(_));
    }

    #[test]
    fn clear_outputs_touches_only_cells_with_output() {
        let mut nb = make_notebook();
        for (ws, cell) in [("w1", "c2"), ("w2", "c3")] {
            let mut update = UpdateCell::for_cell(&CellRef::new(ws, cell));
            update.outputs = Some(vec![output("stdout")]);
            let _ = nb.apply(Mutation::UpdateCell(update)).unwrap();
        }
        let delta = nb.apply(Mutation::ClearOutputs).unwrap();
        assert_matches!(delta, Update::Composite { ref sub_updates } if sub_updates.len() == 2);
        assert!(
            nb.data()
                .worksheets
                .iter()
                .flat_map(|ws| &ws.cells)
                .all(|c| c.outputs.is_empty())
        );
    }
}
