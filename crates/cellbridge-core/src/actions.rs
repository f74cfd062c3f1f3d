//! Actions sent by users to a session.
//!
//! The wire form is a JSON object tagged by `"action"`:
//!
//! ```json
//! { "action": "cell.execute", "worksheetId": "w1", "cellId": "c1" }
//! ```
//!
//! [`Action`] is closed: every kind the router understands is a variant, and
//! anything else is rejected by [`Action::from_json`] with
//! [`ProtocolError::UnknownAction`]. Inside a composite an unknown sub-action
//! is skipped with a warning and its siblings are kept.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::errors::ProtocolError;
use crate::ids::{CellId, WorksheetId};
use crate::notebook::{Cell, CellOutput, CellRef, Metadata};

/// Wire tag of every action kind, in the order of the [`Action`] variants.
pub const ACTION_KINDS: &[&str] = &[
    "composite",
    "cell.execute",
    "notebook.executeCells",
    "cell.update",
    "cell.clearOutput",
    "worksheet.addCell",
    "worksheet.deleteCell",
    "worksheet.moveCell",
    "notebook.clearOutputs",
    "notebook.rename",
];

/// A user action.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum Action {
    /// Apply each sub-action in order.
    #[serde(rename = "composite")]
    Composite {
        /// Actions to apply, in order.
        #[serde(rename = "subActions")]
        sub_actions: Vec<Action>,
    },
    /// Execute one cell on the kernel.
    #[serde(rename = "cell.execute")]
    ExecuteCell(CellRef),
    /// Execute every code cell in document order.
    #[serde(rename = "notebook.executeCells")]
    ExecuteCells,
    /// Change a cell's source, prompt, metadata or outputs.
    #[serde(rename = "cell.update")]
    UpdateCell(UpdateCell),
    /// Remove all outputs from one cell.
    #[serde(rename = "cell.clearOutput")]
    ClearOutput(CellRef),
    /// Insert a cell into a worksheet.
    #[serde(rename = "worksheet.addCell")]
    AddCell(AddCell),
    /// Remove a cell from a worksheet.
    #[serde(rename = "worksheet.deleteCell")]
    DeleteCell(CellRef),
    /// Move a cell within or across worksheets.
    #[serde(rename = "worksheet.moveCell")]
    MoveCell(MoveCell),
    /// Remove outputs from every cell.
    #[serde(rename = "notebook.clearOutputs")]
    ClearOutputs,
    /// Change the notebook path (and therefore its storage format).
    #[serde(rename = "notebook.rename")]
    Rename {
        /// New notebook path.
        path: String,
    },
}

impl Action {
    /// Wire tag of this action.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Composite { .. } => "composite",
            Self::ExecuteCell(_) => "cell.execute",
            Self::ExecuteCells => "notebook.executeCells",
            Self::UpdateCell(_) => "cell.update",
            Self::ClearOutput(_) => "cell.clearOutput",
            Self::AddCell(_) => "worksheet.addCell",
            Self::DeleteCell(_) => "worksheet.deleteCell",
            Self::MoveCell(_) => "worksheet.moveCell",
            Self::ClearOutputs => "notebook.clearOutputs",
            Self::Rename { .. } => "notebook.rename",
        }
    }

    /// Decode an action from its JSON wire form.
    ///
    /// Distinguishes an unknown `"action"` tag from a malformed payload so
    /// callers can log the former as a warning and move on.
    pub fn from_json(text: &str) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(value)
    }

    /// Decode an action from an already-parsed JSON value.
    pub fn from_value(value: Value) -> Result<Self, ProtocolError> {
        let kind = value
            .get("action")
            .and_then(Value::as_str)
            .ok_or(ProtocolError::MissingTag("action"))?;
        if !ACTION_KINDS.contains(&kind) {
            return Err(ProtocolError::UnknownAction(kind.to_owned()));
        }
        if kind == "composite" {
            return Self::composite_from_value(value);
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Decode `subActions` one element at a time so an unknown kind drops
    /// only that element.
    fn composite_from_value(mut value: Value) -> Result<Self, ProtocolError> {
        if !value.get("subActions").is_some_and(Value::is_array) {
            return Ok(serde_json::from_value(value)?);
        }
        let Some(Value::Array(children)) = value.get_mut("subActions").map(Value::take) else {
            return Ok(serde_json::from_value(value)?);
        };

        let mut sub_actions = Vec::with_capacity(children.len());
        for child in children {
            match Self::from_value(child) {
                Ok(action) => sub_actions.push(action),
                Err(ProtocolError::UnknownAction(kind)) => {
                    warn!(kind = %kind, "no handler for action message type, skipping sub-action");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(Self::Composite { sub_actions })
    }
}

/// Payload of `cell.update`.
///
/// Fields left as `None` are untouched. New outputs are appended unless
/// `replace_outputs` is set.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCell {
    /// Worksheet containing the cell.
    pub worksheet_id: WorksheetId,
    /// Target cell.
    pub cell_id: CellId,
    /// New source text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// New prompt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// Metadata to replace the cell's metadata with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    /// Outputs to append (or to replace with, see `replace_outputs`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs: Option<Vec<CellOutput>>,
    /// Replace existing outputs instead of appending.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub replace_outputs: bool,
}

impl UpdateCell {
    /// An update addressing `cell_ref` with no changes yet.
    #[must_use]
    pub fn for_cell(cell_ref: &CellRef) -> Self {
        Self {
            worksheet_id: cell_ref.worksheet_id.clone(),
            cell_id: cell_ref.cell_id.clone(),
            ..Self::default()
        }
    }
}

/// Payload of `worksheet.addCell`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddCell {
    /// Worksheet receiving the cell.
    pub worksheet_id: WorksheetId,
    /// The new cell.
    pub cell: Cell,
    /// Insert after this cell; `None` inserts at the top.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insert_after: Option<CellId>,
}

/// Payload of `worksheet.moveCell`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveCell {
    /// Worksheet the cell currently lives in.
    pub source_worksheet_id: WorksheetId,
    /// Worksheet the cell moves to.
    pub destination_worksheet_id: WorksheetId,
    /// The cell to move.
    pub cell_id: CellId,
    /// Place after this cell in the destination; `None` places it at the top.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insert_after: Option<CellId>,
}

/// The subset of actions that mutate the notebook document.
///
/// This is the only input the document model's `apply` accepts.
#[derive(Clone, Debug, PartialEq)]
pub enum Mutation {
    /// See [`Action::UpdateCell`].
    UpdateCell(UpdateCell),
    /// See [`Action::ClearOutput`].
    ClearOutput(CellRef),
    /// See [`Action::AddCell`].
    AddCell(AddCell),
    /// See [`Action::DeleteCell`].
    DeleteCell(CellRef),
    /// See [`Action::MoveCell`].
    MoveCell(MoveCell),
    /// See [`Action::ClearOutputs`].
    ClearOutputs,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::capture_logs;
    use assert_matches::assert_matches;
    use serde_json::json;
    use tracing::Level;

    #[test]
    fn decode_execute_cell() {
        let action =
            Action::from_json(r#"{"action":"cell.execute","worksheetId":"w1","cellId":"c1"}"#)
                .unwrap();
        assert_eq!(action, Action::ExecuteCell(CellRef::new("w1", "c1")));
        assert_eq!(action.kind(), "cell.execute");
    }

    #[test]
    fn decode_nested_composite() {
        let action = Action::from_value(json!({
            "action": "composite",
            "subActions": [
                {"action": "notebook.clearOutputs"},
                {"action": "composite", "subActions": [
                    {"action": "notebook.rename", "path": "b.ipynb"}
                ]}
            ]
        }))
        .unwrap();
        assert_matches!(action, Action::Composite { ref sub_actions } if sub_actions.len() == 2);
    }

    #[test]
    fn composite_skips_unknown_sub_action() {
        let (logs, _guard) = capture_logs();
        let action = Action::from_json(
            r#"{"action":"composite","subActions":[
                {"action":"notebook.clearOutputs"},
                {"action":"cell.explode"},
                {"action":"notebook.rename","path":"b.ipynb"}
            ]}"#,
        )
        .unwrap();

        assert_eq!(
            action,
            Action::Composite {
                sub_actions: vec![
                    Action::ClearOutputs,
                    Action::Rename {
                        path: "b.ipynb".into()
                    },
                ]
            }
        );
        assert!(logs.has_event(Level::WARN, "skipping sub-action"));
        let event = logs
            .events()
            .into_iter()
            .find(|e| e.message.contains("skipping sub-action"))
            .unwrap();
        assert_eq!(event.field("kind"), Some("cell.explode"));
    }

    #[test]
    fn nested_composite_skips_unknown_sub_action() {
        let action = Action::from_value(json!({
            "action": "composite",
            "subActions": [
                {"action": "composite", "subActions": [
                    {"action": "cell.explode"},
                    {"action": "notebook.executeCells"}
                ]}
            ]
        }))
        .unwrap();
        assert_eq!(
            action,
            Action::Composite {
                sub_actions: vec![Action::Composite {
                    sub_actions: vec![Action::ExecuteCells]
                }]
            }
        );
    }

    #[test]
    fn composite_with_malformed_sub_action_is_rejected() {
        let err = Action::from_value(json!({
            "action": "composite",
            "subActions": [{"action": "cell.execute"}]
        }))
        .unwrap_err();
        assert_matches!(err, ProtocolError::Json(_));

        let err = Action::from_value(json!({"action": "composite", "subActions": 3})).unwrap_err();
        assert_matches!(err, ProtocolError::Json(_));
    }

    #[test]
    fn decode_unknown_kind_is_distinguished() {
        let err = Action::from_json(r#"{"action":"cell.explode"}"#).unwrap_err();
        assert_matches!(err, ProtocolError::UnknownAction(ref k) if k == "cell.explode");
    }

    #[test]
    fn decode_missing_tag() {
        let err = Action::from_json(r#"{"cellId":"c1"}"#).unwrap_err();
        assert_matches!(err, ProtocolError::MissingTag("action"));
    }

    #[test]
    fn decode_malformed_payload() {
        let err = Action::from_json(r#"{"action":"cell.execute"}"#).unwrap_err();
        assert_matches!(err, ProtocolError::Json(_));
    }

    #[test]
    fn update_cell_omits_unset_fields() {
        let update = UpdateCell::for_cell(&CellRef::new("w1", "c1"));
        let value = serde_json::to_value(Action::UpdateCell(update)).unwrap();
        assert_eq!(
            value,
            json!({"action": "cell.update", "worksheetId": "w1", "cellId": "c1"})
        );
    }

    #[test]
    fn every_kind_is_listed() {
        let actions = [
            Action::Composite { sub_actions: vec![] },
            Action::ExecuteCell(CellRef::new("w", "c")),
            Action::ExecuteCells,
            Action::UpdateCell(UpdateCell::default()),
            Action::ClearOutput(CellRef::new("w", "c")),
            Action::AddCell(AddCell {
                worksheet_id: "w".into(),
                cell: Cell::default(),
                insert_after: None,
            }),
            Action::DeleteCell(CellRef::new("w", "c")),
            Action::MoveCell(MoveCell {
                source_worksheet_id: "w".into(),
                destination_worksheet_id: "w".into(),
                cell_id: "c".into(),
                insert_after: None,
            }),
            Action::ClearOutputs,
            Action::Rename { path: "x".into() },
        ];
        let kinds: Vec<_> = actions.iter().map(Action::kind).collect();
        assert_eq!(kinds, ACTION_KINDS);
        for action in actions {
            let value = serde_json::to_value(&action).unwrap();
            assert_eq!(value["action"], action.kind());
        }
    }
}
