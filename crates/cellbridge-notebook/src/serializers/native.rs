use cellbridge_core::notebook::Notebook;

use super::{NotebookFormat, NotebookSerializer};
use crate::errors::Result;

/// Serializes the notebook model as pretty-printed JSON.
#[derive(Clone, Copy, Debug, Default)]
pub struct NativeSerializer;

impl NotebookSerializer for NativeSerializer {
    fn format(&self) -> NotebookFormat {
        NotebookFormat::Native
    }

    fn parse(&self, data: &[u8]) -> Result<Notebook> {
        Ok(serde_json::from_slice(data)?)
    }

    fn stringify(&self, notebook: &Notebook) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(notebook)?)
    }
}
