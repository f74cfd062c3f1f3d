//! Notebook serialization formats.
//!
//! The format is inferred from the notebook path's extension:
//!
//! | extension | format |
//! |---|---|
//! | `.ipynb` | [`IpynbSerializer`] (nbformat 3 layout) |
//! | anything else | [`NativeSerializer`] (the model as JSON) |

mod ipynb;
mod native;

use std::path::Path;
use std::sync::Arc;

use cellbridge_core::notebook::Notebook;

use crate::errors::Result;

pub use ipynb::IpynbSerializer;
pub use native::NativeSerializer;

/// Supported on-disk notebook formats.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NotebookFormat {
    /// The cellbridge model serialized directly.
    Native,
    /// IPython notebook, nbformat 3.
    Ipynb,
}

impl NotebookFormat {
    /// Infer the format from a path's extension (case-insensitive).
    #[must_use]
    pub fn from_path(path: &str) -> Self {
        match Path::new(path)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("ipynb") => Self::Ipynb,
            _ => Self::Native,
        }
    }
}

/// Converts a notebook to and from bytes.
pub trait NotebookSerializer: Send + Sync {
    /// Format implemented by this serializer.
    fn format(&self) -> NotebookFormat;

    /// Decode a notebook.
    fn parse(&self, data: &[u8]) -> Result<Notebook>;

    /// Encode a notebook.
    fn stringify(&self, notebook: &Notebook) -> Result<Vec<u8>>;
}

/// Pick the serializer for a notebook path.
#[must_use]
pub fn select_serializer(path: &str) -> Arc<dyn NotebookSerializer> {
    match NotebookFormat::from_path(path) {
        NotebookFormat::Ipynb => Arc::new(IpynbSerializer),
        NotebookFormat::Native => Arc::new(NativeSerializer),
    }
}
