//! Loading and saving notebooks through a [`Storage`] backend.

use std::fmt;
use std::sync::Arc;

use cellbridge_core::notebook::Notebook;
use tracing::{debug, info};

use crate::errors::Result;
use crate::serializers::{NotebookFormat, NotebookSerializer, select_serializer};
use crate::starter::create_starter_notebook;
use crate::storage::Storage;

/// A notebook path paired with the serializer its extension selects.
///
/// The two always change together: renaming a notebook to a different
/// extension switches its on-disk format.
#[derive(Clone)]
pub struct NotebookBinding {
    path: String,
    serializer: Arc<dyn NotebookSerializer>,
}

impl NotebookBinding {
    /// Bind `path` to its serializer.
    pub fn for_path(path: impl Into<String>) -> Self {
        let path = path.into();
        let serializer = select_serializer(&path);
        Self { path, serializer }
    }

    /// Notebook path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Serializer for the path.
    pub fn serializer(&self) -> &Arc<dyn NotebookSerializer> {
        &self.serializer
    }

    /// On-disk format for the path.
    pub fn format(&self) -> NotebookFormat {
        self.serializer.format()
    }
}

impl fmt::Debug for NotebookBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotebookBinding")
            .field("path", &self.path)
            .field("format", &self.format())
            .finish()
    }
}

/// Reads and writes notebooks for a binding.
#[derive(Clone)]
pub struct Persister {
    storage: Arc<dyn Storage>,
}

impl Persister {
    /// Persist through `storage`.
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Load the notebook at the binding's path, or a starter notebook if
    /// nothing is stored there yet.
    pub fn load_or_create(&self, binding: &NotebookBinding) -> Result<Notebook> {
        match self.storage.read(binding.path())? {
            Some(data) => {
                let notebook = binding.serializer().parse(&data)?;
                debug!(path = binding.path(), bytes = data.len(), "notebook loaded");
                Ok(notebook)
            }
            None => {
                info!(path = binding.path(), "no notebook stored, creating starter notebook");
                Ok(create_starter_notebook())
            }
        }
    }

    /// Serialize `notebook` with the binding's serializer and write it.
    pub fn save(&self, binding: &NotebookBinding, notebook: &Notebook) -> Result<()> {
        info!(path = binding.path(), format = ?binding.format(), "persisting notebook");
        let data = binding.serializer().stringify(notebook)?;
        self.storage.write(binding.path(), &data)?;
        Ok(())
    }
}

impl fmt::Debug for Persister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Persister").finish_non_exhaustive()
    }
}
