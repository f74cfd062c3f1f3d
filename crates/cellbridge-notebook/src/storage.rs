//! Byte-level notebook storage.
//!
//! Paths are relative, `/`-separated keys. [`FileStorage`] maps them under a
//! root directory; [`MemoryStorage`] keeps them in a map for tests and
//! ephemeral sessions.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use cellbridge_settings::StorageSettings;
use parking_lot::Mutex;
use tracing::debug;

use crate::errors::StorageError;

/// Reads and writes raw notebook bytes by path.
pub trait Storage: Send + Sync {
    /// Read the contents at `path`, or `None` if nothing is stored there.
    fn read(&self, path: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Replace the contents at `path`.
    fn write(&self, path: &str, data: &[u8]) -> Result<(), StorageError>;
}

/// Storage rooted at a directory on the local filesystem.
#[derive(Clone, Debug)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    /// Store notebooks under `root`. The directory is created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Store notebooks under the configured `storage.root`.
    pub fn from_settings(settings: &StorageSettings) -> Self {
        Self::new(&settings.root)
    }

    /// The storage root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(path);
        if path.is_empty() {
            return Err(StorageError::InvalidPath(path.to_owned()));
        }
        for component in relative.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                _ => return Err(StorageError::InvalidPath(path.to_owned())),
            }
        }
        Ok(self.root.join(relative))
    }
}

impl Storage for FileStorage {
    fn read(&self, path: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let full = self.resolve(path)?;
        match std::fs::read(&full) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Io {
                path: path.to_owned(),
                source,
            }),
        }
    }

    fn write(&self, path: &str, data: &[u8]) -> Result<(), StorageError> {
        let full = self.resolve(path)?;
        let io_err = |source| StorageError::Io {
            path: path.to_owned(),
            source,
        };
        let parent = full.parent().unwrap_or(&self.root);
        std::fs::create_dir_all(parent).map_err(io_err)?;

        // Atomic replace via a sibling temp file.
        let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(io_err)?;
        tmp.write_all(data).map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;
        let _ = tmp.persist(&full).map_err(|e| io_err(e.error))?;

        debug!(path, bytes = data.len(), "notebook written");
        Ok(())
    }
}

/// In-memory storage.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    files: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    /// Empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage pre-populated with one entry.
    #[must_use]
    pub fn with_file(path: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        let storage = Self::new();
        let _ = storage.files.lock().insert(path.into(), data.into());
        storage
    }

    /// Stored paths, sorted.
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<_> = self.files.lock().keys().cloned().collect();
        paths.sort();
        paths
    }
}

impl Storage for MemoryStorage {
    fn read(&self, path: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.files.lock().get(path).cloned())
    }

    fn write(&self, path: &str, data: &[u8]) -> Result<(), StorageError> {
        let _ = self.files.lock().insert(path.to_owned(), data.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn file_storage_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());
        assert!(storage.read("nope.ipynb").unwrap().is_none());
    }

    #[test]
    fn file_storage_from_settings_uses_root() {
        let dir = tempfile::tempdir().unwrap();
        let settings = StorageSettings {
            root: dir.path().join("books").to_string_lossy().into_owned(),
        };
        let storage = FileStorage::from_settings(&settings);
        storage.write("a.json", b"{}").unwrap();
        assert_eq!(storage.root(), dir.path().join("books"));
        assert!(dir.path().join("books/a.json").exists());
    }

    #[test]
    fn file_storage_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());
        storage.write("nested/dir/a.ipynb", b"{}").unwrap();
        assert_eq!(storage.read("nested/dir/a.ipynb").unwrap().unwrap(), b"{}");
        assert!(dir.path().join("nested/dir/a.ipynb").exists());
    }

    #[test]
    fn file_storage_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());
        storage.write("a.json", b"one").unwrap();
        storage.write("a.json", b"two").unwrap();
        assert_eq!(storage.read("a.json").unwrap().unwrap(), b"two");
    }

    #[test]
    fn file_storage_rejects_escaping_paths() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());
        assert_matches!(
            storage.read("../outside.ipynb"),
            Err(StorageError::InvalidPath(_))
        );
        assert_matches!(
            storage.write("/etc/passwd", b""),
            Err(StorageError::InvalidPath(_))
        );
        assert_matches!(storage.read(""), Err(StorageError::InvalidPath(_)));
    }

    #[test]
    fn memory_storage_round_trip() {
        let storage = MemoryStorage::with_file("a.ipynb", b"x".to_vec());
        storage.write("b.json", b"y").unwrap();
        assert_eq!(storage.read("a.ipynb").unwrap().unwrap(), b"x");
        assert_eq!(storage.read("b.json").unwrap().unwrap(), b"y");
        assert!(storage.read("c").unwrap().is_none());
        assert_eq!(storage.paths(), vec!["a.ipynb", "b.json"]);
    }
}
