//! # cellbridge-notebook
//!
//! The notebook document model and everything needed to load and save it.
//!
//! - [`NotebookSession`]: owns a [`Notebook`](cellbridge_core::notebook::Notebook)
//!   and funnels every change through [`NotebookSession::apply`]
//! - [`serializers`]: on-disk formats, selected by path extension
//! - [`storage`]: byte-level [`Storage`] trait with file and in-memory backends
//! - [`persist`]: read-or-create and save, tying the two together

#![deny(unsafe_code)]

pub mod errors;
pub mod model;
pub mod output;
pub mod persist;
pub mod serializers;
pub mod starter;
pub mod storage;

pub use errors::{NotebookError, Result, StorageError};
pub use model::NotebookSession;
pub use persist::{NotebookBinding, Persister};
pub use serializers::{NotebookFormat, NotebookSerializer, select_serializer};
pub use storage::{FileStorage, MemoryStorage, Storage};
