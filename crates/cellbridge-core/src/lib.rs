//! # cellbridge-core
//!
//! Foundation types shared by every cellbridge crate:
//!
//! - **Branded IDs**: `SessionId`, `ConnectionId`, `RequestId`, `CellId`, ... as newtypes
//! - **Notebook data**: `Notebook`, `Worksheet`, `Cell`, `CellOutput`
//! - **Actions**: the closed [`Action`](actions::Action) enum users send to a session
//! - **Updates**: the [`Update`](updates::Update) deltas broadcast back to users
//! - **Kernel messages**: execute requests and the events a kernel emits
//! - **Session messages**: the envelope that flows through the middleware pipeline
//! - **Logging**: `tracing` subscriber setup and log capture for tests

#![deny(unsafe_code)]

pub mod actions;
pub mod errors;
pub mod ids;
pub mod kernel;
pub mod logging;
pub mod message;
pub mod notebook;
pub mod updates;

pub use errors::ProtocolError;
pub use ids::{CellId, ConnectionId, KernelId, NotebookId, RequestId, SessionId, WorksheetId};
pub use message::SessionMessage;
