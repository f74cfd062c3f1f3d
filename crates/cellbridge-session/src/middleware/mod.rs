//! Message interception.
//!
//! Every user action and kernel event passes through the session's
//! [`Pipeline`] before the router acts on it. A [`Middleware`] may pass the
//! message on unchanged, replace it, or drop it.

mod handler;
mod pipeline;

pub use handler::{Middleware, SessionInfo};
pub use pipeline::Pipeline;
