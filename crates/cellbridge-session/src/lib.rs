//! # cellbridge-session
//!
//! One session per open notebook: binds a single [`Kernel`] to any number of
//! [`UserConnection`]s and routes traffic between them.
//!
//! - **Router**: user actions mutate the notebook or go to the kernel;
//!   kernel events are mapped back to cells and become notebook updates
//! - **Correlation**: [`CorrelationTable`] maps request ids to cells, with
//!   explicit close-out and TTL eviction
//! - **Middleware**: a priority-ordered [`Pipeline`] sees every message first
//! - **Broadcast**: [`ConnectionSet`] fans updates out and drops failed peers
//! - **Session task**: [`Session::spawn`] starts the task, [`SessionHandle`]
//!   talks to it

#![deny(unsafe_code)]

pub mod broadcast;
pub mod connection;
pub mod correlation;
pub mod errors;
pub mod kernel;
pub mod middleware;
mod router;
pub mod session;

pub use broadcast::ConnectionSet;
pub use connection::{ActionSink, ChannelConnection, UserConnection};
pub use correlation::CorrelationTable;
pub use errors::{ConnectionError, KernelError, MiddlewareError, SessionError};
pub use kernel::{Kernel, KernelEventSink};
pub use middleware::{Middleware, Pipeline, SessionInfo};
pub use session::{INBOUND_BURST, Session, SessionHandle, SessionOptions};
