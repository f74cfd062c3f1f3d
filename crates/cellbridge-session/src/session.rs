//! The session task and its handle.
//!
//! A session is a single tokio task owning the session router. Connections
//! and the kernel feed it through one bounded queue; a [`SessionHandle`]
//! drives it through a second, command queue. Everything the router does
//! therefore happens one message at a time, in arrival order.
//!
//! The task prefers inbound messages, so a handle request is answered after
//! the events queued before it. Under a sustained inbound flood it still
//! takes one pending request (and sweeps expired correlations) after every
//! [`INBOUND_BURST`] inbound messages; in that case a request may be answered
//! before older inbound messages.

use std::sync::Arc;
use std::time::Duration;

use cellbridge_core::actions::Action;
use cellbridge_core::kernel::KernelEvent;
use cellbridge_core::notebook::Notebook;
use cellbridge_core::{ConnectionId, KernelId, SessionId};
use cellbridge_notebook::Storage;
use cellbridge_settings::{SessionSettings, get_settings};
use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tracing::{Instrument, debug, error, info, info_span};

use crate::connection::UserConnection;
use crate::errors::SessionError;
use crate::kernel::Kernel;
use crate::middleware::Pipeline;
use crate::router::SessionRouter;

/// Inbound messages handled back to back before a pending handle request
/// gets a turn.
pub const INBOUND_BURST: usize = 64;

/// Messages from connections and the kernel.
pub(crate) enum Inbound {
    Action {
        conn_id: ConnectionId,
        action: Action,
    },
    Kernel(KernelEvent),
}

enum Command {
    Attach {
        connection: Arc<dyn UserConnection>,
        reply: oneshot::Sender<()>,
    },
    Detach {
        conn_id: ConnectionId,
        reply: oneshot::Sender<bool>,
    },
    ConnectionIds {
        reply: oneshot::Sender<Vec<ConnectionId>>,
    },
    NotebookPath {
        reply: oneshot::Sender<String>,
    },
    Snapshot {
        reply: oneshot::Sender<Notebook>,
    },
    Persist {
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    Shutdown {
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
}

/// Everything needed to start a session besides its kernel and first
/// connection.
pub struct SessionOptions {
    /// Session id. Defaults to a fresh id.
    pub session_id: SessionId,
    /// Notebook path inside `storage`. Its extension selects the format.
    pub notebook_path: String,
    /// Where the notebook is read from and persisted to.
    pub storage: Arc<dyn Storage>,
    /// Middleware every message passes through.
    pub pipeline: Pipeline,
    /// Queue sizes, correlation lifetime, shutdown behavior.
    pub settings: SessionSettings,
}

impl SessionOptions {
    /// Options for `notebook_path` in `storage` with an empty pipeline.
    ///
    /// Settings come from [`get_settings`], so the settings file and
    /// `CELLBRIDGE_*` overrides apply.
    pub fn new(notebook_path: impl Into<String>, storage: Arc<dyn Storage>) -> Self {
        Self {
            session_id: SessionId::new(),
            notebook_path: notebook_path.into(),
            storage,
            pipeline: Pipeline::new(),
            settings: get_settings().session.clone(),
        }
    }

    /// Use a specific session id.
    #[must_use]
    pub fn with_session_id(mut self, session_id: impl Into<SessionId>) -> Self {
        self.session_id = session_id.into();
        self
    }

    /// Use `pipeline` for message interception.
    #[must_use]
    pub fn with_pipeline(mut self, pipeline: Pipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    /// Use `settings` instead of the defaults.
    #[must_use]
    pub fn with_settings(mut self, settings: SessionSettings) -> Self {
        self.settings = settings;
        self
    }
}

impl std::fmt::Debug for SessionOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionOptions")
            .field("session_id", &self.session_id)
            .field("notebook_path", &self.notebook_path)
            .field("pipeline", &self.pipeline)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

/// A running notebook session.
pub struct Session {
    router: SessionRouter,
    inbound: mpsc::Receiver<Inbound>,
    commands: mpsc::Receiver<Command>,
    eviction_interval: Duration,
    persist_on_shutdown: bool,
}

impl Session {
    /// Start a session.
    ///
    /// Subscribes to `kernel`, loads (or creates) the notebook, attaches
    /// `initial` (which receives a snapshot) and spawns the session task.
    /// Must be called within a tokio runtime.
    pub fn spawn(
        kernel: Arc<dyn Kernel>,
        initial: Arc<dyn UserConnection>,
        options: SessionOptions,
    ) -> Result<SessionHandle, SessionError> {
        let settings = options.settings.clone();
        let (inbound_tx, inbound_rx) = mpsc::channel(settings.inbound_queue_capacity.max(1));
        let (command_tx, command_rx) = mpsc::channel(settings.inbound_queue_capacity.max(1));

        let mut router = SessionRouter::new(kernel, options, inbound_tx)?;
        router.attach_connection(initial);

        let handle = SessionHandle {
            session_id: router.session_id().clone(),
            kernel_id: router.kernel_id().clone(),
            tx: command_tx,
        };
        let session = Self {
            router,
            inbound: inbound_rx,
            commands: command_rx,
            eviction_interval: settings.eviction_interval(),
            persist_on_shutdown: settings.persist_on_shutdown,
        };

        let span = info_span!("session", session_id = %handle.session_id);
        drop(tokio::spawn(session.run().instrument(span)));
        Ok(handle)
    }

    async fn run(mut self) {
        info!("session started");
        let mut eviction =
            tokio::time::interval(self.eviction_interval.max(Duration::from_millis(1)));
        eviction.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // Skip the immediate first tick
        let _ = eviction.tick().await;

        let mut burst = 0;
        loop {
            // Inbound first; commands only get a turn mid-stream once per burst.
            tokio::select! {
                biased;

                Some(inbound) = self.inbound.recv() => {
                    self.handle_inbound(inbound).await;
                    burst += 1;
                    if burst >= INBOUND_BURST {
                        burst = 0;
                        if !self.yield_to_commands() {
                            break;
                        }
                    }
                }
                command = self.commands.recv() => {
                    burst = 0;
                    let Some(command) = command else {
                        debug!("all session handles dropped");
                        let _ = self.shutdown();
                        break;
                    };
                    if !self.handle_command(command) {
                        break;
                    }
                }
                _ = eviction.tick() => {
                    burst = 0;
                    let _ = self.router.evict_expired();
                }
            }
        }
        info!("session stopped");
    }

    async fn handle_inbound(&mut self, inbound: Inbound) {
        match inbound {
            Inbound::Action { conn_id, action } => {
                self.router.handle_action(&conn_id, action).await;
            }
            Inbound::Kernel(event) => self.router.handle_kernel_event(event).await,
        }
    }

    /// Serve at most one pending command between inbound bursts. Returns
    /// `false` once the session should stop.
    fn yield_to_commands(&mut self) -> bool {
        let _ = self.router.evict_expired();
        match self.commands.try_recv() {
            Ok(command) => {
                debug!(burst = INBOUND_BURST, "serving command during inbound burst");
                self.handle_command(command)
            }
            Err(mpsc::error::TryRecvError::Empty) => true,
            Err(mpsc::error::TryRecvError::Disconnected) => {
                debug!("all session handles dropped");
                let _ = self.shutdown();
                false
            }
        }
    }

    /// Returns `false` once the session should stop.
    fn handle_command(&mut self, command: Command) -> bool {
        match command {
            Command::Attach { connection, reply } => {
                self.router.attach_connection(connection);
                let _ = reply.send(());
            }
            Command::Detach { conn_id, reply } => {
                let _ = reply.send(self.router.detach_connection(&conn_id));
            }
            Command::ConnectionIds { reply } => {
                let _ = reply.send(self.router.connection_ids());
            }
            Command::NotebookPath { reply } => {
                let _ = reply.send(self.router.notebook_path().to_owned());
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.router.notebook().clone());
            }
            Command::Persist { reply } => {
                let _ = reply.send(self.router.persist());
            }
            Command::Shutdown { reply } => {
                let _ = reply.send(self.shutdown());
                return false;
            }
        }
        true
    }

    fn shutdown(&self) -> Result<(), SessionError> {
        if !self.persist_on_shutdown {
            return Ok(());
        }
        let result = self.router.persist();
        if let Err(e) = &result {
            error!(error = %e, "failed to persist notebook on shutdown");
        }
        result
    }
}

/// Cloneable handle to a running [`Session`].
///
/// The session stops when [`shutdown`](Self::shutdown) is called or every
/// handle is dropped.
#[derive(Clone, Debug)]
pub struct SessionHandle {
    session_id: SessionId,
    kernel_id: KernelId,
    tx: mpsc::Sender<Command>,
}

impl SessionHandle {
    /// Session id.
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Id of the kernel bound to the session.
    pub fn kernel_id(&self) -> &KernelId {
        &self.kernel_id
    }

    /// Whether the session task has exited.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Attach another connection. It receives a full snapshot once attached.
    ///
    /// Attaching an id that is already attached adds a second entry.
    pub async fn attach_connection(
        &self,
        connection: Arc<dyn UserConnection>,
    ) -> Result<(), SessionError> {
        self.request(|reply| Command::Attach { connection, reply })
            .await
    }

    /// Remove every entry for `conn_id`. Returns whether any was attached.
    pub async fn detach_connection(&self, conn_id: &ConnectionId) -> Result<bool, SessionError> {
        let conn_id = conn_id.clone();
        self.request(|reply| Command::Detach { conn_id, reply }).await
    }

    /// Attached connection ids, in attach order.
    pub async fn connection_ids(&self) -> Result<Vec<ConnectionId>, SessionError> {
        self.request(|reply| Command::ConnectionIds { reply }).await
    }

    /// Current notebook path.
    pub async fn notebook_path(&self) -> Result<String, SessionError> {
        self.request(|reply| Command::NotebookPath { reply }).await
    }

    /// Copy of the current notebook.
    pub async fn snapshot(&self) -> Result<Notebook, SessionError> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    /// Write the notebook to storage.
    pub async fn persist(&self) -> Result<(), SessionError> {
        self.request(|reply| Command::Persist { reply }).await?
    }

    /// Stop the session, persisting first if configured to.
    pub async fn shutdown(&self) -> Result<(), SessionError> {
        self.request(|reply| Command::Shutdown { reply }).await?
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(command(reply))
            .await
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)
    }
}
