//! Session router.
//!
//! Owns one session's state (notebook, correlations, connections) and
//! decides what each inbound message does to it. The router runs inside the
//! session task, so its handlers never race each other.

use std::sync::Arc;

use cellbridge_core::actions::{Action, Mutation, UpdateCell};
use cellbridge_core::kernel::{ExecuteReply, ExecuteRequest, KernelEvent, OutputData};
use cellbridge_core::notebook::{CellOutput, CellRef, Notebook};
use cellbridge_core::updates::Update;
use cellbridge_core::{ConnectionId, KernelId, RequestId, SessionId, SessionMessage};
use cellbridge_notebook::output::create_error_output;
use cellbridge_notebook::{NotebookBinding, NotebookSession, Persister};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::broadcast::ConnectionSet;
use crate::connection::{ActionSink, UserConnection};
use crate::correlation::CorrelationTable;
use crate::errors::SessionError;
use crate::kernel::{Kernel, KernelEventSink};
use crate::middleware::{Pipeline, SessionInfo};
use crate::session::{Inbound, SessionOptions};

pub(crate) struct SessionRouter {
    session_id: SessionId,
    kernel: Arc<dyn Kernel>,
    binding: NotebookBinding,
    persister: Persister,
    notebook: NotebookSession,
    correlations: CorrelationTable,
    connections: ConnectionSet,
    pipeline: Pipeline,
    inbound: mpsc::Sender<Inbound>,
}

impl SessionRouter {
    /// Subscribe to the kernel, then bind and load the notebook.
    pub(crate) fn new(
        kernel: Arc<dyn Kernel>,
        options: SessionOptions,
        inbound: mpsc::Sender<Inbound>,
    ) -> Result<Self, SessionError> {
        let SessionOptions {
            session_id,
            notebook_path,
            storage,
            pipeline,
            settings,
        } = options;

        kernel.subscribe(KernelEventSink::new(inbound.clone()));

        let binding = NotebookBinding::for_path(notebook_path);
        let persister = Persister::new(storage);
        let notebook = persister.load_or_create(&binding)?;
        info!(
            session_id = %session_id,
            kernel_id = %kernel.id(),
            path = binding.path(),
            "session notebook loaded"
        );

        Ok(Self {
            session_id,
            kernel,
            binding,
            persister,
            notebook: NotebookSession::new(notebook),
            correlations: CorrelationTable::new(settings.correlation_ttl()),
            connections: ConnectionSet::new(),
            pipeline,
            inbound,
        })
    }

    pub(crate) fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub(crate) fn kernel_id(&self) -> &KernelId {
        self.kernel.id()
    }

    pub(crate) fn notebook_path(&self) -> &str {
        self.binding.path()
    }

    pub(crate) fn notebook(&self) -> &Notebook {
        self.notebook.data()
    }

    pub(crate) fn connection_ids(&self) -> Vec<ConnectionId> {
        self.connections.ids()
    }

    #[cfg(test)]
    pub(crate) fn correlations(&self) -> &CorrelationTable {
        &self.correlations
    }

    pub(crate) fn info(&self) -> SessionInfo {
        SessionInfo {
            session_id: self.session_id.clone(),
            kernel_id: self.kernel.id().clone(),
            notebook_path: self.binding.path().to_owned(),
            connection_ids: self.connections.ids(),
        }
    }

    // ── Connections ─────────────────────────────────────────────────────

    /// Add a connection and send it the full notebook.
    pub(crate) fn attach_connection(&mut self, connection: Arc<dyn UserConnection>) {
        let conn_id = connection.id().clone();
        connection.on_action(ActionSink::new(conn_id.clone(), self.inbound.clone()));
        self.connections.add(Arc::clone(&connection));

        let snapshot = Update::Snapshot {
            notebook: self.notebook.data().clone(),
        };
        if self.connections.send_to(&connection, &snapshot) {
            info!(
                conn_id = %conn_id,
                connections = self.connections.len(),
                "connection attached"
            );
        }
    }

    pub(crate) fn detach_connection(&mut self, conn_id: &ConnectionId) -> bool {
        let removed = self.connections.remove(conn_id);
        if removed {
            info!(
                conn_id = %conn_id,
                connections = self.connections.len(),
                "connection detached"
            );
        }
        removed
    }

    // ── Inbound messages ────────────────────────────────────────────────

    pub(crate) async fn handle_action(&mut self, conn_id: &ConnectionId, action: Action) {
        debug!(conn_id = %conn_id, action = action.kind(), "routing action");
        self.route(SessionMessage::Action(action)).await;
    }

    pub(crate) async fn handle_kernel_event(&mut self, event: KernelEvent) {
        self.route(SessionMessage::Kernel(event)).await;
    }

    async fn route(&mut self, message: SessionMessage) {
        let info = self.info();
        if let Some(message) = self.pipeline.process(message, &info).await {
            self.dispatch(message);
        }
    }

    fn dispatch(&mut self, message: SessionMessage) {
        match message {
            SessionMessage::Action(action) => self.dispatch_action(action),
            SessionMessage::Kernel(event) => self.dispatch_kernel_event(event),
        }
    }

    fn dispatch_action(&mut self, action: Action) {
        match action {
            Action::Composite { sub_actions } => {
                for sub_action in sub_actions {
                    self.dispatch_action(sub_action);
                }
            }
            Action::ExecuteCell(cell_ref) => self.execute_cell(cell_ref),
            Action::ExecuteCells => {
                for cell_ref in self.notebook.executable_cells() {
                    self.execute_cell(cell_ref);
                }
            }
            Action::UpdateCell(update) => self.apply(Mutation::UpdateCell(update)),
            Action::ClearOutput(cell_ref) => self.apply(Mutation::ClearOutput(cell_ref)),
            Action::AddCell(add) => self.apply(Mutation::AddCell(add)),
            Action::DeleteCell(cell_ref) => self.apply(Mutation::DeleteCell(cell_ref)),
            Action::MoveCell(mv) => self.apply(Mutation::MoveCell(mv)),
            Action::ClearOutputs => self.apply(Mutation::ClearOutputs),
            Action::Rename { path } => self.rename(path),
        }
    }

    fn dispatch_kernel_event(&mut self, event: KernelEvent) {
        match event {
            KernelEvent::ExecuteReply(reply) => self.on_execute_reply(reply),
            KernelEvent::OutputData(output) => self.on_output_data(output),
            KernelEvent::Status(status) => self.broadcast(&Update::SessionStatus {
                kernel_state: status.status,
            }),
            KernelEvent::ExecutionComplete { request_id } => {
                if self.correlations.close(&request_id).is_none() {
                    debug!(request_id = %request_id, "completion for unknown request");
                }
            }
        }
    }

    // ── Actions ─────────────────────────────────────────────────────────

    fn execute_cell(&mut self, cell_ref: CellRef) {
        let request_id = RequestId::new();
        self.correlations.record(request_id.clone(), cell_ref.clone());

        let Some(cell) = self.notebook.cell(&cell_ref.cell_id, &cell_ref.worksheet_id) else {
            error!(
                request_id = %request_id,
                worksheet_id = %cell_ref.worksheet_id,
                cell_id = %cell_ref.cell_id,
                "cannot execute: cell not found"
            );
            return;
        };

        let request = ExecuteRequest {
            request_id: request_id.clone(),
            worksheet_id: cell_ref.worksheet_id,
            cell_id: cell_ref.cell_id,
            code: cell.source.clone(),
        };
        debug!(request_id = %request_id, cell_id = %request.cell_id, "execute request");
        if let Err(e) = self.kernel.execute(request) {
            error!(request_id = %request_id, error = %e, "kernel did not accept execute request");
        }
    }

    fn apply(&mut self, mutation: Mutation) {
        match self.notebook.apply(mutation) {
            Ok(update) => self.broadcast(&update),
            Err(e) => error!(error = %e, "failed to apply notebook change"),
        }
    }

    fn rename(&mut self, path: String) {
        let previous = std::mem::replace(&mut self.binding, NotebookBinding::for_path(path));
        info!(
            from = previous.path(),
            to = self.binding.path(),
            format = ?self.binding.format(),
            "notebook renamed"
        );
        let update = Update::Metadata {
            path: self.binding.path().to_owned(),
        };
        self.broadcast(&update);
    }

    // ── Kernel events ───────────────────────────────────────────────────

    fn on_execute_reply(&mut self, reply: ExecuteReply) {
        let Some(cell_ref) = self.correlations.resolve(&reply.request_id).cloned() else {
            warn!(request_id = %reply.request_id, "execute reply for unknown request, nothing to update");
            return;
        };

        let mut delta = UpdateCell::for_cell(&cell_ref);
        delta.prompt = reply.execution_counter.map(|counter| counter.to_string());
        if let Some(error) = &reply.error {
            delta.outputs = Some(vec![create_error_output(error)]);
        }
        self.apply(Mutation::UpdateCell(delta));
    }

    fn on_output_data(&mut self, output: OutputData) {
        let Some(cell_ref) = self.correlations.resolve(&output.request_id).cloned() else {
            warn!(request_id = %output.request_id, "output for unknown request, nothing to update");
            return;
        };

        let mut delta = UpdateCell::for_cell(&cell_ref);
        delta.outputs = Some(vec![CellOutput {
            output_type: output.output_type,
            mimetype_bundle: output.mimetype_bundle,
        }]);
        self.apply(Mutation::UpdateCell(delta));
    }

    // ── Housekeeping ────────────────────────────────────────────────────

    fn broadcast(&mut self, update: &Update) {
        let removed = self.connections.broadcast(update);
        if !removed.is_empty() {
            info!(
                removed = removed.len(),
                connections = self.connections.len(),
                "dropped failed connections"
            );
        }
    }

    pub(crate) fn evict_expired(&mut self) -> usize {
        self.correlations.evict_expired(Instant::now())
    }

    /// Write the notebook to storage with the current path's serializer.
    pub(crate) fn persist(&self) -> Result<(), SessionError> {
        self.persister.save(&self.binding, self.notebook.data())?;
        Ok(())
    }
}
