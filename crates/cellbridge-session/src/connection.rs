//! User connections.
//!
//! A [`UserConnection`] is one live channel to a user. The session hands it
//! an [`ActionSink`] when it attaches; the connection pushes decoded actions
//! into the sink and receives [`Update`]s through
//! [`UserConnection::send_update`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use cellbridge_core::actions::Action;
use cellbridge_core::updates::Update;
use cellbridge_core::{ConnectionId, ProtocolError};
use cellbridge_settings::SessionSettings;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::errors::ConnectionError;
use crate::session::Inbound;

/// A user-facing connection attached to a session.
pub trait UserConnection: Send + Sync {
    /// Stable id of this connection.
    fn id(&self) -> &ConnectionId;

    /// Register where inbound actions from this connection should go.
    ///
    /// Called once per attach. A later call replaces the earlier sink.
    fn on_action(&self, sink: ActionSink);

    /// The session stopped broadcasting to this connection. Actions it
    /// submits afterwards must not reach the session.
    fn on_detach(&self) {}

    /// Deliver an update to the user.
    ///
    /// Must not block. Any error marks the connection as failed: the
    /// session stops broadcasting to it and calls
    /// [`on_detach`](Self::on_detach).
    fn send_update(&self, update: &Update) -> Result<(), ConnectionError>;
}

/// Forwards actions from one connection into its session.
#[derive(Clone, Debug)]
pub struct ActionSink {
    conn_id: ConnectionId,
    tx: mpsc::Sender<Inbound>,
}

impl ActionSink {
    pub(crate) fn new(conn_id: ConnectionId, tx: mpsc::Sender<Inbound>) -> Self {
        Self { conn_id, tx }
    }

    /// Connection this sink forwards for.
    pub fn connection_id(&self) -> &ConnectionId {
        &self.conn_id
    }

    /// Submit an action, waiting for queue space.
    pub async fn submit(&self, action: Action) -> Result<(), ConnectionError> {
        self.tx
            .send(Inbound::Action {
                conn_id: self.conn_id.clone(),
                action,
            })
            .await
            .map_err(|_| ConnectionError::SessionClosed)
    }
}

/// A [`UserConnection`] backed by a bounded channel of JSON text frames.
///
/// The transport (WebSocket, pipe, ...) owns the receiving half and writes
/// frames out; inbound frames are handed to [`ChannelConnection::receive_text`].
pub struct ChannelConnection {
    id: ConnectionId,
    /// Send channel to the transport's write task.
    tx: mpsc::Sender<Arc<String>>,
    sink: Mutex<Option<ActionSink>>,
    /// When this connection was established.
    pub connected_at: DateTime<Utc>,
    /// Count of frames dropped because the channel was full or closed.
    dropped_messages: AtomicU64,
}

impl ChannelConnection {
    /// Create a connection writing frames to `tx`.
    pub fn new(id: impl Into<ConnectionId>, tx: mpsc::Sender<Arc<String>>) -> Self {
        Self {
            id: id.into(),
            tx,
            sink: Mutex::new(None),
            connected_at: Utc::now(),
            dropped_messages: AtomicU64::new(0),
        }
    }

    /// Create a connection and the receiver for its outbound frames.
    pub fn channel(
        id: impl Into<ConnectionId>,
        buffer: usize,
    ) -> (Arc<Self>, mpsc::Receiver<Arc<String>>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Arc::new(Self::new(id, tx)), rx)
    }

    /// Create a connection whose outbound buffer is
    /// `settings.connection_buffer` frames.
    pub fn from_settings(
        id: impl Into<ConnectionId>,
        settings: &SessionSettings,
    ) -> (Arc<Self>, mpsc::Receiver<Arc<String>>) {
        Self::channel(id, settings.connection_buffer.max(1))
    }

    /// Send a text frame.
    ///
    /// Returns `false` if the channel is full or closed, and increments
    /// the dropped message counter.
    pub fn send(&self, frame: Arc<String>) -> bool {
        if self.tx.try_send(frame).is_ok() {
            true
        } else {
            let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Total frames dropped for this connection.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Whether a session has attached this connection.
    pub fn is_attached(&self) -> bool {
        self.sink.lock().is_some()
    }

    /// Decode an inbound JSON frame and forward it to the session.
    ///
    /// Unknown action kinds are logged and ignored.
    pub async fn receive_text(&self, text: &str) -> Result<(), ConnectionError> {
        let action = match Action::from_json(text) {
            Ok(action) => action,
            Err(ProtocolError::UnknownAction(kind)) => {
                warn!(conn_id = %self.id, kind = %kind, "no handler for action message type");
                return Ok(());
            }
            Err(e) => {
                warn!(conn_id = %self.id, error = %e, "failed to decode action");
                return Err(e.into());
            }
        };

        let sink = self.sink.lock().clone();
        let Some(sink) = sink else {
            return Err(ConnectionError::NotAttached(self.id.clone()));
        };
        debug!(conn_id = %self.id, action = action.kind(), "action received");
        sink.submit(action).await
    }
}

impl UserConnection for ChannelConnection {
    fn id(&self) -> &ConnectionId {
        &self.id
    }

    fn on_action(&self, sink: ActionSink) {
        *self.sink.lock() = Some(sink);
    }

    fn on_detach(&self) {
        if self.sink.lock().take().is_some() {
            debug!(conn_id = %self.id, "action sink released");
        }
    }

    fn send_update(&self, update: &Update) -> Result<(), ConnectionError> {
        let json = serde_json::to_string(update)?;
        if self.send(Arc::new(json)) {
            Ok(())
        } else if self.tx.is_closed() {
            Err(ConnectionError::Closed(self.id.clone()))
        } else {
            Err(ConnectionError::Full(self.id.clone()))
        }
    }
}

impl std::fmt::Debug for ChannelConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelConnection")
            .field("id", &self.id)
            .field("connected_at", &self.connected_at)
            .field("dropped_messages", &self.drop_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use cellbridge_core::logging::capture_logs;
    use cellbridge_core::notebook::CellRef;
    use cellbridge_core::updates::KernelState;
    use tracing::Level;

    fn status() -> Update {
        Update::SessionStatus {
            kernel_state: KernelState::Idle,
        }
    }

    fn attach(conn: &ChannelConnection) -> mpsc::Receiver<Inbound> {
        let (tx, rx) = mpsc::channel(8);
        conn.on_action(ActionSink::new(conn.id().clone(), tx));
        rx
    }

    #[tokio::test]
    async fn send_update_writes_json_frame() {
        let (conn, mut rx) = ChannelConnection::channel("u1", 4);
        conn.send_update(&status()).unwrap();
        let frame = rx.recv().await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["update"], "notebook.sessionStatus");
        assert_eq!(value["kernelState"], "idle");
    }

    #[tokio::test]
    async fn send_to_closed_channel_fails() {
        let (conn, rx) = ChannelConnection::channel("u1", 4);
        drop(rx);
        assert_matches!(conn.send_update(&status()), Err(ConnectionError::Closed(_)));
        assert_eq!(conn.drop_count(), 1);
    }

    #[tokio::test]
    async fn from_settings_uses_connection_buffer() {
        let settings = SessionSettings {
            connection_buffer: 2,
            ..SessionSettings::default()
        };
        let (conn, _rx) = ChannelConnection::from_settings("u1", &settings);
        conn.send_update(&status()).unwrap();
        conn.send_update(&status()).unwrap();
        assert_matches!(conn.send_update(&status()), Err(ConnectionError::Full(_)));
    }

    #[tokio::test]
    async fn send_to_full_channel_fails() {
        let (conn, _rx) = ChannelConnection::channel("u1", 1);
        conn.send_update(&status()).unwrap();
        assert_matches!(conn.send_update(&status()), Err(ConnectionError::Full(_)));
        assert_eq!(conn.drop_count(), 1);
    }

    #[tokio::test]
    async fn receive_text_forwards_action() {
        let (conn, _rx) = ChannelConnection::channel("u1", 4);
        let mut inbound = attach(&conn);
        assert!(conn.is_attached());

        conn.receive_text(r#"{"action":"cell.execute","worksheetId":"w1","cellId":"c1"}"#)
            .await
            .unwrap();

        let Some(Inbound::Action { conn_id, action }) = inbound.recv().await else {
            panic!("expected an action");
        };
        assert_eq!(conn_id.as_str(), "u1");
        assert_eq!(action, Action::ExecuteCell(CellRef::new("w1", "c1")));
    }

    #[tokio::test]
    async fn receive_text_ignores_unknown_kind() {
        let (logs, _guard) = capture_logs();
        let (conn, _rx) = ChannelConnection::channel("u1", 4);
        let mut inbound = attach(&conn);

        conn.receive_text(r#"{"action":"cell.explode"}"#).await.unwrap();

        assert!(inbound.try_recv().is_err());
        assert!(logs.has_event(Level::WARN, "no handler for action message type"));
        let event = logs
            .events()
            .into_iter()
            .find(|e| e.message.contains("no handler"))
            .unwrap();
        assert_eq!(event.field("kind"), Some("cell.explode"));
    }

    #[tokio::test]
    async fn receive_text_rejects_malformed_frame() {
        let (conn, _rx) = ChannelConnection::channel("u1", 4);
        let _inbound = attach(&conn);
        assert_matches!(
            conn.receive_text("{not json").await,
            Err(ConnectionError::Protocol(ProtocolError::Json(_)))
        );
    }

    #[tokio::test]
    async fn receive_text_before_attach() {
        let (conn, _rx) = ChannelConnection::channel("u1", 4);
        assert_matches!(
            conn.receive_text(r#"{"action":"notebook.executeCells"}"#).await,
            Err(ConnectionError::NotAttached(_))
        );
    }

    #[tokio::test]
    async fn receive_text_after_detach() {
        let (conn, _rx) = ChannelConnection::channel("u1", 4);
        let mut inbound = attach(&conn);
        conn.on_detach();

        assert!(!conn.is_attached());
        assert_matches!(
            conn.receive_text(r#"{"action":"notebook.clearOutputs"}"#).await,
            Err(ConnectionError::NotAttached(_))
        );
        assert!(inbound.try_recv().is_err());
    }

    #[tokio::test]
    async fn receive_text_after_session_exit() {
        let (conn, _rx) = ChannelConnection::channel("u1", 4);
        drop(attach(&conn));
        assert_matches!(
            conn.receive_text(r#"{"action":"notebook.executeCells"}"#).await,
            Err(ConnectionError::SessionClosed)
        );
    }
}
