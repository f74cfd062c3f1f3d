//! Update fan-out to a session's connections.

use std::sync::Arc;

use cellbridge_core::ConnectionId;
use cellbridge_core::updates::Update;
use tracing::{debug, warn};

use crate::connection::UserConnection;

/// The connections attached to one session, in attach order.
///
/// The same connection id may appear more than once if it was attached
/// twice; each entry receives its own copy of every update.
#[derive(Default)]
pub struct ConnectionSet {
    connections: Vec<Arc<dyn UserConnection>>,
}

impl ConnectionSet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a connection.
    pub fn add(&mut self, connection: Arc<dyn UserConnection>) {
        debug!(conn_id = %connection.id(), "connection added");
        self.connections.push(connection);
    }

    /// Remove every entry with this id. Returns whether any was removed.
    pub fn remove(&mut self, connection_id: &ConnectionId) -> bool {
        let before = self.connections.len();
        self.connections.retain(|c| {
            let keep = c.id() != connection_id;
            if !keep {
                c.on_detach();
            }
            keep
        });
        let removed = before - self.connections.len();
        if removed > 0 {
            debug!(conn_id = %connection_id, removed, "connection removed");
        }
        removed > 0
    }

    /// Send `update` to every connection in attach order.
    ///
    /// A failing connection does not stop delivery to the rest; it is
    /// removed and detached once the loop finishes. Returns the ids of
    /// removed connections.
    pub fn broadcast(&mut self, update: &Update) -> Vec<ConnectionId> {
        debug!(
            update = update.kind(),
            recipients = self.connections.len(),
            "broadcast update"
        );
        let mut failed = Vec::new();
        for (index, conn) in self.connections.iter().enumerate() {
            if let Err(e) = conn.send_update(update) {
                warn!(conn_id = %conn.id(), error = %e, "failed to send update, dropping connection");
                failed.push(index);
            }
        }
        if failed.is_empty() {
            return Vec::new();
        }

        let mut removed = Vec::with_capacity(failed.len());
        let mut index = 0;
        self.connections.retain(|conn| {
            let keep = !failed.contains(&index);
            if !keep {
                conn.on_detach();
                removed.push(conn.id().clone());
            }
            index += 1;
            keep
        });
        removed
    }

    /// Send `update` to a single connection. Failure removes it.
    pub fn send_to(&mut self, connection: &Arc<dyn UserConnection>, update: &Update) -> bool {
        match connection.send_update(update) {
            Ok(()) => true,
            Err(e) => {
                warn!(conn_id = %connection.id(), error = %e, "failed to send update, dropping connection");
                self.connections.retain(|c| !Arc::ptr_eq(c, connection));
                connection.on_detach();
                false
            }
        }
    }

    /// Ids of attached connections, in attach order.
    #[must_use]
    pub fn ids(&self) -> Vec<ConnectionId> {
        self.connections.iter().map(|c| c.id().clone()).collect()
    }

    /// Number of attached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Whether no connection is attached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

impl std::fmt::Debug for ConnectionSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionSet")
            .field("ids", &self.ids())
            .finish()
    }
}
