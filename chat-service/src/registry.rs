//! In-memory registry of authenticated connections.
//!
//! Two mappings kept in lockstep: `user_id -> handle` for targeted delivery
//! (latest connection wins) and `connection_id -> user_id` for cleanup on
//! disconnect. Owned by the handshake and the disconnect teardown; read by
//! the fan-out path and the room-lifecycle bridge. Every mutation is a
//! single synchronous map call, so no handler can observe a half-applied
//! update across an await point.

use dashmap::DashMap;
use tokio::sync::mpsc;

use crate::connection::ConnectionId;

/// Sending side of one connection's outbound queue.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    pub connection_id: ConnectionId,
    sender: mpsc::UnboundedSender<String>,
}

impl ConnectionHandle {
    pub fn new(connection_id: ConnectionId, sender: mpsc::UnboundedSender<String>) -> Self {
        Self {
            connection_id,
            sender,
        }
    }

    /// Queue a frame for this connection. `false` when the socket task has
    /// already gone away.
    pub fn send(&self, frame: &str) -> bool {
        self.sender.send(frame.to_string()).is_ok()
    }
}

#[derive(Default)]
pub struct ConnectionRegistry {
    by_user: DashMap<i64, ConnectionHandle>,
    by_connection: DashMap<ConnectionId, i64>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `handle` as the user's active connection, superseding any
    /// previous one. The superseded handle's reverse entry is dropped so a
    /// stale connection leaves no trace; its socket keeps draining until the
    /// transport closes but is no longer reachable here.
    pub fn register(&self, user_id: i64, handle: ConnectionHandle) {
        let connection_id = handle.connection_id.clone();
        if let Some(previous) = self.by_user.insert(user_id, handle) {
            self.by_connection.remove(&previous.connection_id);
            tracing::debug!(
                user_id,
                superseded = %previous.connection_id,
                "Reconnect superseded a live connection"
            );
        }
        self.by_connection.insert(connection_id, user_id);
    }

    /// Remove the connection from both directions. Idempotent, and a no-op
    /// for the forward direction when the user has already reconnected (the
    /// forward entry then belongs to the newer connection).
    pub fn unregister(&self, connection_id: &str) {
        if let Some((_, user_id)) = self.by_connection.remove(connection_id) {
            self.by_user
                .remove_if(&user_id, |_, handle| handle.connection_id == connection_id);
        }
    }

    pub fn lookup(&self, user_id: i64) -> Option<ConnectionHandle> {
        self.by_user.get(&user_id).map(|entry| entry.value().clone())
    }

    pub fn is_online(&self, user_id: i64) -> bool {
        self.by_user.contains_key(&user_id)
    }

    pub fn online_user_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.by_user.iter().map(|entry| *entry.key()).collect();
        ids.sort_unstable();
        ids
    }

    /// Best-effort targeted delivery; `false` when the user is offline or
    /// their socket task is gone.
    pub fn send_to(&self, user_id: i64, frame: &str) -> bool {
        self.by_user
            .get(&user_id)
            .is_some_and(|handle| handle.send(frame))
    }

    pub fn len(&self) -> usize {
        self.by_user.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_user.is_empty()
    }

    /// Drop all state. Called on process shutdown; also keeps tests hermetic
    /// when a registry outlives a scenario.
    pub fn shutdown(&self) {
        self.by_user.clear();
        self.by_connection.clear();
    }
}
