//! Connection identity and the authenticated session context.

use std::sync::atomic::{AtomicU64, Ordering};

/// Unique connection identifier
pub type ConnectionId = String;

/// Authenticated session state attached to a connection by the handshake.
/// Immutable for the connection's lifetime; every handler reads identity
/// from here instead of re-deriving it from the request.
#[derive(Debug, Clone)]
pub struct ChatSession {
    pub connection_id: ConnectionId,
    pub user_id: i64,
    pub username: String,
}

/// Global connection counter for generating unique IDs
static CONNECTION_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a unique connection ID
pub fn generate_connection_id() -> ConnectionId {
    let counter = CONNECTION_COUNTER.fetch_add(1, Ordering::SeqCst);
    let timestamp = chrono::Utc::now().timestamp_millis();
    format!("conn_{timestamp:x}_{counter:x}")
}
