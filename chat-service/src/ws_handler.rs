//! WebSocket handler: handshake gate, event dispatch, fan-out plumbing.
//!
//! # Authentication Flow
//! 1. Rate-limit check for the client IP
//! 2. Origin check against the allow-list (CSRF protection)
//! 3. Bearer token from `Authorization` or `Sec-WebSocket-Protocol`
//! 4. Token validation; reject with HTTP 403 before the upgrade, so no
//!    event handler ever runs for an unauthenticated connection
//! 5. Rate-limit check for the user, then upgrade
//!
//! After the upgrade the connection is registered (superseding any previous
//! one for the same user) and bulk-subscribed to every room the user is a
//! member of. Events are handled inline in the receive loop, which is what
//! keeps per-sender ordering.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use chat_proto::{ClientEvent, SendMessagePayload, ServerEvent, TypingPayload};

use crate::connection::{generate_connection_id, ChatSession};
use crate::error::ChatError;
use crate::metrics;
use crate::registry::ConnectionHandle;
use crate::state::AppState;

/// Longest accepted message body, in characters, after trimming.
const MAX_MESSAGE_CHARS: usize = 1000;

/// Per-room forwarding tasks owned by one connection. Keyed by room id, so
/// a duplicate `join-room` is a lookup, not a second subscription.
type Subscriptions = HashMap<i64, JoinHandle<()>>;

/// WebSocket upgrade handler for GET /ws.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> Response {
    let ip = addr.ip();
    metrics::record_auth_attempt();

    if !state.rate_limiter.check_ip(ip) {
        metrics::record_auth_failure("rate_limit_ip");
        return (StatusCode::TOO_MANY_REQUESTS, "Rate limit exceeded").into_response();
    }

    // Missing Origin is allowed for non-browser clients.
    if let Some(origin) = headers.get(header::ORIGIN).and_then(|v| v.to_str().ok()) {
        if !state.is_origin_allowed(origin) {
            warn!(origin, ip = %ip, "WebSocket rejected: disallowed origin");
            metrics::record_auth_failure("origin_not_allowed");
            return (StatusCode::FORBIDDEN, "Origin not allowed").into_response();
        }
    }

    let Some(token) = bearer_token(&headers) else {
        warn!(ip = %ip, "WebSocket rejected: missing bearer token");
        metrics::record_auth_failure("missing_token");
        return (StatusCode::FORBIDDEN, "Missing authentication token").into_response();
    };

    let claims = match state.tokens.validate(&token) {
        Ok(claims) => claims,
        Err(e) => {
            warn!(ip = %ip, error = %e, "WebSocket rejected: invalid token");
            metrics::record_auth_failure("invalid_token");
            return (StatusCode::FORBIDDEN, "Invalid or expired token").into_response();
        }
    };
    let user_id = match claims.user_id() {
        Ok(user_id) => user_id,
        Err(e) => {
            warn!(ip = %ip, error = %e, "WebSocket rejected: malformed subject");
            metrics::record_auth_failure("malformed_subject");
            return (StatusCode::FORBIDDEN, "Invalid or expired token").into_response();
        }
    };

    if !state.rate_limiter.check_user(user_id) {
        metrics::record_auth_failure("rate_limit_user");
        return (StatusCode::TOO_MANY_REQUESTS, "Rate limit exceeded for user").into_response();
    }

    let session = ChatSession {
        connection_id: generate_connection_id(),
        user_id,
        username: claims.username,
    };

    info!(
        user_id,
        username = %session.username,
        ip = %ip,
        connection_id = %session.connection_id,
        "WebSocket connection authenticated"
    );
    metrics::record_auth_success();

    ws.protocols(["bearer"])
        .on_upgrade(move |socket| handle_socket(socket, state, session))
}

/// Extracts the bearer token from the upgrade request.
///
/// Accepted forms, in order:
/// 1. `Authorization: Bearer <token>`
/// 2. `Sec-WebSocket-Protocol: bearer, <token>` — the header browser
///    WebSocket clients can actually set
/// 3. `Sec-WebSocket-Protocol: <token>` — direct token from non-browser
///    clients
fn bearer_token(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
    {
        let mut parts = value.splitn(2, ' ');
        if let (Some(scheme), Some(token)) = (parts.next(), parts.next()) {
            if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() {
                return Some(token.trim().to_string());
            }
        }
    }

    let protocol = headers
        .get(header::SEC_WEBSOCKET_PROTOCOL)
        .and_then(|v| v.to_str().ok())?;
    let parts: Vec<&str> = protocol.split(',').map(str::trim).collect();
    match parts.as_slice() {
        [scheme, token, ..] if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() => {
            Some((*token).to_string())
        }
        [token] if !token.eq_ignore_ascii_case("bearer") && !token.is_empty() => {
            Some((*token).to_string())
        }
        _ => None,
    }
}

/// Drives one authenticated connection until it closes.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>, session: ChatSession) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    state.registry.register(
        session.user_id,
        ConnectionHandle::new(session.connection_id.clone(), tx.clone()),
    );
    metrics::record_connection();
    let connected_at = chrono::Utc::now();

    // Outbound pump: everything addressed to this connection goes through
    // the mpsc queue and out the socket here.
    let frames_delivered = Arc::new(AtomicU64::new(0));
    let delivered = frames_delivered.clone();
    let pump_conn_id = session.connection_id.clone();
    let pump = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if ws_sender.send(Message::Text(frame.into())).await.is_err() {
                debug!(connection_id = %pump_conn_id, "Outbound socket closed");
                break;
            }
            delivered.fetch_add(1, Ordering::Relaxed);
        }
    });

    // Bulk-subscribe to every room the user belongs to.
    let mut subscriptions = Subscriptions::new();
    match state.store.rooms_for_user(session.user_id).await {
        Ok(room_ids) => {
            for room_id in room_ids {
                join_room(&state, &session, &tx, &mut subscriptions, room_id);
            }
            debug!(
                user_id = session.user_id,
                rooms = subscriptions.len(),
                "Bulk-joined room channels"
            );
        }
        Err(e) => {
            // The connection stays usable; explicit join-room still works.
            warn!(user_id = session.user_id, error = %e, "Bulk room join failed");
        }
    }
    metrics::set_active_channels(state.channels.len());

    let mut events_received: u64 = 0;
    while let Some(result) = ws_receiver.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !state.rate_limiter.check_message(&session.connection_id) {
                    continue;
                }
                events_received += 1;
                match serde_json::from_str::<ClientEvent>(&text) {
                    Ok(event) => {
                        handle_event(&state, &session, &tx, &mut subscriptions, event).await;
                    }
                    Err(e) => {
                        warn!(
                            connection_id = %session.connection_id,
                            error = %e,
                            "Ignoring unparseable frame"
                        );
                    }
                }
            }
            Ok(Message::Close(_)) => {
                info!(
                    user_id = session.user_id,
                    connection_id = %session.connection_id,
                    "Client sent close frame"
                );
                break;
            }
            Ok(_) => {} // ping/pong handled by the protocol layer
            Err(e) => {
                warn!(
                    connection_id = %session.connection_id,
                    error = %e,
                    "WebSocket receive error"
                );
                break;
            }
        }
    }

    // Teardown runs whatever ended the loop; no typing-stop or any other
    // synthetic event is emitted on behalf of the departed client.
    for (_, task) in subscriptions.drain() {
        task.abort();
    }
    pump.abort();
    state.registry.unregister(&session.connection_id);
    state.rate_limiter.remove_connection(&session.connection_id);
    state.channels.sweep_idle();
    metrics::record_disconnection();
    metrics::set_active_channels(state.channels.len());

    info!(
        user_id = session.user_id,
        connection_id = %session.connection_id,
        events_received,
        frames_delivered = frames_delivered.load(Ordering::Relaxed),
        duration_secs = (chrono::Utc::now() - connected_at).num_seconds(),
        "Client disconnected"
    );
}

/// Subscribe this connection to a room channel. Idempotent: a second join
/// for the same room keeps the existing subscription, so a single broadcast
/// is never delivered twice.
fn join_room(
    state: &Arc<AppState>,
    session: &ChatSession,
    tx: &mpsc::UnboundedSender<String>,
    subscriptions: &mut Subscriptions,
    room_id: i64,
) {
    if subscriptions.contains_key(&room_id) {
        return;
    }

    let mut channel = state.channels.subscribe(room_id);
    let tx = tx.clone();
    let connection_id = session.connection_id.clone();
    let task = tokio::spawn(async move {
        loop {
            match channel.recv().await {
                Ok(frame) => {
                    if frame.exclude.as_deref() == Some(connection_id.as_str()) {
                        continue;
                    }
                    if tx.send(frame.json.to_string()).is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(connection_id = %connection_id, room = room_id, skipped, "Subscriber lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
    subscriptions.insert(room_id, task);
}

/// Unsubscribe from a room channel. Leaving a channel that was never joined
/// is a no-op.
fn leave_room(state: &Arc<AppState>, subscriptions: &mut Subscriptions, room_id: i64) {
    if let Some(task) = subscriptions.remove(&room_id) {
        task.abort();
        state.channels.drop_if_idle(room_id);
    }
}

/// Dispatch one client event. Rejections become a single `error` frame to
/// this connection and nothing else.
async fn handle_event(
    state: &Arc<AppState>,
    session: &ChatSession,
    tx: &mpsc::UnboundedSender<String>,
    subscriptions: &mut Subscriptions,
    event: ClientEvent,
) {
    match event {
        ClientEvent::JoinRoom { room_id } => {
            metrics::record_event("join-room");
            join_room(state, session, tx, subscriptions, room_id);
        }
        ClientEvent::LeaveRoom { room_id } => {
            metrics::record_event("leave-room");
            leave_room(state, subscriptions, room_id);
        }
        ClientEvent::SendMessage(payload) => {
            metrics::record_event("send-message");
            if let Err(e) = process_send_message(state, session, payload).await {
                send_scoped_error(tx, &e);
            }
        }
        ClientEvent::TypingStart { room_id } => {
            metrics::record_event("typing-start");
            relay_typing(state, session, room_id, false);
        }
        ClientEvent::TypingStop { room_id } => {
            metrics::record_event("typing-stop");
            relay_typing(state, session, room_id, true);
        }
    }
}

/// The send-message pipeline: validate, authorize against the membership
/// store, persist (one transaction, room activity touched), then broadcast
/// the enriched row. The broadcast only happens after the store call
/// returned, so no client can see a message that was never stored.
async fn process_send_message(
    state: &Arc<AppState>,
    session: &ChatSession,
    payload: SendMessagePayload,
) -> Result<(), ChatError> {
    let body = payload.message.trim();
    if body.is_empty() || body.chars().count() > MAX_MESSAGE_CHARS {
        return Err(ChatError::InvalidMessage);
    }

    if !state
        .store
        .is_member(payload.room_id, session.user_id)
        .await?
    {
        warn!(
            user_id = session.user_id,
            room = payload.room_id,
            "Send rejected: not a room member"
        );
        return Err(ChatError::AccessDenied);
    }

    let message = state
        .store
        .insert_message(payload.room_id, session.user_id, body, payload.message_type)
        .await?;
    metrics::record_message_persisted();

    let reached = state
        .channels
        .publish(payload.room_id, &ServerEvent::NewMessage(message));
    debug!(
        user_id = session.user_id,
        room = payload.room_id,
        reached,
        "Message broadcast"
    );
    Ok(())
}

/// Relay a typing signal to the room, sender excluded. Identity comes from
/// the session, never the payload; nothing is persisted and no timer runs —
/// stop signals are entirely the client's job.
fn relay_typing(state: &Arc<AppState>, session: &ChatSession, room_id: i64, stopped: bool) {
    let payload = TypingPayload {
        user_id: session.user_id,
        username: session.username.clone(),
        room_id,
    };
    let event = if stopped {
        ServerEvent::UserStoppedTyping(payload)
    } else {
        ServerEvent::UserTyping(payload)
    };
    state
        .channels
        .publish_except(room_id, &session.connection_id, &event);
}

fn send_scoped_error(tx: &mpsc::UnboundedSender<String>, error: &ChatError) {
    let event = ServerEvent::error(error.to_string());
    match serde_json::to_string(&event) {
        Ok(frame) => {
            let _ = tx.send(frame);
        }
        Err(e) => warn!(error = %e, "Failed to serialize error event"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limiter::{RateLimitConfig, RateLimiter};
    use jwt_common::TokenService;
    use std::time::Duration;
    use storage::memory::MemoryStore;
    use tokio::time::{sleep, timeout};

    fn test_state(store: Arc<MemoryStore>) -> Arc<AppState> {
        Arc::new(AppState::new(
            store,
            TokenService::new("test-secret"),
            RateLimiter::with_config(RateLimitConfig::default()),
            vec![],
        ))
    }

    /// A connection as the dispatch layer sees it: registered handle, its
    /// outbound queue, and its channel subscriptions.
    struct TestConn {
        session: ChatSession,
        tx: mpsc::UnboundedSender<String>,
        rx: mpsc::UnboundedReceiver<String>,
        subscriptions: Subscriptions,
    }

    impl TestConn {
        fn connect(state: &Arc<AppState>, user_id: i64, username: &str) -> Self {
            let (tx, rx) = mpsc::unbounded_channel();
            let session = ChatSession {
                connection_id: generate_connection_id(),
                user_id,
                username: username.to_string(),
            };
            state.registry.register(
                user_id,
                ConnectionHandle::new(session.connection_id.clone(), tx.clone()),
            );
            Self {
                session,
                tx,
                rx,
                subscriptions: Subscriptions::new(),
            }
        }

        fn join(&mut self, state: &Arc<AppState>, room_id: i64) {
            join_room(
                state,
                &self.session,
                &self.tx,
                &mut self.subscriptions,
                room_id,
            );
        }

        async fn event(&mut self, state: &Arc<AppState>, event: ClientEvent) {
            handle_event(state, &self.session, &self.tx, &mut self.subscriptions, event).await;
        }

        async fn recv(&mut self) -> ServerEvent {
            let frame = timeout(Duration::from_secs(1), self.rx.recv())
                .await
                .expect("timed out waiting for a frame")
                .expect("connection queue closed");
            serde_json::from_str(&frame).expect("frame is not a server event")
        }

        /// Assert nothing arrives within a grace period.
        async fn assert_silent(&mut self) {
            sleep(Duration::from_millis(100)).await;
            assert!(
                self.rx.try_recv().is_err(),
                "expected no frames for this connection"
            );
        }

        fn disconnect(mut self, state: &Arc<AppState>) {
            for (_, task) in self.subscriptions.drain() {
                task.abort();
            }
            state.registry.unregister(&self.session.connection_id);
            state.channels.sweep_idle();
        }
    }

    fn send_message(room_id: i64, message: &str) -> ClientEvent {
        ClientEvent::SendMessage(SendMessagePayload {
            room_id,
            message: message.to_string(),
            message_type: chat_proto::MessageKind::Text,
        })
    }

    #[tokio::test]
    async fn member_send_is_persisted_then_broadcast() {
        let store = Arc::new(MemoryStore::new());
        store.add_user(1, "alice").await;
        store.add_user(2, "bob").await;
        let room = store.seed_room(None, false, 1, &[1, 2]).await;
        let state = test_state(store.clone());

        let mut alice = TestConn::connect(&state, 1, "alice");
        let mut bob = TestConn::connect(&state, 2, "bob");
        alice.join(&state, room);
        bob.join(&state, room);

        alice.event(&state, send_message(room, "hello")).await;

        // Persisted before anyone could observe the broadcast.
        let stored = store.messages_in(room).await;
        assert_eq!(stored.len(), 1);

        match bob.recv().await {
            ServerEvent::NewMessage(message) => {
                assert_eq!(message.message, "hello");
                assert_eq!(message.username, "alice");
                assert_eq!(message.id, stored[0].id);
            }
            other => panic!("unexpected event: {other:?}"),
        }
        // The sender's own connection receives it too.
        match alice.recv().await {
            ServerEvent::NewMessage(message) => assert_eq!(message.message, "hello"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_member_send_is_rejected_without_side_effects() {
        let store = Arc::new(MemoryStore::new());
        store.add_user(1, "alice").await;
        store.add_user(2, "bob").await;
        store.add_user(3, "carol").await;
        let room = store.seed_room(None, false, 1, &[1, 2]).await;
        let state = test_state(store.clone());

        let mut bob = TestConn::connect(&state, 2, "bob");
        bob.join(&state, room);
        let mut carol = TestConn::connect(&state, 3, "carol");

        carol.event(&state, send_message(room, "let me in")).await;

        match carol.recv().await {
            ServerEvent::Error(e) => assert_eq!(e.message, "Access denied"),
            other => panic!("unexpected event: {other:?}"),
        }
        carol.assert_silent().await;
        bob.assert_silent().await;
        assert!(store.messages_in(room).await.is_empty());
    }

    #[tokio::test]
    async fn non_member_connection_not_subscribed_receives_nothing() {
        let store = Arc::new(MemoryStore::new());
        store.add_user(1, "alice").await;
        store.add_user(2, "bob").await;
        store.add_user(3, "carol").await;
        let room = store.seed_room(None, false, 1, &[1, 2]).await;
        let state = test_state(store.clone());

        let mut alice = TestConn::connect(&state, 1, "alice");
        let mut bob = TestConn::connect(&state, 2, "bob");
        let mut carol = TestConn::connect(&state, 3, "carol");
        alice.join(&state, room);
        bob.join(&state, room);

        alice.event(&state, send_message(room, "hello")).await;

        assert!(matches!(bob.recv().await, ServerEvent::NewMessage(_)));
        carol.assert_silent().await;
    }

    #[tokio::test]
    async fn empty_and_oversized_messages_are_rejected() {
        let store = Arc::new(MemoryStore::new());
        store.add_user(1, "alice").await;
        let room = store.seed_room(None, false, 1, &[1]).await;
        let state = test_state(store.clone());

        let mut alice = TestConn::connect(&state, 1, "alice");
        alice.join(&state, room);

        alice.event(&state, send_message(room, "   ")).await;
        match alice.recv().await {
            ServerEvent::Error(e) => {
                assert_eq!(e.message, "Message must be 1-1000 characters");
            }
            other => panic!("unexpected event: {other:?}"),
        }

        let oversized = "x".repeat(MAX_MESSAGE_CHARS + 1);
        alice.event(&state, send_message(room, &oversized)).await;
        assert!(matches!(alice.recv().await, ServerEvent::Error(_)));
        assert!(store.messages_in(room).await.is_empty());
    }

    #[tokio::test]
    async fn persistence_failure_is_a_scoped_error() {
        let store = Arc::new(MemoryStore::new());
        store.add_user(1, "alice").await;
        store.add_user(2, "bob").await;
        let room = store.seed_room(None, false, 1, &[1, 2]).await;
        let state = test_state(store.clone());

        let mut alice = TestConn::connect(&state, 1, "alice");
        let mut bob = TestConn::connect(&state, 2, "bob");
        alice.join(&state, room);
        bob.join(&state, room);

        store.set_fail_writes(true);
        alice.event(&state, send_message(room, "hello")).await;

        match alice.recv().await {
            ServerEvent::Error(e) => assert_eq!(e.message, "Failed to send message"),
            other => panic!("unexpected event: {other:?}"),
        }
        bob.assert_silent().await;
        assert!(store.messages_in(room).await.is_empty());
    }

    #[tokio::test]
    async fn typing_relay_excludes_the_sender() {
        let store = Arc::new(MemoryStore::new());
        store.add_user(1, "alice").await;
        store.add_user(2, "bob").await;
        let room = store.seed_room(None, false, 1, &[1, 2]).await;
        let state = test_state(store);

        let mut alice = TestConn::connect(&state, 1, "alice");
        let mut bob = TestConn::connect(&state, 2, "bob");
        alice.join(&state, room);
        bob.join(&state, room);

        alice
            .event(&state, ClientEvent::TypingStart { room_id: room })
            .await;

        match bob.recv().await {
            ServerEvent::UserTyping(t) => {
                assert_eq!(t.user_id, 1);
                assert_eq!(t.username, "alice");
                assert_eq!(t.room_id, room);
            }
            other => panic!("unexpected event: {other:?}"),
        }
        alice.assert_silent().await;

        alice
            .event(&state, ClientEvent::TypingStop { room_id: room })
            .await;
        assert!(matches!(bob.recv().await, ServerEvent::UserStoppedTyping(_)));
    }

    #[tokio::test]
    async fn disconnect_emits_no_synthetic_typing_stop() {
        let store = Arc::new(MemoryStore::new());
        store.add_user(1, "alice").await;
        store.add_user(2, "bob").await;
        let room = store.seed_room(None, false, 1, &[1, 2]).await;
        let state = test_state(store);

        let mut alice = TestConn::connect(&state, 1, "alice");
        let mut bob = TestConn::connect(&state, 2, "bob");
        alice.join(&state, room);
        bob.join(&state, room);

        alice
            .event(&state, ClientEvent::TypingStart { room_id: room })
            .await;
        assert!(matches!(bob.recv().await, ServerEvent::UserTyping(_)));

        // Alice vanishes without a typing-stop; the server stays silent.
        alice.disconnect(&state);
        bob.assert_silent().await;
    }

    #[tokio::test]
    async fn duplicate_join_delivers_broadcasts_once() {
        let store = Arc::new(MemoryStore::new());
        store.add_user(1, "alice").await;
        store.add_user(2, "bob").await;
        let room = store.seed_room(None, false, 1, &[1, 2]).await;
        let state = test_state(store);

        let mut alice = TestConn::connect(&state, 1, "alice");
        let mut bob = TestConn::connect(&state, 2, "bob");
        alice.join(&state, room);
        bob.join(&state, room);
        bob.event(&state, ClientEvent::JoinRoom { room_id: room })
            .await;
        bob.event(&state, ClientEvent::JoinRoom { room_id: room })
            .await;

        alice.event(&state, send_message(room, "once")).await;

        assert!(matches!(bob.recv().await, ServerEvent::NewMessage(_)));
        bob.assert_silent().await;
    }

    #[tokio::test]
    async fn leave_room_stops_delivery_and_tolerates_unjoined_rooms() {
        let store = Arc::new(MemoryStore::new());
        store.add_user(1, "alice").await;
        store.add_user(2, "bob").await;
        let room = store.seed_room(None, false, 1, &[1, 2]).await;
        let state = test_state(store);

        let mut alice = TestConn::connect(&state, 1, "alice");
        let mut bob = TestConn::connect(&state, 2, "bob");
        alice.join(&state, room);
        bob.join(&state, room);

        bob.event(&state, ClientEvent::LeaveRoom { room_id: room })
            .await;
        // Leaving a room that was never joined is a no-op.
        bob.event(&state, ClientEvent::LeaveRoom { room_id: 999 })
            .await;

        alice.event(&state, send_message(room, "anyone?")).await;

        assert!(matches!(alice.recv().await, ServerEvent::NewMessage(_)));
        bob.assert_silent().await;
    }

    #[test]
    fn bearer_token_from_authorization_header() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Bearer abc.def.ghi".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("abc.def.ghi".to_string()));
    }

    #[test]
    fn bearer_token_from_protocol_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::SEC_WEBSOCKET_PROTOCOL,
            "bearer, abc.def.ghi".parse().unwrap(),
        );
        assert_eq!(bearer_token(&headers), Some("abc.def.ghi".to_string()));
    }

    #[test]
    fn bearer_token_direct_protocol_value() {
        let mut headers = HeaderMap::new();
        headers.insert(header::SEC_WEBSOCKET_PROTOCOL, "abc.def.ghi".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("abc.def.ghi".to_string()));
    }

    #[test]
    fn bearer_token_missing_or_malformed() {
        assert_eq!(bearer_token(&HeaderMap::new()), None);

        let mut headers = HeaderMap::new();
        headers.insert(header::SEC_WEBSOCKET_PROTOCOL, "bearer".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Basic xyz".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);
    }
}
