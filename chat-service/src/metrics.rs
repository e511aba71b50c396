//! Prometheus metrics for the chat gateway, scraped at `/metrics`.

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

/// Global Prometheus handle
static METRICS_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

pub const CONNECTIONS_TOTAL: &str = "chat_connections_total";
pub const CONNECTIONS_ACTIVE: &str = "chat_connections_active";
pub const EVENTS_TOTAL: &str = "chat_events_total";
pub const MESSAGES_PERSISTED: &str = "chat_messages_persisted_total";
pub const AUTH_ATTEMPTS: &str = "chat_auth_attempts_total";
pub const AUTH_FAILURES: &str = "chat_auth_failures_total";
pub const RATE_LIMIT_HITS: &str = "chat_rate_limit_hits_total";
pub const CHANNELS_ACTIVE: &str = "chat_room_channels_active";
pub const ROOMS_CREATED: &str = "chat_rooms_created_total";

/// Install the Prometheus recorder. Call once at startup, before any
/// recording helper.
pub fn init_metrics() -> anyhow::Result<()> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    METRICS_HANDLE
        .set(handle)
        .map_err(|_| anyhow::anyhow!("metrics already initialized"))?;

    describe_counter!(CONNECTIONS_TOTAL, "Total number of WebSocket connections");
    describe_gauge!(CONNECTIONS_ACTIVE, "Number of currently active connections");
    describe_counter!(EVENTS_TOTAL, "Socket events processed, by kind");
    describe_counter!(MESSAGES_PERSISTED, "Messages durably stored");
    describe_counter!(AUTH_ATTEMPTS, "Total authentication attempts");
    describe_counter!(AUTH_FAILURES, "Failed authentication attempts");
    describe_counter!(RATE_LIMIT_HITS, "Rate limit violations");
    describe_gauge!(CHANNELS_ACTIVE, "Room channels with live subscribers");
    describe_counter!(ROOMS_CREATED, "Rooms created through the REST flow");

    tracing::info!("Metrics system initialized");
    Ok(())
}

/// Handler for /metrics endpoint
pub async fn metrics_handler() -> String {
    METRICS_HANDLE
        .get()
        .map(PrometheusHandle::render)
        .unwrap_or_default()
}

pub fn record_connection() {
    counter!(CONNECTIONS_TOTAL).increment(1);
    gauge!(CONNECTIONS_ACTIVE).increment(1.0);
}

pub fn record_disconnection() {
    gauge!(CONNECTIONS_ACTIVE).decrement(1.0);
}

pub fn record_event(kind: &'static str) {
    counter!(EVENTS_TOTAL, "kind" => kind).increment(1);
}

pub fn record_message_persisted() {
    counter!(MESSAGES_PERSISTED).increment(1);
}

pub fn record_auth_attempt() {
    counter!(AUTH_ATTEMPTS).increment(1);
}

pub fn record_auth_success() {
    counter!(AUTH_ATTEMPTS, "result" => "success").increment(1);
}

pub fn record_auth_failure(reason: &'static str) {
    counter!(AUTH_FAILURES, "reason" => reason).increment(1);
}

pub fn record_rate_limit_hit(limit_type: &'static str) {
    counter!(RATE_LIMIT_HITS, "type" => limit_type).increment(1);
}

pub fn set_active_channels(count: usize) {
    gauge!(CHANNELS_ACTIVE).set(count as f64);
}

pub fn record_room_created() {
    counter!(ROOMS_CREATED).increment(1);
}
