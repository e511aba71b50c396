//! Shared application state.
//!
//! Built once at startup and handed to every handler; nothing here is a
//! global. The registry and room channels are the only shared mutable
//! structures in the process.

use std::sync::Arc;

use jwt_common::TokenService;
use storage::ChatStore;

use crate::fanout::RoomChannels;
use crate::rate_limiter::RateLimiter;
use crate::registry::ConnectionRegistry;

pub struct AppState {
    /// user ↔ connection mapping, written by handshake/teardown only.
    pub registry: ConnectionRegistry,
    /// Per-room broadcast channels.
    pub channels: RoomChannels,
    /// System of record for rooms, memberships and messages.
    pub store: Arc<dyn ChatStore>,
    /// Verifies bearer credentials on both the socket gate and REST.
    pub tokens: TokenService,
    pub rate_limiter: RateLimiter,
    /// Allowed origins for WebSocket upgrades (CSRF protection).
    pub allowed_origins: Vec<String>,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn ChatStore>,
        tokens: TokenService,
        rate_limiter: RateLimiter,
        allowed_origins: Vec<String>,
    ) -> Self {
        Self {
            registry: ConnectionRegistry::new(),
            channels: RoomChannels::new(),
            store,
            tokens,
            rate_limiter,
            allowed_origins,
            started_at: chrono::Utc::now(),
        }
    }

    /// Checks if an origin is allowed for WebSocket connections. An empty
    /// allow-list permits everything (development mode).
    pub fn is_origin_allowed(&self, origin: &str) -> bool {
        if self.allowed_origins.is_empty() {
            return true;
        }
        self.allowed_origins.iter().any(|o| o == origin)
    }

    pub fn uptime_secs(&self) -> i64 {
        (chrono::Utc::now() - self.started_at).num_seconds()
    }

    /// Clear connection state on process shutdown.
    pub fn shutdown(&self) {
        self.registry.shutdown();
        tracing::info!("Connection registry cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limiter::RateLimitConfig;
    use storage::memory::MemoryStore;

    fn state_with_origins(origins: Vec<String>) -> AppState {
        AppState::new(
            Arc::new(MemoryStore::new()),
            TokenService::new("test-secret"),
            RateLimiter::with_config(RateLimitConfig::default()),
            origins,
        )
    }

    #[test]
    fn test_origin_check() {
        let state = state_with_origins(vec!["https://example.com".to_string()]);

        assert!(state.is_origin_allowed("https://example.com"));
        assert!(!state.is_origin_allowed("https://evil.com"));
    }

    #[test]
    fn test_empty_origins_allows_all() {
        let state = state_with_origins(vec![]);
        assert!(state.is_origin_allowed("https://any-origin.com"));
    }
}
