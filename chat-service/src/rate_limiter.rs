//! Rate limiting for socket connections and messages.
//!
//! Per-IP and per-user quotas gate the handshake; a per-connection quota
//! gates message events. All three share one keyed-limiter shape over the
//! governor crate.

use std::hash::Hash;
use std::net::IpAddr;
use std::num::NonZeroU32;
use std::sync::Arc;

use dashmap::DashMap;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as GovRateLimiter};

use crate::connection::ConnectionId;
use crate::metrics;

/// Maximum connections per IP per minute
const IP_CONNECTIONS_PER_MINUTE: u32 = 60;

/// Maximum connections per user per minute
const USER_CONNECTIONS_PER_MINUTE: u32 = 30;

/// Maximum messages per connection per second
const MESSAGES_PER_SECOND: u32 = 50;

/// Burst allowance multiplier
const BURST_MULTIPLIER: u32 = 2;

type DirectLimiter = GovRateLimiter<NotKeyed, InMemoryState, DefaultClock>;

fn nonzero(value: u32) -> NonZeroU32 {
    NonZeroU32::new(value.max(1)).unwrap_or(NonZeroU32::MIN)
}

/// One quota applied independently per key.
struct KeyedQuota<K: Eq + Hash> {
    limiters: DashMap<K, Arc<DirectLimiter>>,
    quota: Quota,
}

impl<K: Eq + Hash> KeyedQuota<K> {
    fn new(quota: Quota) -> Self {
        Self {
            limiters: DashMap::new(),
            quota,
        }
    }

    fn check(&self, key: K) -> bool {
        let limiter = self
            .limiters
            .entry(key)
            .or_insert_with(|| Arc::new(GovRateLimiter::direct(self.quota)))
            .clone();
        limiter.check().is_ok()
    }

    fn remove(&self, key: &K) {
        self.limiters.remove(key);
    }
}

/// Rate limit configuration
#[derive(Clone, Debug)]
pub struct RateLimitConfig {
    pub ip_connections_per_minute: u32,
    pub user_connections_per_minute: u32,
    pub messages_per_second: u32,
    pub burst_multiplier: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            ip_connections_per_minute: IP_CONNECTIONS_PER_MINUTE,
            user_connections_per_minute: USER_CONNECTIONS_PER_MINUTE,
            messages_per_second: MESSAGES_PER_SECOND,
            burst_multiplier: BURST_MULTIPLIER,
        }
    }
}

fn env_override(name: &str, fallback: u32) -> u32 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(fallback)
}

pub struct RateLimiter {
    ip: KeyedQuota<IpAddr>,
    user: KeyedQuota<i64>,
    message: KeyedQuota<ConnectionId>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::with_config(RateLimitConfig::default())
    }

    pub fn from_env() -> Self {
        Self::with_config(RateLimitConfig {
            ip_connections_per_minute: env_override(
                "RATE_LIMIT_IP_PER_MINUTE",
                IP_CONNECTIONS_PER_MINUTE,
            ),
            user_connections_per_minute: env_override(
                "RATE_LIMIT_USER_PER_MINUTE",
                USER_CONNECTIONS_PER_MINUTE,
            ),
            messages_per_second: env_override("RATE_LIMIT_MESSAGES_PER_SEC", MESSAGES_PER_SECOND),
            burst_multiplier: env_override("RATE_LIMIT_BURST_MULTIPLIER", BURST_MULTIPLIER),
        })
    }

    pub fn with_config(config: RateLimitConfig) -> Self {
        tracing::info!(
            ip_limit = config.ip_connections_per_minute,
            user_limit = config.user_connections_per_minute,
            msg_limit = config.messages_per_second,
            "Rate limiter initialized"
        );

        let per_minute = |limit: u32| {
            Quota::per_minute(nonzero(limit))
                .allow_burst(nonzero(limit.saturating_mul(config.burst_multiplier)))
        };
        let per_second = |limit: u32| {
            Quota::per_second(nonzero(limit))
                .allow_burst(nonzero(limit.saturating_mul(config.burst_multiplier)))
        };

        Self {
            ip: KeyedQuota::new(per_minute(config.ip_connections_per_minute)),
            user: KeyedQuota::new(per_minute(config.user_connections_per_minute)),
            message: KeyedQuota::new(per_second(config.messages_per_second)),
        }
    }

    /// Check if an IP address is allowed to open a new connection
    pub fn check_ip(&self, ip: IpAddr) -> bool {
        let allowed = self.ip.check(ip);
        if !allowed {
            tracing::warn!(ip = %ip, "IP rate limit exceeded");
            metrics::record_rate_limit_hit("ip");
        }
        allowed
    }

    /// Check if a user is allowed to open a new connection
    pub fn check_user(&self, user_id: i64) -> bool {
        let allowed = self.user.check(user_id);
        if !allowed {
            tracing::warn!(user_id, "User rate limit exceeded");
            metrics::record_rate_limit_hit("user");
        }
        allowed
    }

    /// Check if a connection is allowed to send another event
    pub fn check_message(&self, connection_id: &str) -> bool {
        let allowed = self.message.check(connection_id.to_string());
        if !allowed {
            tracing::warn!(connection_id, "Message rate limit exceeded");
            metrics::record_rate_limit_hit("message");
        }
        allowed
    }

    /// Drop the per-connection limiter of a disconnected connection
    pub fn remove_connection(&self, connection_id: &str) {
        self.message.remove(&connection_id.to_string());
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
