//! Client configuration
//!
//! Holds every tunable used by the Jikan client: upstream location, cache
//! lifetime, and the pacing applied to outbound requests.

use std::time::Duration;

/// Root of the Jikan v4 REST API
pub const JIKAN_BASE_URL: &str = "https://api.jikan.moe/v4";

/// Configuration for the Jikan client and its request cache
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Upstream API root, without a trailing slash
    pub base_url: String,
    /// How long a cached response is served
    pub cache_ttl: Duration,
    /// Delay before every outbound request
    pub throttle: Duration,
    /// Wait between a 429 response and the next attempt
    pub rate_limit_backoff: Duration,
    /// Total attempts per request while rate limited (at least 1)
    pub max_attempts: u32,
    /// Per-request timeout; expiry surfaces as a network error
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: JIKAN_BASE_URL.to_string(),
            cache_ttl: Duration::from_secs(300),           // 5 minutes
            throttle: Duration::from_millis(100),
            rate_limit_backoff: Duration::from_millis(1000),
            max_attempts: 3,
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl ClientConfig {
    /// Returns a copy pointed at a different API root
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}
