//! Redis connection settings loaded from environment variables.

use std::time::Duration;

/// Default expiry of cached orders.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Redis cache configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `REDIS_URL`: connection URL (default: `"redis://127.0.0.1:6379/0"`)
/// - `CACHE_TTL_SECS`: expiry of cached entries (default: `300`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisConfig {
    pub url: String,
    pub ttl: Duration,
}

impl RedisConfig {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            url: lookup("REDIS_URL").unwrap_or(defaults.url),
            ttl: lookup("CACHE_TTL_SECS")
                .and_then(|s| s.trim().parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.ttl),
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379/0".to_string(),
            ttl: DEFAULT_TTL,
        }
    }
}
