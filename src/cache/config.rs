//! Cache configuration.
//!
//! Controls the resolution and content tiers via `varco.toml`.

use std::time::Duration;

// Default values for cache configuration
const DEFAULT_RESOLUTION_TTL_MS: u64 = 3_000;
const DEFAULT_CONTENT_TTL_SECS: u64 = 5 * 60;
const DEFAULT_MAX_CONTENT_BYTES: u64 = 50 * 1024 * 1024;

/// Cache configuration from `varco.toml`.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// How long a resolved pointer (or confirmed absence) may be served
    /// before the pointer store is consulted again.
    pub resolution_ttl: Duration,
    /// How long a cached payload may be served before it is re-fetched.
    pub content_ttl: Duration,
    /// Byte budget for the content cache. Payloads above this size are
    /// served uncached.
    pub max_content_bytes: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            resolution_ttl: Duration::from_millis(DEFAULT_RESOLUTION_TTL_MS),
            content_ttl: Duration::from_secs(DEFAULT_CONTENT_TTL_SECS),
            max_content_bytes: DEFAULT_MAX_CONTENT_BYTES,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            resolution_ttl: settings.resolution_ttl,
            content_ttl: settings.content_ttl,
            max_content_bytes: settings.max_content_bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = CacheConfig::default();
        assert_eq!(config.resolution_ttl, Duration::from_secs(3));
        assert_eq!(config.content_ttl, Duration::from_secs(300));
        assert_eq!(config.max_content_bytes, 50 * 1024 * 1024);
    }
}
