//! Configuration Module
//!
//! Handles loading and managing cache layer configuration from environment variables.

use std::env;
use std::time::Duration;

/// Cache layer configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Namespace prepended to every derived cache key
    pub prefix: String,
    /// TTL in seconds applied to every entry written by the layer
    pub ttl_secs: u64,
    /// Deadline in milliseconds for each cache-store and backend call, None = unbounded
    pub op_timeout_ms: Option<u64>,
}

impl CacheConfig {
    /// Creates a new CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_PREFIX` - Key prefix (default: "cache")
    /// - `CACHE_TTL` - TTL in seconds (default: 300)
    /// - `CACHE_OP_TIMEOUT_MS` - Per-call deadline in milliseconds (default: none)
    pub fn from_env() -> Self {
        Self {
            prefix: env::var("CACHE_PREFIX")
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| "cache".to_string()),
            ttl_secs: env::var("CACHE_TTL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(300),
            op_timeout_ms: env::var("CACHE_OP_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok()),
        }
    }

    /// Set the key prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Set the entry TTL in seconds.
    pub fn with_ttl(mut self, ttl_secs: u64) -> Self {
        self.ttl_secs = ttl_secs;
        self
    }

    /// Set the per-call deadline in milliseconds.
    pub fn with_timeout(mut self, op_timeout_ms: u64) -> Self {
        self.op_timeout_ms = Some(op_timeout_ms);
        self
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn op_timeout(&self) -> Option<Duration> {
        self.op_timeout_ms.map(Duration::from_millis)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            prefix: "cache".to_string(),
            ttl_secs: 300,
            op_timeout_ms: None,
        }
    }
}
