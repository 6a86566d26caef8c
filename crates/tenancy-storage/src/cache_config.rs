//! Directory cache configuration.
//!
//! Controls the read-through cache that sits in front of the tenant directory
//! on the routing path.

use std::time::Duration;

/// Default number of tenants kept in the cache.
pub const DEFAULT_CACHE_CAPACITY: usize = 1_000;

/// Default time a cached tenant stays valid.
pub const DEFAULT_CACHE_TTL_SECS: u64 = 30;

/// Directory cache configuration.
///
/// # Environment Variables
///
/// | Variable | Default | Description |
/// |----------|---------|-------------|
/// | `ORDERUP_DIRECTORY_CACHE_CAPACITY` | 1000 | Max cached tenants |
/// | `ORDERUP_DIRECTORY_CACHE_TTL_SECS` | 30 | Seconds before a cached tenant is re-read |
/// | `ORDERUP_DIRECTORY_CACHE_ENABLED` | true | Disable to hit storage on every lookup |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryCacheConfig {
    /// Maximum number of cached tenants.
    pub capacity: usize,

    /// How long a cached tenant is served before re-reading storage.
    pub ttl: Duration,

    /// Enable the cache.
    pub enabled: bool,
}

impl Default for DirectoryCacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CACHE_CAPACITY,
            ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            enabled: true,
        }
    }
}

impl DirectoryCacheConfig {
    /// Create a configuration with the given capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be > 0");
        Self {
            capacity,
            ..Default::default()
        }
    }

    /// A configuration that turns caching off.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if !self.enabled {
            return Ok(());
        }
        if self.capacity == 0 {
            return Err("directory cache capacity must be > 0".to_string());
        }
        if self.ttl.is_zero() {
            return Err("directory cache ttl must be > 0".to_string());
        }
        Ok(())
    }

    /// Create configuration from environment variables.
    ///
    /// Falls back to defaults for any unset or unparsable variables.
    pub fn from_env() -> Self {
        Self {
            capacity: env_parse("ORDERUP_DIRECTORY_CACHE_CAPACITY", DEFAULT_CACHE_CAPACITY),
            ttl: Duration::from_secs(env_parse(
                "ORDERUP_DIRECTORY_CACHE_TTL_SECS",
                DEFAULT_CACHE_TTL_SECS,
            )),
            enabled: env_parse("ORDERUP_DIRECTORY_CACHE_ENABLED", true),
        }
    }

    /// Set capacity.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

/// Parse an environment variable with a default fallback.
pub fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
