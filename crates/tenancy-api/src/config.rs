//! Server configuration
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `ORDERUP_DATA_DIR` | `./data` | Root holding `public.db` and `tenants/` |
//! | `PORT` | 8080 | Listen port |
//! | `ORDERUP_BASE_HOST` | `localhost` | Bare platform host |
//! | `ORDERUP_TENANT_HEADER` | `X-Tenant-Subdomain` | Explicit tenant header |
//! | `ORDERUP_HOST_HEADER` | `X-Tenant-Host` | Composite host header |
//! | `ORDERUP_DIRECTORY_ERROR_POLICY` | `fallback` | `fallback` or `reject` |
//!
//! The directory cache variables are documented on
//! [`DirectoryCacheConfig`].

use crate::tenant_router::RouterConfig;
use orderup_tenancy_storage::cache_config::env_parse;
use orderup_tenancy_storage::{DirectoryCacheConfig, PartitionLayout};
use std::path::PathBuf;

/// Default data directory
pub const DEFAULT_DATA_DIR: &str = "./data";

/// Default listen port
pub const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub data_dir: PathBuf,
    pub port: u16,
    pub router: RouterConfig,
    pub cache: DirectoryCacheConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            port: DEFAULT_PORT,
            router: RouterConfig::default(),
            cache: DirectoryCacheConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, String> {
        let config = Self {
            data_dir: env_parse("ORDERUP_DATA_DIR", PathBuf::from(DEFAULT_DATA_DIR)),
            port: env_parse("PORT", DEFAULT_PORT),
            router: RouterConfig::from_env()?,
            cache: DirectoryCacheConfig::from_env(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.data_dir.as_os_str().is_empty() {
            return Err("ORDERUP_DATA_DIR must not be empty".to_string());
        }
        self.router.validate()?;
        self.cache.validate()?;
        Ok(())
    }

    pub fn layout(&self) -> PartitionLayout {
        PartitionLayout::new(&self.data_dir)
    }

    pub fn listen_addr(&self) -> std::net::SocketAddr {
        std::net::SocketAddr::from(([0, 0, 0, 0], self.port))
    }
}
