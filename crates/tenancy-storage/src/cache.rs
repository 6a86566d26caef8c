//! Read-through cache in front of a [`TenantDirectory`].
//!
//! Only successful lookups are cached. A miss or a storage error always goes
//! back to the inner directory, so a tenant registered after a miss becomes
//! visible on the next request. Writes made through the cache invalidate the
//! affected entry; writes made elsewhere become visible once the TTL expires.

use crate::{DirectoryCacheConfig, TenantDirectory};
use lru::LruCache;
use orderup_tenancy_core::{NewTenant, Result, Tenant};
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::debug;

struct CachedTenant {
    tenant: Tenant,
    loaded_at: Instant,
}

/// Hit/miss counters for the directory cache
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// A [`TenantDirectory`] that caches successful lookups.
pub struct CachingDirectory<D> {
    inner: D,
    /// `None` when caching is disabled
    entries: Option<Mutex<LruCache<String, CachedTenant>>>,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<D: TenantDirectory> CachingDirectory<D> {
    pub fn new(inner: D, config: &DirectoryCacheConfig) -> Self {
        let entries = if config.enabled {
            NonZeroUsize::new(config.capacity).map(|cap| Mutex::new(LruCache::new(cap)))
        } else {
            None
        };

        Self {
            inner,
            entries,
            ttl: config.ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// The wrapped directory
    pub fn inner(&self) -> &D {
        &self.inner
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    /// Drop a single cached entry
    pub fn invalidate(&self, identifier: &str) {
        if let Some(entries) = &self.entries {
            entries.lock().pop(identifier);
        }
    }

    /// Drop every cached entry
    pub fn clear(&self) {
        if let Some(entries) = &self.entries {
            entries.lock().clear();
        }
    }

    fn cached(&self, identifier: &str) -> Option<Tenant> {
        let entries = self.entries.as_ref()?;
        let mut entries = entries.lock();

        let expired = match entries.get(identifier) {
            Some(entry) if entry.loaded_at.elapsed() < self.ttl => {
                return Some(entry.tenant.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.pop(identifier);
        }
        None
    }

    fn store(&self, tenant: &Tenant) {
        if let Some(entries) = &self.entries {
            entries.lock().put(
                tenant.schema_name.clone(),
                CachedTenant {
                    tenant: tenant.clone(),
                    loaded_at: Instant::now(),
                },
            );
        }
    }
}

impl<D: TenantDirectory> TenantDirectory for CachingDirectory<D> {
    fn lookup(&self, identifier: &str) -> Result<Tenant> {
        if let Some(tenant) = self.cached(identifier) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(tenant);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let tenant = self.inner.lookup(identifier)?;
        debug!(schema = %identifier, "Cached tenant directory entry");
        self.store(&tenant);
        Ok(tenant)
    }

    fn register(&self, tenant: NewTenant) -> Result<Tenant> {
        let identifier = tenant.schema_name.clone();
        let result = self.inner.register(tenant);
        self.invalidate(&identifier);
        result
    }

    fn list_all(&self) -> Result<Vec<Tenant>> {
        self.inner.list_all()
    }

    fn remove(&self, identifier: &str) -> Result<()> {
        let result = self.inner.remove(identifier);
        self.invalidate(identifier);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orderup_tenancy_core::{Branding, DirectoryError};
    use std::collections::HashMap;
    use std::sync::atomic::AtomicUsize;

    /// In-memory directory that counts lookups
    #[derive(Default)]
    struct CountingDirectory {
        tenants: Mutex<HashMap<String, Tenant>>,
        lookups: AtomicUsize,
        fail: std::sync::atomic::AtomicBool,
    }

    impl CountingDirectory {
        fn with(names: &[&str]) -> Self {
            let dir = Self::default();
            for name in names {
                dir.register(NewTenant::new(*name, *name, format!("{}.localhost", name)))
                    .unwrap();
            }
            dir
        }

        fn lookups(&self) -> usize {
            self.lookups.load(Ordering::SeqCst)
        }
    }

    impl TenantDirectory for CountingDirectory {
        fn lookup(&self, identifier: &str) -> Result<Tenant> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(DirectoryError::Unavailable("down".to_string()));
            }
            self.tenants
                .lock()
                .get(identifier)
                .cloned()
                .ok_or_else(|| DirectoryError::TenantNotFound(identifier.to_string()))
        }

        fn register(&self, tenant: NewTenant) -> Result<Tenant> {
            let tenant = Tenant {
                schema_name: tenant.schema_name,
                name: tenant.name,
                domain: tenant.domain,
                branding: Branding::default(),
                created_at: chrono::Utc::now(),
            };
            self.tenants
                .lock()
                .insert(tenant.schema_name.clone(), tenant.clone());
            Ok(tenant)
        }

        fn list_all(&self) -> Result<Vec<Tenant>> {
            Ok(self.tenants.lock().values().cloned().collect())
        }

        fn remove(&self, identifier: &str) -> Result<()> {
            self.tenants
                .lock()
                .remove(identifier)
                .map(|_| ())
                .ok_or_else(|| DirectoryError::TenantNotFound(identifier.to_string()))
        }
    }

    #[test]
    fn test_hits_are_served_from_cache() {
        let cache = CachingDirectory::new(
            CountingDirectory::with(&["pizza"]),
            &DirectoryCacheConfig::default(),
        );

        assert_eq!(cache.lookup("pizza").unwrap().schema_name, "pizza");
        assert_eq!(cache.lookup("pizza").unwrap().schema_name, "pizza");

        assert_eq!(cache.inner().lookups(), 1);
        assert_eq!(cache.stats(), CacheStats { hits: 1, misses: 1 });
    }

    #[test]
    fn test_misses_are_not_cached() {
        let cache = CachingDirectory::new(
            CountingDirectory::with(&[]),
            &DirectoryCacheConfig::default(),
        );

        assert!(cache.lookup("sushi").unwrap_err().is_not_found());
        cache
            .register(NewTenant::new("sushi", "Sushi Master", "sushi.localhost"))
            .unwrap();
        assert_eq!(cache.lookup("sushi").unwrap().name, "Sushi Master");
    }

    #[test]
    fn test_errors_are_not_cached() {
        let inner = CountingDirectory::with(&["pizza"]);
        inner.fail.store(true, Ordering::SeqCst);
        let cache = CachingDirectory::new(inner, &DirectoryCacheConfig::default());

        assert!(cache.lookup("pizza").unwrap_err().is_storage_failure());
        cache.inner().fail.store(false, Ordering::SeqCst);
        assert!(cache.lookup("pizza").is_ok());
    }

    #[test]
    fn test_remove_invalidates() {
        let cache = CachingDirectory::new(
            CountingDirectory::with(&["pizza"]),
            &DirectoryCacheConfig::default(),
        );

        cache.lookup("pizza").unwrap();
        cache.remove("pizza").unwrap();
        assert!(cache.lookup("pizza").unwrap_err().is_not_found());
    }

    #[test]
    fn test_ttl_expiry() {
        let config = DirectoryCacheConfig::default().with_ttl(Duration::from_millis(20));
        let cache = CachingDirectory::new(CountingDirectory::with(&["pizza"]), &config);

        cache.lookup("pizza").unwrap();
        std::thread::sleep(Duration::from_millis(40));
        cache.lookup("pizza").unwrap();

        assert_eq!(cache.inner().lookups(), 2);
    }

    #[test]
    fn test_disabled_cache_passes_through() {
        let cache = CachingDirectory::new(
            CountingDirectory::with(&["pizza"]),
            &DirectoryCacheConfig::disabled(),
        );

        cache.lookup("pizza").unwrap();
        cache.lookup("pizza").unwrap();
        assert_eq!(cache.inner().lookups(), 2);
    }

    #[test]
    fn test_capacity_evicts_least_recent() {
        let config = DirectoryCacheConfig::new(1);
        let cache = CachingDirectory::new(CountingDirectory::with(&["pizza", "sushi"]), &config);

        cache.lookup("pizza").unwrap();
        cache.lookup("sushi").unwrap();
        cache.lookup("pizza").unwrap();

        assert_eq!(cache.inner().lookups(), 3);
    }
}
