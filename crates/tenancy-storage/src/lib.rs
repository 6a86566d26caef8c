//! OrderUp Tenancy Storage
//!
//! The tenant directory (identifier -> tenant metadata) and the per-tenant
//! storage partitions it points at.
//!
//! Layout under the data directory:
//!
//! ```text
//! <root>/public.db          shared namespace + the tenant directory
//! <root>/tenants/<schema>.db  one partition per tenant
//! ```

use chrono::Utc;
use orderup_tenancy_core::{
    init_directory_schema, init_partition_schema, partition_owner, validation, DirectoryError,
    NewTenant, Result, Tenant, PUBLIC_SCHEMA, TENANT_COLUMNS,
};
use rusqlite::{Connection, OpenFlags, OptionalExtension};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub mod cache;
pub mod cache_config;

pub use cache::{CacheStats, CachingDirectory};
pub use cache_config::DirectoryCacheConfig;

/// How long a connection waits on a locked database before giving up
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Authoritative mapping from tenant identifier to tenant metadata
///
/// `lookup` is on the routing-critical path and is called once per request.
/// `register`, `list_all` and `remove` serve administrative tooling.
pub trait TenantDirectory: Send + Sync {
    /// Return the tenant whose schema name is exactly `identifier`.
    ///
    /// Fails with [`DirectoryError::TenantNotFound`] when there is no such
    /// entry; any other error means the directory itself could not be read.
    fn lookup(&self, identifier: &str) -> Result<Tenant>;

    /// Register a new tenant
    fn register(&self, tenant: NewTenant) -> Result<Tenant>;

    /// List all tenants, oldest first
    fn list_all(&self) -> Result<Vec<Tenant>>;

    /// Remove a tenant entry. The public entry cannot be removed.
    fn remove(&self, identifier: &str) -> Result<()>;
}

impl<D: TenantDirectory + ?Sized> TenantDirectory for std::sync::Arc<D> {
    fn lookup(&self, identifier: &str) -> Result<Tenant> {
        (**self).lookup(identifier)
    }

    fn register(&self, tenant: NewTenant) -> Result<Tenant> {
        (**self).register(tenant)
    }

    fn list_all(&self) -> Result<Vec<Tenant>> {
        (**self).list_all()
    }

    fn remove(&self, identifier: &str) -> Result<()> {
        (**self).remove(identifier)
    }
}

/// Tenant directory stored in the shared SQLite file
///
/// Every call opens its own connection, so the directory can be shared across
/// request handlers without locking.
#[derive(Clone, Debug)]
pub struct SqliteTenantDirectory {
    /// Path to the shared SQLite database file
    path: PathBuf,
    /// Domain recorded for the public entry on initialization
    base_host: String,
}

impl SqliteTenantDirectory {
    /// Create a directory handle for the given file
    ///
    /// # Example
    /// ```
    /// use orderup_tenancy_storage::SqliteTenantDirectory;
    ///
    /// let directory = SqliteTenantDirectory::new("data/public.db", "localhost");
    /// ```
    pub fn new<P: AsRef<Path>>(path: P, base_host: impl Into<String>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            base_host: base_host.into(),
        }
    }

    /// Get the path to the database file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if the directory database exists
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Create a new directory (fails if the file already exists)
    pub fn initialize(&self) -> Result<()> {
        if self.exists() {
            return Err(DirectoryError::Other(format!(
                "Tenant directory already exists at {:?}",
                self.path
            )));
        }
        self.ensure_initialized()
    }

    /// Create the directory if needed and make sure the public entry exists
    pub fn ensure_initialized(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(&self.path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        init_directory_schema(&conn, &self.base_host)?;
        init_partition_schema(&conn, PUBLIC_SCHEMA)?;

        Ok(())
    }

    /// Open a connection to an existing directory
    ///
    /// A missing file is reported as [`DirectoryError::Unavailable`] instead of
    /// being created empty, so a misconfigured data directory never looks like
    /// a directory with no tenants in it.
    fn connection(&self) -> Result<Connection> {
        let conn = Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| {
            DirectoryError::Unavailable(format!("cannot open {}: {}", self.path.display(), e))
        })?;

        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        Ok(conn)
    }
}

impl TenantDirectory for SqliteTenantDirectory {
    fn lookup(&self, identifier: &str) -> Result<Tenant> {
        let conn = self.connection()?;

        conn.query_row(
            &format!(
                "SELECT {} FROM tenants WHERE schema_name = ?1",
                TENANT_COLUMNS
            ),
            [identifier],
            Tenant::from_row,
        )
        .optional()?
        .ok_or_else(|| DirectoryError::TenantNotFound(identifier.to_string()))
    }

    fn register(&self, tenant: NewTenant) -> Result<Tenant> {
        validation::validate_new_tenant(&tenant)?;
        if validation::is_reserved_for_host(&tenant.schema_name, &self.base_host) {
            return Err(DirectoryError::ReservedIdentifier(tenant.schema_name));
        }

        let conn = self.connection()?;
        let created_at = Utc::now();
        let inserted = conn.execute(
            "INSERT INTO tenants (schema_name, name, domain, primary_color, font_family, logo_url, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
                tenant.schema_name,
                tenant.name.trim(),
                tenant.domain,
                tenant.branding.primary_color,
                tenant.branding.font_family,
                tenant.branding.logo_url,
                created_at,
            ],
        );

        match inserted {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                return Err(DirectoryError::AlreadyExists(tenant.schema_name));
            }
            Err(e) => return Err(e.into()),
        }

        tracing::info!(schema = %tenant.schema_name, name = %tenant.name, "Registered tenant");

        Ok(Tenant {
            schema_name: tenant.schema_name,
            name: tenant.name.trim().to_string(),
            domain: tenant.domain,
            branding: tenant.branding,
            created_at,
        })
    }

    fn list_all(&self) -> Result<Vec<Tenant>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM tenants ORDER BY created_at, id",
            TENANT_COLUMNS
        ))?;

        let tenants = stmt
            .query_map([], Tenant::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(tenants)
    }

    fn remove(&self, identifier: &str) -> Result<()> {
        if identifier == PUBLIC_SCHEMA {
            return Err(DirectoryError::ReservedIdentifier(identifier.to_string()));
        }

        let conn = self.connection()?;
        let removed = conn.execute("DELETE FROM tenants WHERE schema_name = ?1", [identifier])?;
        if removed == 0 {
            return Err(DirectoryError::TenantNotFound(identifier.to_string()));
        }

        tracing::info!(schema = %identifier, "Removed tenant");
        Ok(())
    }
}

/// Maps schema names to the storage files that back them
#[derive(Clone, Debug)]
pub struct PartitionLayout {
    root: PathBuf,
}

impl PartitionLayout {
    /// File name of the shared namespace (also holds the directory)
    pub const PUBLIC_FILE: &'static str = "public.db";

    /// Subdirectory holding one file per tenant
    pub const TENANTS_DIR: &'static str = "tenants";

    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the shared database holding the tenant directory
    pub fn directory_path(&self) -> PathBuf {
        self.root.join(Self::PUBLIC_FILE)
    }

    /// Path of the partition that backs `schema_name`
    ///
    /// Callers pass schema names read back from the directory, which only
    /// admits names matching [`validation::validate_schema_name`].
    pub fn partition_path(&self, schema_name: &str) -> PathBuf {
        if schema_name == PUBLIC_SCHEMA {
            self.directory_path()
        } else {
            self.root
                .join(Self::TENANTS_DIR)
                .join(format!("{}.db", schema_name))
        }
    }

    /// Select the partition for `schema_name` without touching storage.
    pub fn activate(&self, schema_name: &str) -> PartitionHandle {
        PartitionHandle {
            schema_name: schema_name.to_string(),
            path: self.partition_path(schema_name),
        }
    }

    /// Create the partition file for a newly registered tenant.
    pub fn provision(&self, schema_name: &str) -> Result<PartitionHandle> {
        let handle = self.activate(schema_name);
        handle.connection()?;
        tracing::debug!(schema = %schema_name, path = %handle.path.display(), "Provisioned partition");
        Ok(handle)
    }
}

/// Handle to one tenant's isolated storage partition
///
/// Obtained from [`PartitionLayout::activate`]. Connections opened through
/// the handle only ever see this partition's file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PartitionHandle {
    schema_name: String,
    path: PathBuf,
}

impl PartitionHandle {
    /// Schema name of the partition
    pub fn schema_name(&self) -> &str {
        &self.schema_name
    }

    /// Path of the backing SQLite file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether this is the shared namespace
    pub fn is_public(&self) -> bool {
        self.schema_name == PUBLIC_SCHEMA
    }

    /// Open a connection to the partition, creating it on first use.
    pub fn connection(&self) -> Result<Connection> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        init_partition_schema(&conn, &self.schema_name)?;

        Ok(conn)
    }

    /// Schema name recorded inside the partition file itself
    pub fn owner(&self) -> Result<String> {
        let conn = self.connection()?;
        partition_owner(&conn)
    }
}
