//! OrderUp Tenancy Core
//!
//! Core types, errors, and SQLite schema for the OrderUp tenant directory and
//! the per-tenant storage partitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod validation;

/// Schema name of the shared (un-partitioned) namespace.
pub const PUBLIC_SCHEMA: &str = "public";

/// Display name given to the shared namespace's directory entry.
pub const PUBLIC_TENANT_NAME: &str = "Public Tenant";

/// Default brand color for tenants that don't set one
pub const DEFAULT_PRIMARY_COLOR: &str = "#000000";

/// Default font family for tenants that don't set one
pub const DEFAULT_FONT_FAMILY: &str = "Inter";

/// Visual branding for a tenant's storefront
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Branding {
    /// CSS color, `#RGB` or `#RRGGBB`
    pub primary_color: String,
    /// CSS font family name
    pub font_family: String,
    /// Absolute URL of the tenant logo
    pub logo_url: Option<String>,
}

impl Default for Branding {
    fn default() -> Self {
        Self {
            primary_color: DEFAULT_PRIMARY_COLOR.to_string(),
            font_family: DEFAULT_FONT_FAMILY.to_string(),
            logo_url: None,
        }
    }
}

/// A restaurant registered in the tenant directory.
///
/// `schema_name` is the partition identifier. It is unique across the
/// directory and never changes once the tenant exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    /// Unique partition identifier (e.g. "pizza")
    pub schema_name: String,
    /// Human-readable restaurant name
    pub name: String,
    /// Primary domain (e.g. "pizza.localhost")
    pub domain: String,
    /// Storefront branding
    #[serde(flatten)]
    pub branding: Branding,
    /// When the tenant was registered
    pub created_at: DateTime<Utc>,
}

impl Tenant {
    /// Whether this entry denotes the shared namespace
    pub fn is_public(&self) -> bool {
        self.schema_name == PUBLIC_SCHEMA
    }

    /// Map a row selected with [`TENANT_COLUMNS`] into a tenant.
    pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            schema_name: row.get(0)?,
            name: row.get(1)?,
            domain: row.get(2)?,
            branding: Branding {
                primary_color: row.get(3)?,
                font_family: row.get(4)?,
                logo_url: row.get(5)?,
            },
            created_at: row.get(6)?,
        })
    }
}

impl std::fmt::Display for Tenant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.schema_name)
    }
}

/// Request to register a new tenant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTenant {
    pub schema_name: String,
    pub name: String,
    pub domain: String,
    #[serde(flatten)]
    pub branding: Branding,
}

impl NewTenant {
    /// Create a registration request with default branding.
    pub fn new(
        schema_name: impl Into<String>,
        name: impl Into<String>,
        domain: impl Into<String>,
    ) -> Self {
        Self {
            schema_name: schema_name.into(),
            name: name.into(),
            domain: domain.into(),
            branding: Branding::default(),
        }
    }

    pub fn with_branding(mut self, branding: Branding) -> Self {
        self.branding = branding;
        self
    }
}

/// Errors that can occur in tenant directory operations
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Tenant not found: {0}")]
    TenantNotFound(String),

    #[error("Tenant already exists: {0}")]
    AlreadyExists(String),

    #[error("Reserved identifier: {0}")]
    ReservedIdentifier(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Directory unavailable: {0}")]
    Unavailable(String),

    #[error("Other error: {0}")]
    Other(String),
}

impl DirectoryError {
    /// Routine miss, as opposed to a storage or input problem
    pub fn is_not_found(&self) -> bool {
        matches!(self, DirectoryError::TenantNotFound(_))
    }

    /// Failure of the backing storage rather than of the request
    pub fn is_storage_failure(&self) -> bool {
        matches!(
            self,
            DirectoryError::Sqlite(_)
                | DirectoryError::Io(_)
                | DirectoryError::Unavailable(_)
                | DirectoryError::Other(_)
        )
    }
}

/// Result type for directory operations
pub type Result<T> = std::result::Result<T, DirectoryError>;

/// Column list matching [`Tenant::from_row`]
pub const TENANT_COLUMNS: &str =
    "schema_name, name, domain, primary_color, font_family, logo_url, created_at";

/// Initialize the SQLite schema for the tenant directory
///
/// Creates the `tenants` table if it doesn't exist and makes sure the
/// `public` entry is present. `base_host` becomes the public entry's domain.
pub fn init_directory_schema(conn: &rusqlite::Connection, base_host: &str) -> Result<()> {
    let ddl = r#"
    CREATE TABLE IF NOT EXISTS tenants (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      schema_name TEXT UNIQUE NOT NULL,
      name TEXT NOT NULL,
      domain TEXT NOT NULL,
      primary_color TEXT NOT NULL DEFAULT '#000000',
      font_family TEXT NOT NULL DEFAULT 'Inter',
      logo_url TEXT,
      created_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_tenants_domain ON tenants(domain);
    CREATE INDEX IF NOT EXISTS idx_tenants_created_at ON tenants(created_at);
    "#;

    conn.execute_batch(ddl)?;

    let inserted = conn.execute(
        "INSERT OR IGNORE INTO tenants (schema_name, name, domain, primary_color, font_family, logo_url, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, NULL, ?6)",
        rusqlite::params![
            PUBLIC_SCHEMA,
            PUBLIC_TENANT_NAME,
            base_host,
            DEFAULT_PRIMARY_COLOR,
            DEFAULT_FONT_FAMILY,
            Utc::now(),
        ],
    )?;
    if inserted > 0 {
        tracing::info!(domain = %base_host, "Created public tenant entry");
    }

    Ok(())
}

/// Initialize the bookkeeping table of a storage partition
///
/// `partition_meta` records which schema owns the file so that a handle can
/// be checked against the partition it actually opened.
pub fn init_partition_schema(conn: &rusqlite::Connection, schema_name: &str) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS partition_meta (
          key TEXT PRIMARY KEY,
          value TEXT NOT NULL
        );
        "#,
    )?;
    conn.execute(
        "INSERT OR IGNORE INTO partition_meta (key, value) VALUES ('schema_name', ?1)",
        [schema_name],
    )?;
    conn.execute(
        "INSERT OR IGNORE INTO partition_meta (key, value) VALUES ('created_at', ?1)",
        [Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

/// Read the owning schema name recorded in a partition
pub fn partition_owner(conn: &rusqlite::Connection) -> Result<String> {
    let owner = conn.query_row(
        "SELECT value FROM partition_meta WHERE key = 'schema_name'",
        [],
        |row| row.get(0),
    )?;
    Ok(owner)
}
