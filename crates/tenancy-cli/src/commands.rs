//! Tenant administration commands

use orderup_tenancy_core::{Branding, DirectoryError, NewTenant, Result, Tenant};
use orderup_tenancy_storage::{PartitionLayout, SqliteTenantDirectory, TenantDirectory};
use std::path::Path;

/// Tenants created by `seed`: (schema, name, primary color, font, logo)
pub const DEMO_TENANTS: &[(&str, &str, &str, &str, &str)] = &[
    (
        "pizza",
        "Pizza Lover",
        "#e63946",
        "Roboto",
        "https://img.icons8.com/color/96/pizza.png",
    ),
    (
        "sushi",
        "Sushi Master",
        "#2a9d8f",
        "Lato",
        "https://img.icons8.com/color/96/sushi.png",
    ),
];

/// Directory and partition layout rooted at one data directory
pub struct Workspace {
    pub layout: PartitionLayout,
    pub directory: SqliteTenantDirectory,
    pub base_host: String,
}

impl Workspace {
    pub fn open(data_dir: &Path, base_host: &str) -> Self {
        let layout = PartitionLayout::new(data_dir);
        let directory = SqliteTenantDirectory::new(layout.directory_path(), base_host);
        Self {
            layout,
            directory,
            base_host: base_host.to_string(),
        }
    }
}

/// Create the data directory, the tenant directory and the public entry
pub fn init(ws: &Workspace) -> Result<()> {
    let existed = ws.directory.exists();
    ws.directory.ensure_initialized()?;
    if existed {
        println!(
            "Tenant directory already present at {}",
            ws.directory.path().display()
        );
    } else {
        println!(
            "Initialized tenant directory at {}",
            ws.directory.path().display()
        );
    }
    Ok(())
}

/// Register the demo tenants, skipping any that already exist.
///
/// Returns the schema names that were newly created.
pub fn seed(ws: &Workspace) -> Result<Vec<String>> {
    ws.directory.ensure_initialized()?;

    let mut created = Vec::new();
    for (schema, name, color, font, logo) in DEMO_TENANTS {
        let tenant = NewTenant::new(*schema, *name, format!("{}.{}", schema, ws.base_host))
            .with_branding(Branding {
                primary_color: color.to_string(),
                font_family: font.to_string(),
                logo_url: Some(logo.to_string()),
            });

        match ws.directory.register(tenant) {
            Ok(tenant) => {
                ws.layout.provision(&tenant.schema_name)?;
                println!("Created tenant: {}", tenant);
                created.push(tenant.schema_name);
            }
            Err(DirectoryError::AlreadyExists(schema)) => {
                println!("Tenant {} already exists", schema);
            }
            Err(e) => return Err(e),
        }
    }
    Ok(created)
}

pub fn list(ws: &Workspace, json: bool) -> Result<()> {
    let tenants = ws.directory.list_all()?;

    if json {
        let out = serde_json::to_string_pretty(&tenants)
            .map_err(|e| DirectoryError::Other(e.to_string()))?;
        println!("{}", out);
        return Ok(());
    }

    println!(
        "{:<20} {:<24} {:<28} {:<8} {:<12}",
        "SCHEMA", "NAME", "DOMAIN", "COLOR", "FONT"
    );
    for t in &tenants {
        println!(
            "{:<20} {:<24} {:<28} {:<8} {:<12}",
            t.schema_name, t.name, t.domain, t.branding.primary_color, t.branding.font_family
        );
    }
    Ok(())
}

/// Register one tenant and provision its partition
pub fn register(ws: &Workspace, tenant: NewTenant) -> Result<Tenant> {
    let tenant = ws.directory.register(tenant)?;
    let partition = ws.layout.provision(&tenant.schema_name)?;
    println!(
        "Registered {} (partition {})",
        tenant,
        partition.path().display()
    );
    Ok(tenant)
}

/// Remove a tenant entry; with `purge` also delete its partition file
pub fn remove(ws: &Workspace, schema_name: &str, purge: bool) -> Result<()> {
    ws.directory.remove(schema_name)?;
    println!("Removed tenant {}", schema_name);

    if purge {
        let path = ws.layout.partition_path(schema_name);
        if path.exists() {
            std::fs::remove_file(&path)?;
            println!("Deleted partition {}", path.display());
        }
    }
    Ok(())
}
