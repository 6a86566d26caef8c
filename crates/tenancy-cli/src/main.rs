mod commands;

use clap::{Parser, Subcommand};
use commands::Workspace;
use orderup_tenancy_core::{Branding, NewTenant, DEFAULT_FONT_FAMILY, DEFAULT_PRIMARY_COLOR};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "orderup")]
#[command(about = "Manage OrderUp tenants and their storage partitions")]
struct Cli {
    /// Data directory holding public.db and tenants/
    #[arg(long, global = true, env = "ORDERUP_DATA_DIR", default_value = "./data")]
    data_dir: PathBuf,

    /// Bare platform host used for tenant domains
    #[arg(long, global = true, env = "ORDERUP_BASE_HOST", default_value = "localhost")]
    base_host: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the tenant directory and the public entry
    Init,
    /// Register the demo tenants (pizza, sushi)
    Seed,
    /// Tenant administration
    Tenants {
        #[command(subcommand)]
        command: TenantCommand,
    },
}

#[derive(Subcommand)]
enum TenantCommand {
    /// List registered tenants
    List {
        #[arg(long)]
        json: bool,
    },
    /// Register a tenant and provision its partition
    Register {
        schema_name: String,
        #[arg(long)]
        name: String,
        /// Defaults to `<schema_name>.<base_host>`
        #[arg(long)]
        domain: Option<String>,
        #[arg(long, default_value = DEFAULT_PRIMARY_COLOR)]
        primary_color: String,
        #[arg(long, default_value = DEFAULT_FONT_FAMILY)]
        font_family: String,
        #[arg(long)]
        logo_url: Option<String>,
    },
    /// Remove a tenant from the directory
    Remove {
        schema_name: String,
        /// Also delete the tenant's partition file
        #[arg(long)]
        purge: bool,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let ws = Workspace::open(&cli.data_dir, &cli.base_host);

    let result = match cli.command {
        Commands::Init => commands::init(&ws),
        Commands::Seed => commands::seed(&ws).map(|_| ()),
        Commands::Tenants { command } => match command {
            TenantCommand::List { json } => commands::list(&ws, json),
            TenantCommand::Register {
                schema_name,
                name,
                domain,
                primary_color,
                font_family,
                logo_url,
            } => {
                let domain =
                    domain.unwrap_or_else(|| format!("{}.{}", schema_name, cli.base_host));
                let tenant = NewTenant::new(schema_name, name, domain).with_branding(Branding {
                    primary_color,
                    font_family,
                    logo_url,
                });
                commands::register(&ws, tenant).map(|_| ())
            }
            TenantCommand::Remove { schema_name, purge } => {
                commands::remove(&ws, &schema_name, purge)
            }
        },
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
