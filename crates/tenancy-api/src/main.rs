use orderup_tenancy_api::config::ServerConfig;
use orderup_tenancy_api::{build_app, routes::AppState};
use orderup_tenancy_storage::{CachingDirectory, SqliteTenantDirectory};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from_env().unwrap_or_else(|e| {
        tracing::error!("Invalid configuration: {}", e);
        std::process::exit(1);
    });

    let layout = config.layout();
    let directory = SqliteTenantDirectory::new(layout.directory_path(), &config.router.base_host);

    tracing::info!("Using data directory: {}", config.data_dir.display());
    if !directory.exists() {
        tracing::warn!("Tenant directory does not exist, initializing new directory");
    }
    directory
        .ensure_initialized()
        .expect("Failed to initialize tenant directory");

    let state = AppState {
        directory: Arc::new(CachingDirectory::new(directory, &config.cache)),
        layout,
    };

    let app = build_app(state, config.router.clone());

    let addr = config.listen_addr();
    tracing::info!(
        base_host = %config.router.base_host,
        policy = ?config.router.on_directory_error,
        "OrderUp API listening on {}",
        addr
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listen address");
    axum::serve(listener, app).await.expect("Server error");
}
