//! OrderUp Tenancy API Library
//!
//! Tenant-routed HTTP application: every request is resolved to exactly one
//! tenant partition and one route table before a handler runs.

pub mod config;
pub mod context;
pub mod error;
pub mod routes;
pub mod tenant_router;

#[cfg(feature = "metrics")]
pub mod metrics;

use axum::{middleware, routing::get, Router};
use routes::{dispatch, health_check, AppState, RouteTables};
use std::sync::Arc;
use tenant_router::{tenant_router_middleware, RouterConfig, TenantRouter};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use context::{FallbackReason, Namespace, RequestContext, Resolution, TenantSource};
pub use tenant_router::DirectoryErrorPolicy;

/// Build the application with the standard OrderUp route tables.
pub fn build_app(state: AppState, config: RouterConfig) -> Router {
    let router = TenantRouter::new(state.directory.clone(), state.layout.clone(), config);
    build_app_with_tables(Arc::new(router), RouteTables::new(state))
}

/// Build the application around custom route tables.
///
/// `/health`, `/health/` (and `/metrics`) sit outside tenant routing.
pub fn build_app_with_tables(router: Arc<TenantRouter>, tables: RouteTables) -> Router {
    let routed = Router::new()
        .fallback(dispatch)
        .with_state(Arc::new(tables));

    let app = routed
        .layer(middleware::from_fn_with_state(
            router,
            tenant_router_middleware,
        ))
        .route("/health", get(health_check))
        .route("/health/", get(health_check));

    #[cfg(feature = "metrics")]
    let app = app.route("/metrics", get(metrics::metrics_handler));

    app.layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
