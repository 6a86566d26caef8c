//! Public and tenant route tables
//!
//! The tenant router decides the namespace; [`dispatch`] then hands the request
//! to exactly one of the two tables. A path only exists in the table that
//! defines it, so a tenant request can never reach a public-only endpoint
//! (and vice versa).

use crate::context::{Namespace, RequestContext};
use crate::error::{bad_request, conflict, internal_error, not_found, ApiError};
use crate::tenant_router::require_tenant_middleware;
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware,
    response::{Html, IntoResponse, Response},
    routing::get,
    Extension, Json, Router,
};
use orderup_tenancy_core::{DirectoryError, NewTenant, Tenant};
use orderup_tenancy_storage::{PartitionLayout, TenantDirectory};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower::ServiceExt;
use tracing::{error, info};
use uuid::Uuid;

/// State shared by the handlers of both route tables
#[derive(Clone)]
pub struct AppState {
    pub directory: Arc<dyn TenantDirectory>,
    pub layout: PartitionLayout,
}

/// Branding payload consumed by storefront frontends
#[derive(Debug, Serialize, Deserialize)]
pub struct TenantInfo {
    pub name: String,
    pub schema_name: String,
    pub logo_url: Option<String>,
    pub primary_color: String,
    pub font_family: String,
}

impl From<&Tenant> for TenantInfo {
    fn from(tenant: &Tenant) -> Self {
        Self {
            name: tenant.name.clone(),
            schema_name: tenant.schema_name.clone(),
            logo_url: tenant.branding.logo_url.clone(),
            primary_color: tenant.branding.primary_color.clone(),
            font_family: tenant.branding.font_family.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PartitionInfo {
    /// Schema selected by the router
    pub schema_name: String,
    /// Schema recorded inside the partition file
    pub owner: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TenantListResponse {
    pub tenants: Vec<Tenant>,
}

/// The two route tables a request can be dispatched to
#[derive(Clone)]
pub struct RouteTables {
    public: Router,
    tenant: Router,
}

impl RouteTables {
    /// The standard OrderUp tables
    pub fn new(state: AppState) -> Self {
        Self::from_routers(public_routes(state.clone()), tenant_routes(state))
    }

    /// Custom tables
    ///
    /// With the `metrics` feature each table is wrapped in request tracking so
    /// that its own matched route templates become the `path` label.
    pub fn from_routers(public: Router, tenant: Router) -> Self {
        #[cfg(feature = "metrics")]
        let (public, tenant) = (
            public.layer(middleware::from_fn(crate::metrics::track_metrics)),
            tenant.layer(middleware::from_fn(crate::metrics::track_metrics)),
        );

        Self { public, tenant }
    }

    pub fn for_namespace(&self, namespace: Namespace) -> &Router {
        match namespace {
            Namespace::Public => &self.public,
            Namespace::Tenant => &self.tenant,
        }
    }
}

/// Forward a routed request to the table its context selects
pub async fn dispatch(State(tables): State<Arc<RouteTables>>, req: Request) -> Response {
    let Some(namespace) = req.extensions().get::<RequestContext>().map(|c| c.namespace()) else {
        return internal_error("request reached dispatch without a tenant context".to_string(), None)
            .into_response();
    };

    let table = tables.for_namespace(namespace).clone();
    match table.oneshot(req).await {
        Ok(response) => response,
        Err(never) => match never {},
    }
}

/// Routes served in the shared namespace
pub fn public_routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(public_landing))
        .route("/api/tenant", get(current_tenant))
        .route("/api/tenant/", get(current_tenant))
        .route("/api/tenants", get(list_tenants).post(register_tenant))
        .fallback(route_not_found)
        .with_state(state)
}

/// Routes served inside a tenant's namespace
pub fn tenant_routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(tenant_landing))
        .route("/api/tenant", get(current_tenant))
        .route("/api/tenant/", get(current_tenant))
        .route("/api/partition", get(partition_info))
        .route_layer(middleware::from_fn(require_tenant_middleware))
        .fallback(route_not_found)
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "OK"
}

async fn public_landing() -> Html<&'static str> {
    Html("<h1>Welcome to OrderUp Platform</h1>")
}

async fn tenant_landing(Extension(ctx): Extension<RequestContext>) -> Result<Html<String>, ApiError> {
    let tenant = require_tenant(&ctx)?;
    Ok(Html(format!("<h1>Welcome to {}</h1>", escape_html(&tenant.name))))
}

/// Branding of whichever tenant the request resolved to
async fn current_tenant(Extension(ctx): Extension<RequestContext>) -> Result<Json<TenantInfo>, ApiError> {
    let tenant = require_tenant(&ctx)?;
    Ok(Json(TenantInfo::from(tenant)))
}

async fn partition_info(Extension(ctx): Extension<RequestContext>) -> Result<Json<PartitionInfo>, ApiError> {
    let request_id = Some(ctx.request_id());
    let partition = ctx.partition().clone();

    let info = run_blocking(request_id, move || {
        let owner = partition
            .owner()
            .map_err(|e| internal_error(e.to_string(), request_id))?;
        Ok(PartitionInfo {
            schema_name: partition.schema_name().to_string(),
            owner,
        })
    })
    .await?;

    Ok(Json(info))
}

async fn list_tenants(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> Result<Json<TenantListResponse>, ApiError> {
    let request_id = Some(ctx.request_id());

    let tenants = run_blocking(request_id, move || {
        state
            .directory
            .list_all()
            .map_err(|e| internal_error(e.to_string(), request_id))
    })
    .await?;

    Ok(Json(TenantListResponse { tenants }))
}

async fn register_tenant(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Json(request): Json<NewTenant>,
) -> Result<(StatusCode, Json<Tenant>), ApiError> {
    let request_id = Some(ctx.request_id());

    let tenant = run_blocking(request_id, move || {
        let tenant = state.directory.register(request).map_err(|e| match e {
            DirectoryError::ValidationError(_) | DirectoryError::ReservedIdentifier(_) => {
                bad_request(e.to_string(), request_id)
            }
            DirectoryError::AlreadyExists(_) => conflict(e.to_string(), request_id),
            other => internal_error(other.to_string(), request_id),
        })?;

        if let Err(e) = state.layout.provision(&tenant.schema_name) {
            error!(schema = %tenant.schema_name, error = %e, "Failed to provision partition");
            return Err(internal_error(e.to_string(), request_id));
        }
        Ok(tenant)
    })
    .await?;

    info!(tenant = %tenant.name, schema = %tenant.schema_name, "Tenant onboarded");
    Ok((StatusCode::CREATED, Json(tenant)))
}

/// Run SQLite work on the blocking pool
async fn run_blocking<T, F>(request_id: Option<Uuid>, f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| internal_error(format!("storage task failed: {}", e), request_id))?
}

async fn route_not_found(Extension(ctx): Extension<RequestContext>, req: Request) -> ApiError {
    not_found(
        format!(
            "No route for {} in the {} namespace",
            req.uri().path(),
            ctx.namespace()
        ),
        Some(ctx.request_id()),
    )
}

fn require_tenant(ctx: &RequestContext) -> Result<&Tenant, ApiError> {
    ctx.tenant().ok_or_else(|| {
        not_found(
            "No tenant is associated with this request".to_string(),
            Some(ctx.request_id()),
        )
    })
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
