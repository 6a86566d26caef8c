//! Tenant Routing Middleware
//!
//! Decides which tenant partition and which route table serve a request, then
//! attaches the result as a [`RequestContext`] to that request's extensions
//! before any handler runs.
//!
//! # Resolution Chain
//!
//! 1. **Header**: a non-blank `X-Tenant-Subdomain` header is used verbatim.
//! 2. **Host**: otherwise the leading label of `X-Tenant-Host`
//!    (`pizza.localhost` -> `pizza`), unless the host is the bare base host.
//! 3. **Fallback**: no candidate, a reserved candidate (`public`, `www`, the
//!    base host, empty), or a candidate the directory doesn't know all land in
//!    the shared namespace with the public route table.
//!
//! A tenant that doesn't exist is routine, not an error: the request is served
//! by the public route table. The one configurable case is a directory that
//! cannot be read at all, see [`DirectoryErrorPolicy`].
//!
//! # Usage
//!
//! ```rust,ignore
//! use orderup_tenancy_api::tenant_router::{tenant_router_middleware, TenantRouter};
//!
//! let router = Arc::new(TenantRouter::new(directory, layout, RouterConfig::default()));
//! let app = Router::new()
//!     .fallback(dispatch)
//!     .layer(middleware::from_fn_with_state(router, tenant_router_middleware));
//!
//! async fn handler(Extension(ctx): Extension<RequestContext>) -> impl IntoResponse {
//!     // ctx.partition() is the only partition this request may touch
//! }
//! ```

use crate::context::{FallbackReason, RequestContext, TenantSource};
use crate::error::{internal_error, service_unavailable, ErrorResponse};
use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use orderup_tenancy_core::{validation, DirectoryError, PUBLIC_SCHEMA};
use orderup_tenancy_storage::{PartitionLayout, TenantDirectory};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, error, warn};
use uuid::Uuid;

/// Default header carrying an explicit tenant identifier
pub const TENANT_HEADER: &str = "x-tenant-subdomain";

/// Default header carrying the original `subdomain.basehost` host
pub const HOST_HEADER: &str = "x-tenant-host";

/// Response header echoing the request id
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Default base host; `pizza.localhost` names the `pizza` tenant
pub const DEFAULT_BASE_HOST: &str = "localhost";

/// What to do when the tenant directory itself cannot be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DirectoryErrorPolicy {
    /// Serve the request from the shared namespace.
    ///
    /// Keeps the platform up during a directory outage, at the cost of tenant
    /// requests briefly seeing public pages.
    #[default]
    FallbackToPublic,
    /// Answer 503 so the client can retry.
    Reject,
}

impl FromStr for DirectoryErrorPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fallback" | "fallback_to_public" => Ok(DirectoryErrorPolicy::FallbackToPublic),
            "reject" => Ok(DirectoryErrorPolicy::Reject),
            other => Err(format!(
                "unknown directory error policy '{}' (expected 'fallback' or 'reject')",
                other
            )),
        }
    }
}

/// Configuration for the tenant router.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Header carrying an explicit tenant identifier
    pub tenant_header: HeaderName,
    /// Header carrying the composite `subdomain.basehost` host
    pub host_header: HeaderName,
    /// Bare platform host, e.g. `localhost` or `orderup.com`
    pub base_host: String,
    /// Behavior when the directory is unreachable
    pub on_directory_error: DirectoryErrorPolicy,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            tenant_header: HeaderName::from_static(TENANT_HEADER),
            host_header: HeaderName::from_static(HOST_HEADER),
            base_host: DEFAULT_BASE_HOST.to_string(),
            on_directory_error: DirectoryErrorPolicy::default(),
        }
    }
}

impl RouterConfig {
    /// Create configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `ORDERUP_TENANT_HEADER` | `X-Tenant-Subdomain` |
    /// | `ORDERUP_HOST_HEADER` | `X-Tenant-Host` |
    /// | `ORDERUP_BASE_HOST` | `localhost` |
    /// | `ORDERUP_DIRECTORY_ERROR_POLICY` | `fallback` |
    pub fn from_env() -> Result<Self, String> {
        let defaults = Self::default();
        let on_directory_error = match std::env::var("ORDERUP_DIRECTORY_ERROR_POLICY") {
            Ok(value) => value.parse()?,
            Err(_) => defaults.on_directory_error,
        };

        Ok(Self {
            tenant_header: env_header("ORDERUP_TENANT_HEADER", defaults.tenant_header)?,
            host_header: env_header("ORDERUP_HOST_HEADER", defaults.host_header)?,
            base_host: std::env::var("ORDERUP_BASE_HOST")
                .map(|h| h.trim().to_ascii_lowercase())
                .unwrap_or(defaults.base_host),
            on_directory_error,
        })
    }

    pub fn with_base_host(mut self, base_host: impl Into<String>) -> Self {
        self.base_host = base_host.into().to_ascii_lowercase();
        self
    }

    pub fn with_directory_error_policy(mut self, policy: DirectoryErrorPolicy) -> Self {
        self.on_directory_error = policy;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.base_host.is_empty() {
            return Err("base_host must not be empty".to_string());
        }
        if self.base_host.contains(':') || self.base_host.contains('/') {
            return Err(format!(
                "base_host '{}' must be a bare host name",
                self.base_host
            ));
        }
        if self.tenant_header == self.host_header {
            return Err("tenant_header and host_header must differ".to_string());
        }
        Ok(())
    }

    /// First label of the base host (`orderup` for `orderup.com`)
    fn base_host_label(&self) -> &str {
        self.base_host
            .split('.')
            .next()
            .unwrap_or(self.base_host.as_str())
    }
}

/// Candidate tenant identifier read from a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Candidate {
    /// An identifier to look up
    Identifier { value: String, source: TenantSource },
    /// Nothing to look up; go straight to the shared namespace
    Absent(FallbackReason),
}

/// Failure that the router surfaces instead of falling back
#[derive(Debug, thiserror::Error)]
pub enum RoutingError {
    #[error("tenant directory unavailable while resolving '{candidate}': {source}")]
    DirectoryUnavailable {
        candidate: String,
        source: DirectoryError,
    },
}

impl RoutingError {
    pub fn status(&self) -> StatusCode {
        match self {
            RoutingError::DirectoryUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn into_response_for(self, request_id: Uuid) -> Response {
        match self {
            RoutingError::DirectoryUnavailable { .. } => service_unavailable(
                "Tenant directory is temporarily unavailable".to_string(),
                Some(request_id),
            )
            .into_response(),
        }
    }
}

/// Resolves requests to a tenant partition and route table
pub struct TenantRouter {
    directory: Arc<dyn TenantDirectory>,
    layout: PartitionLayout,
    config: RouterConfig,
}

impl TenantRouter {
    pub fn new(
        directory: Arc<dyn TenantDirectory>,
        layout: PartitionLayout,
        config: RouterConfig,
    ) -> Self {
        Self {
            directory,
            layout,
            config,
        }
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn directory(&self) -> &Arc<dyn TenantDirectory> {
        &self.directory
    }

    pub fn layout(&self) -> &PartitionLayout {
        &self.layout
    }

    /// Read the candidate identifier from request headers
    ///
    /// A blank explicit header counts as absent so that the host header still
    /// applies; edge proxies send an empty subdomain for bare hosts.
    pub fn extract_candidate(&self, headers: &HeaderMap) -> Candidate {
        if let Some(value) = header_str(headers, &self.config.tenant_header) {
            return Candidate::Identifier {
                value: value.to_string(),
                source: TenantSource::Header,
            };
        }

        match header_str(headers, &self.config.host_header) {
            Some(host) => self.candidate_from_host(host),
            None => Candidate::Absent(FallbackReason::NoCandidate),
        }
    }

    fn candidate_from_host(&self, host: &str) -> Candidate {
        let host = strip_port(host).to_ascii_lowercase();

        if host == self.config.base_host {
            return Candidate::Absent(FallbackReason::NoCandidate);
        }

        let Some((label, _rest)) = host.split_once('.') else {
            return Candidate::Absent(FallbackReason::AmbiguousHost);
        };

        if label == self.config.base_host_label() {
            return Candidate::Absent(FallbackReason::NoCandidate);
        }

        Candidate::Identifier {
            value: label.to_string(),
            source: TenantSource::Host,
        }
    }

    /// Whether `candidate` must never be looked up as a tenant
    pub fn is_reserved(&self, candidate: &str) -> bool {
        candidate.is_empty() || validation::is_reserved_for_host(candidate, &self.config.base_host)
    }

    /// Resolve a request with a fresh request id
    pub fn resolve(&self, headers: &HeaderMap) -> Result<RequestContext, RoutingError> {
        self.resolve_with_id(headers, Uuid::new_v4())
    }

    /// Resolve a request to its tenant, partition and route table.
    ///
    /// Performs exactly one partition activation. Never fails for a missing
    /// tenant; fails only for an unreadable directory under
    /// [`DirectoryErrorPolicy::Reject`].
    pub fn resolve_with_id(
        &self,
        headers: &HeaderMap,
        request_id: Uuid,
    ) -> Result<RequestContext, RoutingError> {
        let reason = match self.extract_candidate(headers) {
            Candidate::Absent(reason) => reason,
            Candidate::Identifier { value, .. } if self.is_reserved(&value) => {
                debug!(%request_id, candidate = %value, "Reserved tenant identifier");
                FallbackReason::Reserved
            }
            Candidate::Identifier { value, source } => match self.directory.lookup(&value) {
                Ok(tenant) => {
                    debug!(
                        %request_id,
                        tenant = %tenant.name,
                        schema = %tenant.schema_name,
                        source = source.as_str(),
                        "Resolved tenant"
                    );
                    let partition = self.layout.activate(&tenant.schema_name);
                    record_resolution(source.as_str());
                    return Ok(RequestContext::for_tenant(
                        request_id, tenant, partition, source,
                    ));
                }
                Err(e) if e.is_storage_failure() => {
                    error!(%request_id, candidate = %value, error = %e, "Tenant directory lookup failed");
                    if self.config.on_directory_error == DirectoryErrorPolicy::Reject {
                        record_resolution("rejected");
                        return Err(RoutingError::DirectoryUnavailable {
                            candidate: value,
                            source: e,
                        });
                    }
                    FallbackReason::DirectoryUnavailable
                }
                Err(e) => {
                    warn!(%request_id, candidate = %value, error = %e, "Tenant not found, using public schema");
                    FallbackReason::TenantNotFound
                }
            },
        };

        Ok(self.fallback(request_id, reason))
    }

    fn fallback(&self, request_id: Uuid, reason: FallbackReason) -> RequestContext {
        let partition = self.layout.activate(PUBLIC_SCHEMA);

        let public_tenant = match self.directory.lookup(PUBLIC_SCHEMA) {
            Ok(tenant) => Some(tenant),
            Err(e) => {
                warn!(%request_id, error = %e, "Public tenant unavailable, continuing without tenant");
                None
            }
        };

        debug!(%request_id, reason = reason.as_str(), "Using public schema");
        record_resolution(reason.as_str());
        RequestContext::for_public(request_id, public_tenant, partition, reason)
    }
}

/// Read a header name from the environment, keeping `default` when unset
fn env_header(key: &str, default: HeaderName) -> Result<HeaderName, String> {
    match std::env::var(key) {
        Ok(value) => HeaderName::from_bytes(value.trim().as_bytes())
            .map_err(|e| format!("{} is not a valid header name: {}", key, e)),
        Err(_) => Ok(default),
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &HeaderName) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Drop a trailing `:port` from a host
fn strip_port(host: &str) -> &str {
    match host.rsplit_once(':') {
        Some((name, port)) if !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()) => name,
        _ => host,
    }
}

#[cfg(feature = "metrics")]
fn record_resolution(outcome: &str) {
    crate::metrics::record_tenant_resolution(outcome);
}

#[cfg(not(feature = "metrics"))]
fn record_resolution(_outcome: &str) {}

/// Tenant routing middleware
///
/// Resolves the request and inserts its [`RequestContext`] into the request
/// extensions. A request that already carries a context is passed through
/// untouched, so a request is never routed twice.
///
/// # Error Responses
///
/// - **503 Service Unavailable**: directory unreadable and the policy is
///   [`DirectoryErrorPolicy::Reject`]
pub async fn tenant_router_middleware(
    State(router): State<Arc<TenantRouter>>,
    mut req: Request,
    next: Next,
) -> Response {
    if let Some(existing) = req.extensions().get::<RequestContext>() {
        debug!(context = %existing, "Request context already installed");
        return next.run(req).await;
    }

    let request_id = Uuid::new_v4();
    let headers = req.headers().clone();

    // Directory lookups block on SQLite, keep them off the async workers
    let resolved =
        tokio::task::spawn_blocking(move || router.resolve_with_id(&headers, request_id)).await;

    let context = match resolved {
        Ok(Ok(context)) => context,
        Ok(Err(e)) => {
            warn!(%request_id, error = %e, "Rejecting request");
            return e.into_response_for(request_id);
        }
        Err(e) => {
            return internal_error(
                format!("tenant resolution task failed: {}", e),
                Some(request_id),
            )
            .into_response();
        }
    };

    req.extensions_mut().insert(context);
    let mut response = next.run(req).await;

    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

/// Middleware to require a resolved tenant (returns 404 if absent)
///
/// Use on route tables whose handlers read tenant metadata.
pub async fn require_tenant_middleware(req: Request, next: Next) -> Response {
    match req.extensions().get::<RequestContext>() {
        Some(ctx) if ctx.tenant().is_some() => next.run(req).await,
        Some(ctx) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "No tenant is associated with this request".to_string(),
                request_id: Some(ctx.request_id().to_string()),
            }),
        )
            .into_response(),
        None => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: "Tenant routing did not run for this request".to_string(),
                request_id: None,
            }),
        )
            .into_response(),
    }
}
