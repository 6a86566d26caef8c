//! Per-request tenant context
//!
//! A [`RequestContext`] is built once by the tenant router at the start of a
//! request and travels with that request only, in its extensions. Handlers
//! extract it with `Extension<RequestContext>`; nothing about the active
//! tenant lives in process-wide state.

use orderup_tenancy_core::Tenant;
use orderup_tenancy_storage::PartitionHandle;
use uuid::Uuid;

/// Which route table serves the request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Shared, un-partitioned namespace
    Public,
    /// A single tenant's namespace
    Tenant,
}

impl Namespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Public => "public",
            Namespace::Tenant => "tenant",
        }
    }
}

impl std::fmt::Display for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a tenant identifier was read from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TenantSource {
    /// Explicit tenant header
    Header,
    /// Leading label of the host header
    Host,
}

impl TenantSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TenantSource::Header => "header",
            TenantSource::Host => "host",
        }
    }
}

/// Why a request ended up in the shared namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    /// The request named no tenant
    NoCandidate,
    /// The request named a reserved identifier
    Reserved,
    /// The host header had no subdomain separator
    AmbiguousHost,
    /// The named tenant is not in the directory
    TenantNotFound,
    /// The directory could not be read
    DirectoryUnavailable,
}

impl FallbackReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FallbackReason::NoCandidate => "no_candidate",
            FallbackReason::Reserved => "reserved",
            FallbackReason::AmbiguousHost => "ambiguous_host",
            FallbackReason::TenantNotFound => "tenant_not_found",
            FallbackReason::DirectoryUnavailable => "directory_unavailable",
        }
    }
}

/// Outcome of tenant resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Tenant { source: TenantSource },
    Fallback { reason: FallbackReason },
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Resolution::Tenant { source } => write!(f, "tenant({})", source.as_str()),
            Resolution::Fallback { reason } => write!(f, "fallback({})", reason.as_str()),
        }
    }
}

/// Tenant, partition and route table selected for one request
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: Uuid,
    tenant: Option<Tenant>,
    partition: PartitionHandle,
    namespace: Namespace,
    resolution: Resolution,
}

impl RequestContext {
    /// Context for a request routed to a tenant's own partition
    pub(crate) fn for_tenant(
        request_id: Uuid,
        tenant: Tenant,
        partition: PartitionHandle,
        source: TenantSource,
    ) -> Self {
        Self {
            request_id,
            tenant: Some(tenant),
            partition,
            namespace: Namespace::Tenant,
            resolution: Resolution::Tenant { source },
        }
    }

    /// Context for a request served from the shared namespace
    pub(crate) fn for_public(
        request_id: Uuid,
        public_tenant: Option<Tenant>,
        partition: PartitionHandle,
        reason: FallbackReason,
    ) -> Self {
        Self {
            request_id,
            tenant: public_tenant,
            partition,
            namespace: Namespace::Public,
            resolution: Resolution::Fallback { reason },
        }
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    /// Resolved tenant, if any. In the public namespace this is the public
    /// entry, or `None` when even that could not be loaded.
    pub fn tenant(&self) -> Option<&Tenant> {
        self.tenant.as_ref()
    }

    pub fn partition(&self) -> &PartitionHandle {
        &self.partition
    }

    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Schema name of the active partition
    pub fn schema_name(&self) -> &str {
        self.partition.schema_name()
    }

    pub fn is_public(&self) -> bool {
        self.namespace == Namespace::Public
    }
}

impl std::fmt::Display for RequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}[{}]", self.schema_name(), self.resolution)
    }
}
