//! Prometheus metrics for the OrderUp tenancy API
//!
//! This module is only compiled when the `metrics` feature is enabled.
//!
//! - `http_requests_total` - Counter for total HTTP requests
//! - `http_request_duration_seconds` - Histogram for request latencies
//! - `tenant_resolutions_total` - Counter of routing outcomes
//!   (`header`, `host`, or a fallback reason such as `tenant_not_found`)
//! - `tenant_http_requests_total` - Counter per resolved schema
//!
//! ## Cardinality Warning
//!
//! `tenant_http_requests_total` carries a `schema` label and so grows one time
//! series per tenant. Drop it with metric relabeling on large deployments.

use crate::context::RequestContext;
use axum::{
    extract::{MatchedPath, Request},
    http::StatusCode,
    middleware::Next,
    response::IntoResponse,
};
use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};
use std::time::Instant;

lazy_static! {
    /// Counter for total HTTP requests by method, path, and status
    pub static ref HTTP_REQUESTS_TOTAL: CounterVec = register_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .unwrap();

    /// Histogram for HTTP request duration in seconds
    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request latency in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap();

    /// Counter for tenant routing outcomes
    pub static ref TENANT_RESOLUTIONS_TOTAL: CounterVec = register_counter_vec!(
        "tenant_resolutions_total",
        "Tenant routing outcomes",
        &["outcome"]
    )
    .unwrap();

    /// Counter for HTTP requests per resolved schema
    pub static ref TENANT_HTTP_REQUESTS_TOTAL: CounterVec = register_counter_vec!(
        "tenant_http_requests_total",
        "Total HTTP requests per resolved schema",
        &["schema", "namespace", "status"]
    )
    .unwrap();
}

/// `path` label for requests that matched no route
pub const UNMATCHED_PATH: &str = "<unmatched>";

/// Middleware to track HTTP metrics
///
/// Layered onto each route table, inside tenant routing, so both the matched
/// route template and the request context are visible. Raw request paths are
/// never used as labels.
pub async fn track_metrics(req: Request, next: Next) -> impl IntoResponse {
    let start = Instant::now();
    let method = req.method().to_string();
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| UNMATCHED_PATH.to_string());

    let routed = req
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| (ctx.schema_name().to_string(), ctx.namespace().as_str()));

    let response = next.run(req).await;
    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    HTTP_REQUESTS_TOTAL
        .with_label_values(&[&method, &path, &status])
        .inc();

    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[&method, &path])
        .observe(duration);

    if let Some((schema, namespace)) = routed {
        TENANT_HTTP_REQUESTS_TOTAL
            .with_label_values(&[&schema, namespace, &status])
            .inc();
    }

    response
}

/// Handler for the `/metrics` endpoint
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = vec![];

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => (
            StatusCode::OK,
            [("content-type", encoder.format_type())],
            buffer,
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to encode metrics: {}", e),
        )
            .into_response(),
    }
}

/// Record one routing outcome
pub fn record_tenant_resolution(outcome: &str) {
    TENANT_RESOLUTIONS_TOTAL.with_label_values(&[outcome]).inc();
}
