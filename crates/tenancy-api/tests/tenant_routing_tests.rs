//! Integration tests for tenant routing
//!
//! Drive the full application (tenant router, dispatch, both route tables)
//! against a real SQLite directory in a temporary data directory.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    response::Response,
    Router,
};
use orderup_tenancy_api::{build_app, routes::AppState, tenant_router::RouterConfig};
use orderup_tenancy_core::{Branding, NewTenant};
use orderup_tenancy_storage::{PartitionLayout, SqliteTenantDirectory, TenantDirectory};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

// =============================================================================
// Test Helper Functions
// =============================================================================

struct TestApp {
    _dir: TempDir,
    app: Router,
    directory: Arc<SqliteTenantDirectory>,
    layout: PartitionLayout,
}

fn setup() -> TestApp {
    setup_with(RouterConfig::default())
}

fn setup_with(config: RouterConfig) -> TestApp {
    let dir = TempDir::new().unwrap();
    let layout = PartitionLayout::new(dir.path());
    let directory = Arc::new(SqliteTenantDirectory::new(
        layout.directory_path(),
        "localhost",
    ));
    directory.initialize().unwrap();

    for (schema, name, color, font) in [
        ("pizza", "Pizza Lover", "#e63946", "Roboto"),
        ("sushi", "Sushi Master", "#2a9d8f", "Lato"),
    ] {
        directory
            .register(
                NewTenant::new(schema, name, format!("{}.localhost", schema)).with_branding(
                    Branding {
                        primary_color: color.to_string(),
                        font_family: font.to_string(),
                        logo_url: Some(format!("https://img.icons8.com/color/96/{}.png", schema)),
                    },
                ),
            )
            .unwrap();
        layout.provision(schema).unwrap();
    }

    let state = AppState {
        directory: directory.clone(),
        layout: layout.clone(),
    };

    TestApp {
        _dir: dir,
        app: build_app(state, config),
        directory,
        layout,
    }
}

async fn send(app: &Router, path: &str, headers: &[(&str, &str)]) -> Response {
    let mut builder = Request::builder().uri(path);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    app.clone()
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn body_string(response: Response) -> String {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(body.to_vec()).unwrap()
}

async fn body_json(response: Response) -> Value {
    serde_json::from_str(&body_string(response).await).unwrap()
}

// =============================================================================
// Landing pages
// =============================================================================

#[tokio::test]
async fn test_explicit_header_selects_tenant() {
    let t = setup();
    let response = send(&t.app, "/", &[("X-Tenant-Subdomain", "pizza")]).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "<h1>Welcome to Pizza Lover</h1>");
}

#[tokio::test]
async fn test_host_header_selects_tenant() {
    let t = setup();
    let response = send(&t.app, "/", &[("X-Tenant-Host", "sushi.localhost")]).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "<h1>Welcome to Sushi Master</h1>");
}

#[tokio::test]
async fn test_host_header_with_port() {
    let t = setup();
    let response = send(&t.app, "/", &[("X-Tenant-Host", "sushi.localhost:3000")]).await;

    assert_eq!(body_string(response).await, "<h1>Welcome to Sushi Master</h1>");
}

#[tokio::test]
async fn test_bare_base_host_serves_public_landing() {
    let t = setup();
    let response = send(&t.app, "/", &[("X-Tenant-Host", "localhost")]).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_string(response).await,
        "<h1>Welcome to OrderUp Platform</h1>"
    );
}

#[tokio::test]
async fn test_no_headers_serves_public_landing() {
    let t = setup();
    let response = send(&t.app, "/", &[]).await;

    assert_eq!(
        body_string(response).await,
        "<h1>Welcome to OrderUp Platform</h1>"
    );
}

#[tokio::test]
async fn test_unknown_tenant_falls_back_without_error() {
    let t = setup();
    let response = send(&t.app, "/", &[("X-Tenant-Subdomain", "nonexistent")]).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_string(response).await,
        "<h1>Welcome to OrderUp Platform</h1>"
    );
}

#[tokio::test]
async fn test_blank_header_uses_host() {
    let t = setup();
    let response = send(
        &t.app,
        "/",
        &[("X-Tenant-Subdomain", ""), ("X-Tenant-Host", "pizza.localhost")],
    )
    .await;

    assert_eq!(body_string(response).await, "<h1>Welcome to Pizza Lover</h1>");
}

#[tokio::test]
async fn test_explicit_header_wins_over_host() {
    let t = setup();
    let response = send(
        &t.app,
        "/",
        &[
            ("X-Tenant-Subdomain", "pizza"),
            ("X-Tenant-Host", "sushi.localhost"),
        ],
    )
    .await;

    assert_eq!(body_string(response).await, "<h1>Welcome to Pizza Lover</h1>");
}

#[tokio::test]
async fn test_reserved_identifiers_serve_public() {
    let t = setup();
    for value in ["public", "www", "localhost"] {
        let response = send(&t.app, "/", &[("X-Tenant-Subdomain", value)]).await;
        assert_eq!(
            body_string(response).await,
            "<h1>Welcome to OrderUp Platform</h1>",
            "identifier {}",
            value
        );
    }
}

// =============================================================================
// Tenant metadata and route tables
// =============================================================================

#[tokio::test]
async fn test_tenant_branding() {
    let t = setup();
    let response = send(&t.app, "/api/tenant/", &[("X-Tenant-Host", "pizza.localhost")]).await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["name"], "Pizza Lover");
    assert_eq!(json["schema_name"], "pizza");
    assert_eq!(json["primary_color"], "#e63946");
    assert_eq!(json["font_family"], "Roboto");
    assert_eq!(json["logo_url"], "https://img.icons8.com/color/96/pizza.png");
}

#[tokio::test]
async fn test_public_branding_uses_defaults() {
    let t = setup();
    let response = send(&t.app, "/api/tenant", &[]).await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["name"], "Public Tenant");
    assert_eq!(json["schema_name"], "public");
    assert_eq!(json["primary_color"], "#000000");
    assert_eq!(json["font_family"], "Inter");
    assert!(json["logo_url"].is_null());
}

#[tokio::test]
async fn test_public_only_route_is_absent_for_tenants() {
    let t = setup();

    let public = send(&t.app, "/api/tenants", &[]).await;
    assert_eq!(public.status(), StatusCode::OK);
    let json = body_json(public).await;
    assert_eq!(json["tenants"].as_array().unwrap().len(), 3);

    let tenant = send(&t.app, "/api/tenants", &[("X-Tenant-Subdomain", "pizza")]).await;
    assert_eq!(tenant.status(), StatusCode::NOT_FOUND);
    let json = body_json(tenant).await;
    assert!(json["error"].as_str().unwrap().contains("tenant namespace"));
    assert!(json["request_id"].is_string());
}

#[tokio::test]
async fn test_tenant_only_route_is_absent_for_public() {
    let t = setup();
    let response = send(&t.app, "/api/partition", &[]).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_partition_reports_its_own_owner() {
    let t = setup();
    for schema in ["pizza", "sushi"] {
        let response = send(&t.app, "/api/partition", &[("X-Tenant-Subdomain", schema)]).await;
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["schema_name"], schema);
        assert_eq!(json["owner"], schema);
    }
}

#[tokio::test]
async fn test_response_carries_request_id() {
    let t = setup();
    let response = send(&t.app, "/", &[("X-Tenant-Subdomain", "pizza")]).await;

    let header = response.headers().get("x-request-id").unwrap();
    assert!(uuid::Uuid::parse_str(header.to_str().unwrap()).is_ok());
}

#[tokio::test]
async fn test_health_bypasses_routing() {
    let t = setup();
    let response = send(&t.app, "/health", &[("X-Tenant-Subdomain", "pizza")]).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("x-request-id").is_none());
    assert_eq!(body_string(response).await, "OK");
}

#[tokio::test]
async fn test_health_trailing_slash() {
    let t = setup();
    let response = send(&t.app, "/health/", &[("X-Tenant-Host", "sushi.localhost")]).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "OK");
}

// =============================================================================
// Registration
// =============================================================================

async fn post_tenant(app: &Router, body: Value) -> Response {
    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/tenants")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn test_register_then_route() {
    let t = setup();
    let response = post_tenant(
        &t.app,
        json!({
            "schema_name": "tacos",
            "name": "Taco Town",
            "domain": "tacos.localhost",
            "primary_color": "#f4a261"
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let json = body_json(response).await;
    assert_eq!(json["schema_name"], "tacos");
    assert_eq!(json["font_family"], "Inter");
    assert!(t.layout.partition_path("tacos").exists());

    let response = send(&t.app, "/", &[("X-Tenant-Host", "tacos.localhost")]).await;
    assert_eq!(body_string(response).await, "<h1>Welcome to Taco Town</h1>");
}

#[tokio::test]
async fn test_register_duplicate_conflicts() {
    let t = setup();
    let response = post_tenant(
        &t.app,
        json!({"schema_name": "pizza", "name": "Pizza Again", "domain": "pizza2.localhost"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_register_reserved_is_bad_request() {
    let t = setup();
    for schema in ["public", "www", "localhost", "Bad Name"] {
        let response = post_tenant(
            &t.app,
            json!({"schema_name": schema, "name": "Nope", "domain": "nope.localhost"}),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "schema {}", schema);
    }
}

#[tokio::test]
async fn test_base_host_label_cannot_be_registered() {
    let t = setup();
    let response = post_tenant(
        &t.app,
        json!({"schema_name": "localhost", "name": "Shadow", "domain": "localhost"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(!t.layout.partition_path("localhost").exists());
    assert!(t.directory.lookup("localhost").unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_register_is_public_only() {
    let t = setup();
    let response = t
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/tenants")
                .header("X-Tenant-Subdomain", "pizza")
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({"schema_name": "tacos", "name": "Taco Town", "domain": "tacos.localhost"})
                        .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(t.directory.lookup("tacos").unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_removed_tenant_falls_back() {
    let t = setup();
    t.directory.remove("sushi").unwrap();

    let response = send(&t.app, "/", &[("X-Tenant-Host", "sushi.localhost")]).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_string(response).await,
        "<h1>Welcome to OrderUp Platform</h1>"
    );
}
