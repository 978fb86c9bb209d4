//! Authentication, tenant resolution and request validation tests.
//!
//! Every request here is rejected or answered before a query runs, so the
//! router is exercised with `oneshot` over a lazily connecting pool.

mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use backoffice_service::{build_router, config::AuthConfig, domain::Role, services::JwtService};
use common::{create_offline_state, token_for};
use http_body_util::BodyExt;
use secrecy::Secret;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

fn app() -> (Router, backoffice_service::AppState) {
    let state = create_offline_state();
    (build_router(state.clone()), state)
}

async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

fn post(uri: &str, token: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn health_check_is_public() {
    let (router, _) = app();

    let (status, body) = send(router, get("/health", None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "backoffice-service");
}

#[tokio::test]
async fn responses_carry_request_id_and_security_headers() {
    let (router, _) = app();

    let response = router
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("x-request-id", "req-42")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.headers()["x-request-id"], "req-42");
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    assert_eq!(response.headers()["x-frame-options"], "DENY");
}

#[tokio::test]
async fn missing_token_is_unauthorized() {
    let (router, _) = app();

    let (status, body) = send(router, get("/api/clients", None)).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].as_str().unwrap().contains("Authorization"));
}

#[tokio::test]
async fn malformed_token_is_unauthorized() {
    let (router, _) = app();

    let (status, body) = send(router, get("/api/clients", Some("not-a-jwt"))).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid or expired token");
}

#[tokio::test]
async fn token_signed_with_another_secret_is_unauthorized() {
    let (router, state) = app();
    let foreign = JwtService::new(&AuthConfig {
        jwt_secret: Secret::new("some-other-secret".to_string()),
        issuer: state.config.auth.issuer.clone(),
        access_token_expiry_minutes: 15,
    });
    let token = foreign
        .generate_access_token(Uuid::new_v4(), Some(Uuid::new_v4()), Role::Admin)
        .unwrap();

    let (status, _) = send(router, get("/api/clients", Some(&token))).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn viewer_cannot_create_clients() {
    let (router, state) = app();
    let token = token_for(&state, Uuid::new_v4(), Some(Uuid::new_v4()), Role::Viewer);

    let (status, body) = send(
        router,
        post("/api/clients", &token, json!({ "name": "Acme" })),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("backoffice.client:write"));
}

#[tokio::test]
async fn staff_cannot_approve_quotations() {
    let (router, state) = app();
    let token = token_for(&state, Uuid::new_v4(), Some(Uuid::new_v4()), Role::Staff);

    let (status, _) = send(
        router,
        post(
            &format!("/api/quotations/{}/approve", Uuid::new_v4()),
            &token,
            json!({ "approver_id": Uuid::new_v4() }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn member_cannot_select_another_organization() {
    let (router, state) = app();
    let token = token_for(&state, Uuid::new_v4(), Some(Uuid::new_v4()), Role::Admin);

    let request = Request::builder()
        .uri("/api/clients")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header("x-organization-id", Uuid::new_v4().to_string())
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(router, request).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn super_admin_without_organization_must_select_one() {
    let (router, state) = app();
    let token = token_for(&state, Uuid::new_v4(), None, Role::SuperAdmin);

    let (status, body) = send(router, get("/api/clients", Some(&token))).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("x-organization-id"));
}

#[tokio::test]
async fn malformed_organization_header_is_bad_request() {
    let (router, state) = app();
    let token = token_for(&state, Uuid::new_v4(), None, Role::SuperAdmin);

    let request = Request::builder()
        .uri("/api/clients")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header("x-organization-id", "acme")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(router, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_sort_column_is_rejected() {
    let (router, state) = app();
    let token = token_for(&state, Uuid::new_v4(), Some(Uuid::new_v4()), Role::Admin);

    let (status, body) = send(
        router,
        get("/api/clients?sortBy=password;drop", Some(&token)),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["details"]["sortBy"].is_array());
}

#[tokio::test]
async fn empty_client_name_fails_validation() {
    let (router, state) = app();
    let token = token_for(&state, Uuid::new_v4(), Some(Uuid::new_v4()), Role::Admin);

    let (status, body) = send(router, post("/api/clients", &token, json!({ "name": "" }))).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["details"]["name"].is_array());
}

#[tokio::test]
async fn unsupported_currency_fails_validation() {
    let (router, state) = app();
    let token = token_for(&state, Uuid::new_v4(), Some(Uuid::new_v4()), Role::Admin);

    let (status, body) = send(
        router,
        post(
            "/api/quotations",
            &token,
            json!({ "client_id": Uuid::new_v4(), "title": "Audit", "currency": "XYZ" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["details"]["currency"][0]["code"], "unsupported");
}

#[tokio::test]
async fn unknown_order_status_fails_validation() {
    let (router, state) = app();
    let token = token_for(&state, Uuid::new_v4(), Some(Uuid::new_v4()), Role::Admin);

    let (status, body) = send(
        router,
        post(
            &format!("/api/orders/{}/status", Uuid::new_v4()),
            &token,
            json!({ "status": "shipped" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["details"]["status"][0]["code"], "unknown");
}

#[tokio::test]
async fn only_super_admin_creates_organizations() {
    let (router, state) = app();
    let token = token_for(&state, Uuid::new_v4(), Some(Uuid::new_v4()), Role::Admin);

    let (status, _) = send(
        router,
        post(
            "/api/organizations",
            &token,
            json!({ "name": "Beta", "slug": "beta" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}
