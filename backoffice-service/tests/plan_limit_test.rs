//! Plan limits and user administration tests.

mod common;

use backoffice_service::domain::Role;
use common::{create_test_config, id_of, json, TestApp};
use serde_json::json;

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn project_limit_blocks_extra_project() {
    // Arrange
    let app = TestApp::spawn().await.expect("Failed to spawn test app");
    let tenant = app.seed_tenant_with_limits(None, Some(2)).await;
    let client_id = app.create_client(&tenant.token).await;
    let project = |name: &str| json!({ "client_id": client_id, "name": name });

    // Act
    let first = app.post("/api/projects", &tenant.token, &project("One")).await;
    let second = app.post("/api/projects", &tenant.token, &project("Two")).await;
    let third = app.post("/api/projects", &tenant.token, &project("Three")).await;

    // Assert
    assert_eq!(first.status(), 201);
    assert_eq!(second.status(), 201);
    assert_eq!(third.status(), 409);
    let body = json(third).await;
    assert!(body["error"].as_str().unwrap().contains("Plan limit"));
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn user_limit_counts_only_active_users() {
    // Arrange
    let app = TestApp::spawn().await.expect("Failed to spawn test app");
    let tenant = app.seed_tenant_with_limits(Some(2), None).await;
    let user = |email: &str| json!({ "email": email, "full_name": "Staff", "role": "staff" });
    let suffix = uuid::Uuid::new_v4().simple().to_string();

    // Act
    let second = app
        .post("/api/users", &tenant.token, &user(&format!("b-{}@example.com", suffix)))
        .await;
    let third = app
        .post("/api/users", &tenant.token, &user(&format!("c-{}@example.com", suffix)))
        .await;

    // Assert
    assert_eq!(second.status(), 201);
    assert_eq!(third.status(), 409);

    // Deactivating frees a seat
    let second_id = id_of(&json(second).await);
    let deactivated = app
        .delete(&format!("/api/users/{}", second_id), &tenant.token)
        .await;
    assert_eq!(deactivated.status(), 204);
    let replacement = app
        .post("/api/users", &tenant.token, &user(&format!("d-{}@example.com", suffix)))
        .await;
    assert_eq!(replacement.status(), 201);

    // Reactivating would exceed the plan
    let reactivated = app
        .patch(
            &format!("/api/users/{}", second_id),
            &tenant.token,
            &json!({ "is_active": true }),
        )
        .await;
    assert_eq!(reactivated.status(), 409);
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn limits_are_ignored_when_enforcement_is_off() {
    // Arrange
    let mut config = create_test_config();
    config.policy.enforce_plan_limits = false;
    let app = TestApp::spawn_with(config)
        .await
        .expect("Failed to spawn test app");
    let tenant = app.seed_tenant_with_limits(Some(1), None).await;

    // Act
    let response = app
        .post(
            "/api/users",
            &tenant.token,
            &json!({
                "email": format!("extra-{}@example.com", uuid::Uuid::new_v4().simple()),
                "full_name": "Extra",
                "role": "viewer"
            }),
        )
        .await;

    // Assert
    assert_eq!(response.status(), 201);
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn admin_cannot_grant_super_admin() {
    // Arrange
    let app = TestApp::spawn().await.expect("Failed to spawn test app");
    let tenant = app.seed_tenant().await;

    // Act
    let response = app
        .post(
            "/api/users",
            &tenant.token,
            &json!({
                "email": format!("root-{}@example.com", uuid::Uuid::new_v4().simple()),
                "full_name": "Root",
                "role": "super_admin"
            }),
        )
        .await;

    // Assert
    assert_eq!(response.status(), 403);
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn users_cannot_deactivate_themselves() {
    // Arrange
    let app = TestApp::spawn().await.expect("Failed to spawn test app");
    let tenant = app.seed_tenant().await;

    // Act
    let response = app
        .delete(&format!("/api/users/{}", tenant.admin.id), &tenant.token)
        .await;

    // Assert
    assert_eq!(response.status(), 400);
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn duplicate_email_conflicts() {
    // Arrange
    let app = TestApp::spawn().await.expect("Failed to spawn test app");
    let tenant = app.seed_tenant().await;
    let (_, manager_token) = app.member(&tenant, Role::Manager).await;

    // Act
    let response = app
        .post(
            "/api/users",
            &tenant.token,
            &json!({ "email": tenant.admin.email, "full_name": "Copy", "role": "staff" }),
        )
        .await;
    let forbidden = app
        .post(
            "/api/users",
            &manager_token,
            &json!({ "email": "new@example.com", "full_name": "New", "role": "staff" }),
        )
        .await;

    // Assert
    assert_eq!(response.status(), 409);
    assert_eq!(forbidden.status(), 403);
}
