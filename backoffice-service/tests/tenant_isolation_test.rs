//! Cross-organization isolation tests.

mod common;

use backoffice_service::domain::Role;
use common::{id_of, json, TestApp};
use serde_json::json;

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn organization_cannot_read_another_organizations_client() {
    // Arrange
    let app = TestApp::spawn().await.expect("Failed to spawn test app");
    let org_a = app.seed_tenant().await;
    let org_b = app.seed_tenant().await;
    let client_a = app.create_client(&org_a.token).await;

    // Act
    let direct = app.get(&format!("/api/clients/{}", client_a), &org_b.token).await;
    let listed = json(app.get("/api/clients", &org_b.token).await).await;

    // Assert
    assert_eq!(direct.status(), 404);
    assert_eq!(listed["pagination"]["total"], 0);
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn foreign_documents_are_invisible() {
    // Arrange
    let app = TestApp::spawn().await.expect("Failed to spawn test app");
    let org_a = app.seed_tenant().await;
    let org_b = app.seed_tenant().await;
    let client_a = app.create_client(&org_a.token).await;
    let quotation = id_of(&app.create_quotation(&org_a.token, client_a).await);

    // Act
    let get = app.get(&format!("/api/quotations/{}", quotation), &org_b.token).await;
    let send = app
        .post(
            &format!("/api/quotations/{}/send", quotation),
            &org_b.token,
            &serde_json::Value::Null,
        )
        .await;
    let delete = app
        .delete(&format!("/api/quotations/{}", quotation), &org_b.token)
        .await;

    // Assert
    assert_eq!(get.status(), 404);
    assert_eq!(send.status(), 404);
    assert_eq!(delete.status(), 404);
    let still_there = app.get(&format!("/api/quotations/{}", quotation), &org_a.token).await;
    assert_eq!(still_there.status(), 200);
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn quotation_cannot_reference_foreign_client() {
    // Arrange
    let app = TestApp::spawn().await.expect("Failed to spawn test app");
    let org_a = app.seed_tenant().await;
    let org_b = app.seed_tenant().await;
    let client_a = app.create_client(&org_a.token).await;

    // Act
    let response = app
        .post(
            "/api/quotations",
            &org_b.token,
            &json!({ "client_id": client_a, "title": "Poached" }),
        )
        .await;

    // Assert
    assert_eq!(response.status(), 400);
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn ticket_cannot_be_assigned_across_organizations() {
    // Arrange
    let app = TestApp::spawn().await.expect("Failed to spawn test app");
    let org_a = app.seed_tenant().await;
    let org_b = app.seed_tenant().await;

    // Act
    let response = app
        .post(
            "/api/tickets",
            &org_b.token,
            &json!({ "subject": "Help", "assigned_to": org_a.admin.id }),
        )
        .await;

    // Assert
    assert_eq!(response.status(), 422);
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn super_admin_selects_organization_by_header() {
    // Arrange
    let app = TestApp::spawn().await.expect("Failed to spawn test app");
    let org_a = app.seed_tenant().await;
    let org_b = app.seed_tenant().await;
    let client_a = app.create_client(&org_a.token).await;
    let super_admin = app.create_user(None, Role::SuperAdmin).await;
    let token = app.token(&super_admin);

    // Act
    let in_a = app
        .get_in(&format!("/api/clients/{}", client_a), &token, org_a.id())
        .await;
    let in_b = app
        .get_in(&format!("/api/clients/{}", client_a), &token, org_b.id())
        .await;

    // Assert
    assert_eq!(in_a.status(), 200);
    assert_eq!(in_b.status(), 404);
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn member_sees_only_own_organization() {
    // Arrange
    let app = TestApp::spawn().await.expect("Failed to spawn test app");
    let org_a = app.seed_tenant().await;
    let org_b = app.seed_tenant().await;

    // Act
    let listed = json(app.get("/api/organizations", &org_a.token).await).await;
    let foreign = app
        .get(&format!("/api/organizations/{}", org_b.id()), &org_a.token)
        .await;
    let own = app
        .get(&format!("/api/organizations/{}", org_a.id()), &org_a.token)
        .await;

    // Assert
    assert_eq!(listed["pagination"]["total"], 1);
    assert_eq!(listed["data"][0]["id"], org_a.id().to_string());
    assert_eq!(foreign.status(), 404);
    assert_eq!(own.status(), 200);
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn document_numbers_are_scoped_per_organization() {
    // Arrange
    let app = TestApp::spawn().await.expect("Failed to spawn test app");
    let org_a = app.seed_tenant().await;
    let org_b = app.seed_tenant().await;
    let client_a = app.create_client(&org_a.token).await;
    let client_b = app.create_client(&org_b.token).await;

    // Act
    let first_a = app.create_quotation(&org_a.token, client_a).await;
    let first_b = app.create_quotation(&org_b.token, client_b).await;

    // Assert
    assert_eq!(first_a["quotation_number"], first_b["quotation_number"]);
    assert!(first_a["quotation_number"]
        .as_str()
        .unwrap()
        .ends_with("-0001"));
}
