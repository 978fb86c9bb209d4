//! Order and invoice lifecycle integration tests.

mod common;

use common::{id_of, json, TestApp};
use serde_json::{json, Value};
use uuid::Uuid;

async fn create_order(app: &TestApp, token: &str, client_id: Uuid) -> Uuid {
    let response = app
        .post(
            "/api/orders",
            token,
            &json!({
                "client_id": client_id,
                "currency": "USD",
                "tax_rate": "10",
                "items": [{ "description": "Hosting", "quantity": "3", "unit_price": "20.00" }]
            }),
        )
        .await;
    assert_eq!(response.status(), 201);
    id_of(&json(response).await)
}

async fn set_status(app: &TestApp, token: &str, path: &str, status: &str) -> reqwest::Response {
    app.post(path, token, &json!({ "status": status })).await
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn create_order_starts_pending_with_totals() {
    // Arrange
    let app = TestApp::spawn().await.expect("Failed to spawn test app");
    let tenant = app.seed_tenant().await;
    let client_id = app.create_client(&tenant.token).await;

    // Act
    let id = create_order(&app, &tenant.token, client_id).await;

    // Assert
    let body = json(app.get(&format!("/api/orders/{}", id), &tenant.token).await).await;
    assert_eq!(body["status"], "pending");
    assert_eq!(body["subtotal"], "60.00");
    assert_eq!(body["tax_amount"], "6.00");
    assert_eq!(body["total_amount"], "66.00");
    assert!(body["order_number"].as_str().unwrap().starts_with("ORD-"));
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn order_moves_forward_and_cannot_go_back() {
    // Arrange
    let app = TestApp::spawn().await.expect("Failed to spawn test app");
    let tenant = app.seed_tenant().await;
    let client_id = app.create_client(&tenant.token).await;
    let id = create_order(&app, &tenant.token, client_id).await;
    let path = format!("/api/orders/{}/status", id);

    // Act
    let mut statuses = Vec::new();
    for target in ["confirmed", "processing", "completed"] {
        let response = set_status(&app, &tenant.token, &path, target).await;
        assert_eq!(response.status(), 200, "transition to {}", target);
        statuses.push(json(response).await["status"].clone());
    }
    let backwards = set_status(&app, &tenant.token, &path, "pending").await;

    // Assert
    assert_eq!(statuses, vec!["confirmed", "processing", "completed"]);
    assert_eq!(backwards.status(), 409);
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn confirmed_order_items_are_frozen() {
    // Arrange
    let app = TestApp::spawn().await.expect("Failed to spawn test app");
    let tenant = app.seed_tenant().await;
    let client_id = app.create_client(&tenant.token).await;
    let id = create_order(&app, &tenant.token, client_id).await;
    set_status(&app, &tenant.token, &format!("/api/orders/{}/status", id), "confirmed").await;

    // Act
    let replace = app
        .put(
            &format!("/api/orders/{}/items", id),
            &tenant.token,
            &json!({ "items": [{ "description": "X", "quantity": "1", "unit_price": "1" }] }),
        )
        .await;
    let delete = app.delete(&format!("/api/orders/{}", id), &tenant.token).await;

    // Assert
    assert_eq!(replace.status(), 409);
    assert_eq!(delete.status(), 409);
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn pending_order_cannot_be_invoiced() {
    // Arrange
    let app = TestApp::spawn().await.expect("Failed to spawn test app");
    let tenant = app.seed_tenant().await;
    let client_id = app.create_client(&tenant.token).await;
    let id = create_order(&app, &tenant.token, client_id).await;

    // Act
    let response = app
        .post(&format!("/api/orders/{}/invoice", id), &tenant.token, &Value::Null)
        .await;

    // Assert
    assert_eq!(response.status(), 409);
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn confirmed_order_is_invoiced_once() {
    // Arrange
    let app = TestApp::spawn().await.expect("Failed to spawn test app");
    let tenant = app.seed_tenant().await;
    let client_id = app.create_client(&tenant.token).await;
    let id = create_order(&app, &tenant.token, client_id).await;
    set_status(&app, &tenant.token, &format!("/api/orders/{}/status", id), "confirmed").await;
    let path = format!("/api/orders/{}/invoice", id);

    // Act
    let first = app
        .post(&path, &tenant.token, &json!({ "date": "2030-05-01", "due_date": "2030-05-15" }))
        .await;
    let second = app.post(&path, &tenant.token, &Value::Null).await;

    // Assert
    assert_eq!(first.status(), 201);
    let invoice = json(first).await;
    assert_eq!(invoice["status"], "draft");
    assert_eq!(invoice["order_id"], id.to_string());
    assert_eq!(invoice["total_amount"], "66.00");
    assert_eq!(invoice["items"].as_array().unwrap().len(), 1);
    assert_eq!(second.status(), 409);
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn invoice_due_date_cannot_precede_issue_date() {
    // Arrange
    let app = TestApp::spawn().await.expect("Failed to spawn test app");
    let tenant = app.seed_tenant().await;
    let client_id = app.create_client(&tenant.token).await;

    // Act
    let response = app
        .post(
            "/api/invoices",
            &tenant.token,
            &json!({
                "client_id": client_id,
                "issue_date": "2030-06-10",
                "due_date": "2030-06-01"
            }),
        )
        .await;

    // Assert
    assert_eq!(response.status(), 422);
    let body = json(response).await;
    assert_eq!(body["details"]["due_date"][0]["code"], "before_issue_date");
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn paying_invoice_stamps_paid_at() {
    // Arrange
    let app = TestApp::spawn().await.expect("Failed to spawn test app");
    let tenant = app.seed_tenant().await;
    let client_id = app.create_client(&tenant.token).await;
    let response = app
        .post(
            "/api/invoices",
            &tenant.token,
            &json!({
                "client_id": client_id,
                "items": [{ "description": "Audit", "quantity": "1", "unit_price": "500" }]
            }),
        )
        .await;
    assert_eq!(response.status(), 201);
    let created = json(response).await;
    assert!(created["paid_at"].is_null());
    let path = format!("/api/invoices/{}/status", id_of(&created));

    // Act
    let sent = set_status(&app, &tenant.token, &path, "sent").await;
    let paid = set_status(&app, &tenant.token, &path, "paid").await;
    let reopened = set_status(&app, &tenant.token, &path, "draft").await;

    // Assert
    assert_eq!(sent.status(), 200);
    assert_eq!(paid.status(), 200);
    let body = json(paid).await;
    assert_eq!(body["status"], "paid");
    assert!(body["paid_at"].is_string());
    assert_eq!(reopened.status(), 409);
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn only_draft_invoices_can_be_deleted() {
    // Arrange
    let app = TestApp::spawn().await.expect("Failed to spawn test app");
    let tenant = app.seed_tenant().await;
    let client_id = app.create_client(&tenant.token).await;
    let draft = id_of(&json(
        app.post("/api/invoices", &tenant.token, &json!({ "client_id": client_id }))
            .await,
    )
    .await);
    let sent = id_of(&json(
        app.post("/api/invoices", &tenant.token, &json!({ "client_id": client_id }))
            .await,
    )
    .await);
    set_status(&app, &tenant.token, &format!("/api/invoices/{}/status", sent), "sent").await;

    // Act
    let delete_draft = app.delete(&format!("/api/invoices/{}", draft), &tenant.token).await;
    let delete_sent = app.delete(&format!("/api/invoices/{}", sent), &tenant.token).await;

    // Assert
    assert_eq!(delete_draft.status(), 204);
    assert_eq!(delete_sent.status(), 409);
    let missing = app.get(&format!("/api/invoices/{}", draft), &tenant.token).await;
    assert_eq!(missing.status(), 404);
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn invoices_filter_by_status() {
    // Arrange
    let app = TestApp::spawn().await.expect("Failed to spawn test app");
    let tenant = app.seed_tenant().await;
    let client_id = app.create_client(&tenant.token).await;
    for _ in 0..2 {
        app.post("/api/invoices", &tenant.token, &json!({ "client_id": client_id }))
            .await;
    }
    let sent = id_of(&json(
        app.post("/api/invoices", &tenant.token, &json!({ "client_id": client_id }))
            .await,
    )
    .await);
    set_status(&app, &tenant.token, &format!("/api/invoices/{}/status", sent), "sent").await;

    // Act
    let body = json(app.get("/api/invoices?status=draft", &tenant.token).await).await;

    // Assert
    assert_eq!(body["pagination"]["total"], 2);
    assert!(body["data"]
        .as_array()
        .unwrap()
        .iter()
        .all(|invoice| invoice["status"] == "draft"));
}
