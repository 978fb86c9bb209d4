//! Quotation lifecycle integration tests: send, approve, reject, expiry and
//! conversion into orders and invoices.

mod common;

use backoffice_service::domain::Role;
use common::{id_of, json, TestApp};
use serde_json::{json, Value};
use serial_test::serial;

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn sending_quotation_without_items_is_rejected() {
    // Arrange
    let app = TestApp::spawn().await.expect("Failed to spawn test app");
    let tenant = app.seed_tenant().await;
    let client_id = app.create_client(&tenant.token).await;
    let response = app
        .post(
            "/api/quotations",
            &tenant.token,
            &json!({ "client_id": client_id, "title": "Empty" }),
        )
        .await;
    let id = id_of(&json(response).await);

    // Act
    let response = app
        .post(&format!("/api/quotations/{}/send", id), &tenant.token, &Value::Null)
        .await;

    // Assert
    assert_eq!(response.status(), 422);
    let body = json(response).await;
    assert_eq!(body["details"]["items"][0]["code"], "required");
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn sending_records_sent_at() {
    // Arrange
    let app = TestApp::spawn().await.expect("Failed to spawn test app");
    let tenant = app.seed_tenant().await;
    let client_id = app.create_client(&tenant.token).await;

    // Act
    let id = app.sent_quotation(&tenant.token, client_id).await;

    // Assert
    let body = json(app.get(&format!("/api/quotations/{}", id), &tenant.token).await).await;
    assert_eq!(body["status"], "sent");
    assert!(body["sent_at"].is_string());
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn approval_requires_approver_identity() {
    // Arrange
    let app = TestApp::spawn().await.expect("Failed to spawn test app");
    let tenant = app.seed_tenant().await;
    let client_id = app.create_client(&tenant.token).await;
    let id = app.sent_quotation(&tenant.token, client_id).await;

    // Act
    let response = app
        .post(&format!("/api/quotations/{}/approve", id), &tenant.token, &json!({}))
        .await;

    // Assert
    assert_eq!(response.status(), 422);
    let body = json(response).await;
    assert_eq!(body["details"]["approver_id"][0]["code"], "required");

    let quotation = json(app.get(&format!("/api/quotations/{}", id), &tenant.token).await).await;
    assert_eq!(quotation["status"], "sent");
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn creator_cannot_approve_own_quotation() {
    // Arrange
    let app = TestApp::spawn().await.expect("Failed to spawn test app");
    let tenant = app.seed_tenant().await;
    let client_id = app.create_client(&tenant.token).await;
    let id = app.sent_quotation(&tenant.token, client_id).await;

    // Act
    let response = app
        .post(
            &format!("/api/quotations/{}/approve", id),
            &tenant.token,
            &json!({ "approver_id": tenant.admin.id }),
        )
        .await;

    // Assert
    assert_eq!(response.status(), 403);
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn distinct_manager_approves_quotation() {
    // Arrange
    let app = TestApp::spawn().await.expect("Failed to spawn test app");
    let tenant = app.seed_tenant().await;
    let client_id = app.create_client(&tenant.token).await;
    let id = app.sent_quotation(&tenant.token, client_id).await;
    let (manager, manager_token) = app.member(&tenant, Role::Manager).await;

    // Act
    let response = app
        .post(
            &format!("/api/quotations/{}/approve", id),
            &manager_token,
            &json!({ "approver_id": manager.id }),
        )
        .await;

    // Assert
    assert_eq!(response.status(), 200);
    let body = json(response).await;
    assert_eq!(body["status"], "approved");
    assert_eq!(body["approved_by"], manager.id.to_string());
    assert!(body["approved_at"].is_string());
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn creator_cannot_name_colleague_as_approver() {
    // Arrange
    let app = TestApp::spawn().await.expect("Failed to spawn test app");
    let tenant = app.seed_tenant().await;
    let client_id = app.create_client(&tenant.token).await;
    let id = app.sent_quotation(&tenant.token, client_id).await;
    let (manager, _) = app.member(&tenant, Role::Manager).await;

    // Act
    let response = app
        .post(
            &format!("/api/quotations/{}/approve", id),
            &tenant.token,
            &json!({ "approver_id": manager.id }),
        )
        .await;

    // Assert
    assert_eq!(response.status(), 403);
    let quotation = json(app.get(&format!("/api/quotations/{}", id), &tenant.token).await).await;
    assert_eq!(quotation["status"], "sent");
    assert!(quotation["approved_by"].is_null());
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn deactivated_approver_is_rejected() {
    // Arrange
    let app = TestApp::spawn().await.expect("Failed to spawn test app");
    let tenant = app.seed_tenant().await;
    let client_id = app.create_client(&tenant.token).await;
    let id = app.sent_quotation(&tenant.token, client_id).await;
    let (manager, manager_token) = app.member(&tenant, Role::Manager).await;
    let response = app
        .patch(
            &format!("/api/users/{}", manager.id),
            &tenant.token,
            &json!({ "is_active": false }),
        )
        .await;
    assert_eq!(response.status(), 200);

    // Act
    let response = app
        .post(
            &format!("/api/quotations/{}/approve", id),
            &manager_token,
            &json!({ "approver_id": manager.id }),
        )
        .await;

    // Assert
    assert_eq!(response.status(), 422);
    let body = json(response).await;
    assert_eq!(body["details"]["approver_id"][0]["code"], "unknown_user");
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn approver_role_must_hold_approval_permission() {
    // Arrange
    let app = TestApp::spawn().await.expect("Failed to spawn test app");
    let tenant = app.seed_tenant().await;
    let client_id = app.create_client(&tenant.token).await;
    let id = app.sent_quotation(&tenant.token, client_id).await;
    let (manager, manager_token) = app.member(&tenant, Role::Manager).await;
    // Demoted after the token was issued
    let response = app
        .patch(
            &format!("/api/users/{}", manager.id),
            &tenant.token,
            &json!({ "role": "staff" }),
        )
        .await;
    assert_eq!(response.status(), 200);

    // Act
    let response = app
        .post(
            &format!("/api/quotations/{}/approve", id),
            &manager_token,
            &json!({ "approver_id": manager.id }),
        )
        .await;

    // Assert
    assert_eq!(response.status(), 403);
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn draft_quotation_cannot_be_approved() {
    // Arrange
    let app = TestApp::spawn().await.expect("Failed to spawn test app");
    let tenant = app.seed_tenant().await;
    let client_id = app.create_client(&tenant.token).await;
    let id = id_of(&app.create_quotation(&tenant.token, client_id).await);
    let (manager, manager_token) = app.member(&tenant, Role::Manager).await;

    // Act
    let response = app
        .post(
            &format!("/api/quotations/{}/approve", id),
            &manager_token,
            &json!({ "approver_id": manager.id }),
        )
        .await;

    // Assert
    assert_eq!(response.status(), 409);
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn rejection_requires_reason() {
    // Arrange
    let app = TestApp::spawn().await.expect("Failed to spawn test app");
    let tenant = app.seed_tenant().await;
    let client_id = app.create_client(&tenant.token).await;
    let id = app.sent_quotation(&tenant.token, client_id).await;
    let path = format!("/api/quotations/{}/reject", id);

    // Act
    let without_reason = app.post(&path, &tenant.token, &json!({ "reason": "  " })).await;
    let with_reason = app
        .post(&path, &tenant.token, &json!({ "reason": "Budget cut" }))
        .await;

    // Assert
    assert_eq!(without_reason.status(), 422);
    assert_eq!(with_reason.status(), 200);
    let body = json(with_reason).await;
    assert_eq!(body["status"], "rejected");
    assert_eq!(body["rejection_reason"], "Budget cut");
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn overdue_quotation_expires_instead_of_sending() {
    // Arrange
    let app = TestApp::spawn().await.expect("Failed to spawn test app");
    let tenant = app.seed_tenant().await;
    let client_id = app.create_client(&tenant.token).await;
    let response = app
        .post(
            "/api/quotations",
            &tenant.token,
            &json!({
                "client_id": client_id,
                "title": "Old offer",
                "issue_date": "2020-01-01",
                "valid_until": "2020-01-31",
                "items": [{ "description": "Work", "quantity": "1", "unit_price": "10" }]
            }),
        )
        .await;
    let id = id_of(&json(response).await);

    // Act
    let response = app
        .post(&format!("/api/quotations/{}/send", id), &tenant.token, &Value::Null)
        .await;

    // Assert
    assert_eq!(response.status(), 409);
    let body = json(app.get(&format!("/api/quotations/{}", id), &tenant.token).await).await;
    assert_eq!(body["status"], "expired");
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn approved_quotation_converts_to_order_once() {
    // Arrange
    let app = TestApp::spawn().await.expect("Failed to spawn test app");
    let tenant = app.seed_tenant().await;
    let client_id = app.create_client(&tenant.token).await;
    let id = app.approved_quotation(&tenant, client_id).await;
    let path = format!("/api/quotations/{}/convert-to-order", id);

    // Act
    let first = app
        .post(
            &path,
            &tenant.token,
            &json!({ "date": "2030-02-01", "delivery_date": "2030-02-15" }),
        )
        .await;
    let second = app.post(&path, &tenant.token, &Value::Null).await;

    // Assert
    assert_eq!(first.status(), 201);
    let order = json(first).await;
    assert_eq!(order["status"], "pending");
    assert_eq!(order["quotation_id"], id.to_string());
    assert_eq!(order["order_date"], "2030-02-01");
    assert_eq!(order["delivery_date"], "2030-02-15");
    assert_eq!(order["total_amount"], "277.50");
    assert_eq!(order["items"].as_array().unwrap().len(), 2);
    assert!(order["order_number"]
        .as_str()
        .unwrap()
        .starts_with("ORD-203002-"));

    assert_eq!(second.status(), 409);
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn approved_quotation_converts_to_invoice() {
    // Arrange
    let app = TestApp::spawn().await.expect("Failed to spawn test app");
    let tenant = app.seed_tenant().await;
    let client_id = app.create_client(&tenant.token).await;
    let id = app.approved_quotation(&tenant, client_id).await;

    // Act
    let response = app
        .post(
            &format!("/api/quotations/{}/convert-to-invoice", id),
            &tenant.token,
            &json!({ "date": "2030-03-01", "due_date": "2030-03-31" }),
        )
        .await;

    // Assert
    assert_eq!(response.status(), 201);
    let invoice = json(response).await;
    assert_eq!(invoice["status"], "draft");
    assert_eq!(invoice["quotation_id"], id.to_string());
    assert_eq!(invoice["due_date"], "2030-03-31");
    assert_eq!(invoice["total_amount"], "277.50");
    assert!(invoice["invoice_number"]
        .as_str()
        .unwrap()
        .starts_with("INV-203003-"));
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn unapproved_quotation_cannot_be_converted() {
    // Arrange
    let app = TestApp::spawn().await.expect("Failed to spawn test app");
    let tenant = app.seed_tenant().await;
    let client_id = app.create_client(&tenant.token).await;
    let id = app.sent_quotation(&tenant.token, client_id).await;

    // Act
    let response = app
        .post(
            &format!("/api/quotations/{}/convert-to-order", id),
            &tenant.token,
            &Value::Null,
        )
        .await;

    // Assert
    assert_eq!(response.status(), 409);
}

#[tokio::test]
#[serial]
#[ignore] // Requires PostgreSQL
async fn bulk_expiry_expires_only_overdue_quotations() {
    // Arrange
    let app = TestApp::spawn().await.expect("Failed to spawn test app");
    let tenant = app.seed_tenant().await;
    let client_id = app.create_client(&tenant.token).await;
    let current = id_of(&app.create_quotation(&tenant.token, client_id).await);
    let response = app
        .post(
            "/api/quotations",
            &tenant.token,
            &json!({
                "client_id": client_id,
                "title": "Stale",
                "issue_date": "2020-01-01",
                "valid_until": "2020-01-31"
            }),
        )
        .await;
    let stale = id_of(&json(response).await);

    // Act
    let expired = app
        .db()
        .expire_due_quotations(Some(tenant.id()), chrono::Utc::now().date_naive())
        .await
        .expect("Failed to expire quotations");

    // Assert
    assert_eq!(expired, 1);
    let status: String = sqlx::query_scalar("SELECT status FROM quotations WHERE id = $1")
        .bind(stale)
        .fetch_one(app.db().pool())
        .await
        .unwrap();
    assert_eq!(status, "expired");
    let status: String = sqlx::query_scalar("SELECT status FROM quotations WHERE id = $1")
        .bind(current)
        .fetch_one(app.db().pool())
        .await
        .unwrap();
    assert_eq!(status, "draft");
}

#[tokio::test]
#[serial]
#[ignore] // Requires PostgreSQL
async fn sweep_without_organization_covers_every_tenant() {
    // Arrange
    let app = TestApp::spawn().await.expect("Failed to spawn test app");
    let mut stale = Vec::new();
    for _ in 0..2 {
        let tenant = app.seed_tenant().await;
        let client_id = app.create_client(&tenant.token).await;
        let response = app
            .post(
                "/api/quotations",
                &tenant.token,
                &json!({
                    "client_id": client_id,
                    "title": "Stale",
                    "issue_date": "2021-03-01",
                    "valid_until": "2021-03-15"
                }),
            )
            .await;
        stale.push(id_of(&json(response).await));
    }

    // Act
    let expired = app
        .db()
        .expire_due_quotations(None, chrono::Utc::now().date_naive())
        .await
        .expect("Failed to expire quotations");

    // Assert
    assert!(expired >= 2);
    let remaining: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM quotations WHERE id = ANY($1) AND status <> 'expired'",
    )
    .bind(&stale[..])
    .fetch_one(app.db().pool())
    .await
    .unwrap();
    assert_eq!(remaining, 0);
}
