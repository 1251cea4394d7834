//! Client CRUD integration tests.
//!
//! Requires PostgreSQL via TEST_DATABASE_URL; run with: cargo test -- --ignored

mod common;

use common::{TestApp, OTHER_USER_ID};
use serde_json::{json, Value};

#[tokio::test]
#[ignore]
async fn create_and_get_client() {
    let app = TestApp::spawn().await;

    let client = app.create_client_record("Acme", "acme@example.com").await;
    let client_id = client["client_id"].as_str().unwrap();

    let response = app.get(&format!("/clients/{}", client_id)).await;
    assert_eq!(response.status(), 200);

    let fetched: Value = response.json().await.unwrap();
    assert_eq!(fetched["name"], "Acme");
    assert_eq!(fetched["email"], "acme@example.com");

    app.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn create_client_rejects_malformed_email() {
    let app = TestApp::spawn().await;

    let response = app
        .post("/clients", &json!({ "name": "Acme", "email": "not-an-email" }))
        .await;
    assert_eq!(response.status(), 422);

    app.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn update_client_merges_provided_fields() {
    let app = TestApp::spawn().await;

    let client = app.create_client_record("Acme", "acme@example.com").await;
    let client_id = client["client_id"].as_str().unwrap();

    let response = app
        .put(
            &format!("/clients/{}", client_id),
            &json!({ "phone": "555-0100" }),
        )
        .await;
    assert_eq!(response.status(), 200);

    let updated: Value = response.json().await.unwrap();
    assert_eq!(updated["name"], "Acme");
    assert_eq!(updated["phone"], "555-0100");

    app.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn clients_are_scoped_to_their_owner() {
    let app = TestApp::spawn().await;

    let client = app.create_client_record("Acme", "acme@example.com").await;
    let client_id = client["client_id"].as_str().unwrap();

    let response = app
        .get_as(OTHER_USER_ID, &format!("/clients/{}", client_id))
        .await;
    assert_eq!(response.status(), 404);

    let response = app
        .delete_as(OTHER_USER_ID, &format!("/clients/{}", client_id))
        .await;
    assert_eq!(response.status(), 404);

    app.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn list_clients_searches_name_and_email() {
    let app = TestApp::spawn().await;

    app.create_client_record("Acme", "billing@acme.com").await;
    app.create_client_record("Globex", "orders@globex.com").await;

    let response = app.get("/clients?search=acme").await;
    let page: Value = response.json().await.unwrap();
    assert_eq!(page["items"].as_array().unwrap().len(), 1);

    let response = app.get("/clients?search=orders").await;
    let page: Value = response.json().await.unwrap();
    assert_eq!(page["items"].as_array().unwrap().len(), 1);
    assert_eq!(page["items"][0]["name"], "Globex");

    app.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn delete_client_referenced_by_invoice_is_rejected() {
    let app = TestApp::spawn().await;

    let client = app.create_client_record("Acme", "acme@example.com").await;
    let client_id = client["client_id"].as_str().unwrap();
    let product = app.create_product("Widget", "10.00", 5).await;

    let response = app
        .post(
            "/invoices",
            &json!({
                "client_id": client_id,
                "due_date": "2026-09-01",
                "items": [{ "product_id": product["product_id"], "quantity": 1 }]
            }),
        )
        .await;
    assert_eq!(response.status(), 201);

    let response = app.delete(&format!("/clients/{}", client_id)).await;
    assert_eq!(response.status(), 409);

    // Still there.
    let response = app.get(&format!("/clients/{}", client_id)).await;
    assert_eq!(response.status(), 200);

    app.cleanup().await;
}
