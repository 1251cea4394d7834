//! Invoice integration tests: line-item lifecycle stock bookkeeping,
//! computed totals, and nested collection sync.
//!
//! Requires PostgreSQL via TEST_DATABASE_URL; run with: cargo test -- --ignored

mod common;

use common::TestApp;
use serde_json::{json, Value};

async fn setup(app: &TestApp) -> (Value, Value) {
    let client = app.create_client_record("Acme", "acme@example.com").await;
    let product = app.create_product("Widget", "10.00", 10).await;
    (client, product)
}

/// Monetary fields serialize as decimal strings; compare them numerically so
/// assertions do not depend on trailing-zero scale.
fn money(value: &Value) -> f64 {
    value
        .as_str()
        .expect("expected a decimal string")
        .parse()
        .expect("expected a numeric value")
}

async fn create_invoice(app: &TestApp, body: &Value) -> Value {
    let response = app.post("/invoices", body).await;
    assert_eq!(response.status(), 201, "Failed to create invoice");
    response.json().await.expect("Invalid invoice JSON")
}

#[tokio::test]
#[ignore]
async fn creating_an_item_reserves_stock_and_records_it() {
    let app = TestApp::spawn().await;
    let (client, product) = setup(&app).await;
    let product_id = product["product_id"].as_str().unwrap();

    create_invoice(
        &app,
        &json!({
            "client_id": client["client_id"],
            "due_date": "2026-09-01",
            "items": [{ "product_id": product_id, "quantity": 5 }]
        }),
    )
    .await;

    assert_eq!(app.product_stock(product_id).await, 5);

    let history = app.stock_history(product_id).await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["adjustment"], -5);
    assert_eq!(history[0]["new_stock"], 5);
    assert_eq!(history[0]["reason"], "invoice item created");

    app.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn insufficient_stock_aborts_the_whole_create() {
    let app = TestApp::spawn().await;
    let (client, product) = setup(&app).await;
    let product_id = product["product_id"].as_str().unwrap();
    let other = app.create_product("Gasket", "3.00", 100).await;
    let other_id = other["product_id"].as_str().unwrap();

    let response = app
        .post(
            "/invoices",
            &json!({
                "client_id": client["client_id"],
                "due_date": "2026-09-01",
                "items": [
                    { "product_id": other_id, "quantity": 2 },
                    { "product_id": product_id, "quantity": 15 }
                ]
            }),
        )
        .await;
    assert_eq!(response.status(), 409);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["product_id"].as_str().unwrap(), product_id);
    assert_eq!(body["shortfall"], 5);

    // The first item's reservation rolled back with everything else.
    assert_eq!(app.product_stock(other_id).await, 100);
    assert_eq!(app.product_stock(product_id).await, 10);
    assert!(app.stock_history(other_id).await.is_empty());

    let response = app.get("/invoices").await;
    let page: Value = response.json().await.unwrap();
    assert!(page["items"].as_array().unwrap().is_empty());

    app.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn quantity_update_adjusts_by_the_difference() {
    let app = TestApp::spawn().await;
    let (client, product) = setup(&app).await;
    let product_id = product["product_id"].as_str().unwrap();

    let invoice = create_invoice(
        &app,
        &json!({
            "client_id": client["client_id"],
            "due_date": "2026-09-01",
            "items": [{ "product_id": product_id, "quantity": 5 }]
        }),
    )
    .await;
    let invoice_id = invoice["invoice_id"].as_str().unwrap();
    let item_id = invoice["items"][0]["item_id"].as_str().unwrap();

    let response = app
        .put(
            &format!("/invoices/{}", invoice_id),
            &json!({
                "items": [{ "id": item_id, "product_id": product_id, "quantity": 8 }]
            }),
        )
        .await;
    assert_eq!(response.status(), 200);

    assert_eq!(app.product_stock(product_id).await, 2);

    let history = app.stock_history(product_id).await;
    assert_eq!(history.len(), 2);
    assert_eq!(history[0]["adjustment"], -3);
    assert_eq!(history[0]["new_stock"], 2);
    assert_eq!(history[0]["reason"], "invoice item updated");

    app.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn product_swap_releases_old_and_reserves_new() {
    let app = TestApp::spawn().await;
    let (client, product) = setup(&app).await;
    let p_id = product["product_id"].as_str().unwrap();
    let q = app.create_product("Sprocket", "4.00", 20).await;
    let q_id = q["product_id"].as_str().unwrap();

    let invoice = create_invoice(
        &app,
        &json!({
            "client_id": client["client_id"],
            "due_date": "2026-09-01",
            "items": [{ "product_id": p_id, "quantity": 8 }]
        }),
    )
    .await;
    let invoice_id = invoice["invoice_id"].as_str().unwrap();
    let item_id = invoice["items"][0]["item_id"].as_str().unwrap();
    assert_eq!(app.product_stock(p_id).await, 2);

    let response = app
        .put(
            &format!("/invoices/{}", invoice_id),
            &json!({
                "items": [{ "id": item_id, "product_id": q_id, "quantity": 8 }]
            }),
        )
        .await;
    assert_eq!(response.status(), 200);

    assert_eq!(app.product_stock(p_id).await, 10);
    assert_eq!(app.product_stock(q_id).await, 12);

    let p_history = app.stock_history(p_id).await;
    assert_eq!(p_history[0]["adjustment"], 8);
    assert_eq!(p_history[0]["reason"], "invoice item product changed");

    let q_history = app.stock_history(q_id).await;
    assert_eq!(q_history[0]["adjustment"], -8);
    assert_eq!(q_history[0]["reason"], "invoice item product changed");

    app.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn deleting_the_invoice_restores_reserved_stock() {
    let app = TestApp::spawn().await;
    let (client, product) = setup(&app).await;
    let product_id = product["product_id"].as_str().unwrap();

    let invoice = create_invoice(
        &app,
        &json!({
            "client_id": client["client_id"],
            "due_date": "2026-09-01",
            "items": [{ "product_id": product_id, "quantity": 6 }]
        }),
    )
    .await;
    let invoice_id = invoice["invoice_id"].as_str().unwrap();
    assert_eq!(app.product_stock(product_id).await, 4);

    let response = app.delete(&format!("/invoices/{}", invoice_id)).await;
    assert_eq!(response.status(), 204);

    assert_eq!(app.product_stock(product_id).await, 10);

    let history = app.stock_history(product_id).await;
    assert_eq!(history[0]["adjustment"], 6);
    assert_eq!(history[0]["reason"], "invoice item removed");

    app.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn totals_derive_from_items_discount_and_taxes() {
    let app = TestApp::spawn().await;
    let client = app.create_client_record("Acme", "acme@example.com").await;
    let widget = app.create_product("Widget", "10.00", 100).await;
    let gasket = app.create_product("Gasket", "5.00", 100).await;

    let invoice = create_invoice(
        &app,
        &json!({
            "client_id": client["client_id"],
            "due_date": "2026-09-01",
            "discount_percentage": "10",
            "items": [
                { "product_id": widget["product_id"], "quantity": 2 },
                { "product_id": gasket["product_id"], "quantity": 1 }
            ],
            "taxes": [{ "name": "VAT", "rate": "20" }]
        }),
    )
    .await;

    assert_eq!(money(&invoice["subtotal"]), 25.0);
    assert_eq!(money(&invoice["discounted_subtotal"]), 22.5);
    assert_eq!(money(&invoice["tax_amount"]), 4.5);
    assert_eq!(money(&invoice["total"]), 27.0);
    assert_eq!(money(&invoice["taxes"][0]["amount"]), 4.5);
    assert_eq!(money(&invoice["items"][0]["item_total"]), 20.0);

    app.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn totals_are_stable_across_reads_and_reprice_with_the_product() {
    let app = TestApp::spawn().await;
    let (client, product) = setup(&app).await;
    let product_id = product["product_id"].as_str().unwrap();

    let invoice = create_invoice(
        &app,
        &json!({
            "client_id": client["client_id"],
            "due_date": "2026-09-01",
            "items": [{ "product_id": product_id, "quantity": 3 }]
        }),
    )
    .await;
    let invoice_id = invoice["invoice_id"].as_str().unwrap();

    // Recomputation without mutation does not drift.
    let first: Value = app
        .get(&format!("/invoices/{}", invoice_id))
        .await
        .json()
        .await
        .unwrap();
    let second: Value = app
        .get(&format!("/invoices/{}", invoice_id))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(first["total"], second["total"]);
    assert_eq!(money(&first["subtotal"]), 30.0);

    // Line values are priced at read time, so a price change re-prices
    // the invoice.
    let response = app
        .put(
            &format!("/products/{}", product_id),
            &json!({ "price": "12.00" }),
        )
        .await;
    assert_eq!(response.status(), 200);

    let repriced: Value = app
        .get(&format!("/invoices/{}", invoice_id))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(money(&repriced["subtotal"]), 36.0);

    app.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn nested_sync_updates_creates_and_deletes_in_one_call() {
    let app = TestApp::spawn().await;
    let (client, product) = setup(&app).await;
    let product_id = product["product_id"].as_str().unwrap();
    let other = app.create_product("Gasket", "3.00", 50).await;
    let other_id = other["product_id"].as_str().unwrap();

    let invoice = create_invoice(
        &app,
        &json!({
            "client_id": client["client_id"],
            "due_date": "2026-09-01",
            "items": [
                { "product_id": product_id, "quantity": 5 },
                { "product_id": other_id, "quantity": 4 }
            ]
        }),
    )
    .await;
    let invoice_id = invoice["invoice_id"].as_str().unwrap();
    let kept_id = invoice["items"][0]["item_id"].as_str().unwrap();

    // Keep the first item at a new quantity, drop the second, add a third.
    let response = app
        .put(
            &format!("/invoices/{}", invoice_id),
            &json!({
                "items": [
                    { "id": kept_id, "product_id": product_id, "quantity": 3 },
                    { "product_id": other_id, "quantity": 2 }
                ]
            }),
        )
        .await;
    assert_eq!(response.status(), 200);

    let updated: Value = response.json().await.unwrap();
    let items = updated["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);

    // Widget: -5 then +2 back (5 -> 3). Gasket: +4 released, -2 reserved.
    assert_eq!(app.product_stock(product_id).await, 7);
    assert_eq!(app.product_stock(other_id).await, 48);

    // One lifecycle adjustment per transition: update, delete, create.
    assert_eq!(app.stock_history(product_id).await.len(), 2);
    assert_eq!(app.stock_history(other_id).await.len(), 3);

    app.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn omitting_collections_leaves_them_untouched() {
    let app = TestApp::spawn().await;
    let (client, product) = setup(&app).await;
    let product_id = product["product_id"].as_str().unwrap();

    let invoice = create_invoice(
        &app,
        &json!({
            "client_id": client["client_id"],
            "due_date": "2026-09-01",
            "items": [{ "product_id": product_id, "quantity": 5 }],
            "taxes": [{ "name": "VAT", "rate": "20" }]
        }),
    )
    .await;
    let invoice_id = invoice["invoice_id"].as_str().unwrap();

    let response = app
        .put(
            &format!("/invoices/{}", invoice_id),
            &json!({ "status": "paid", "payment_date": "2026-09-15" }),
        )
        .await;
    assert_eq!(response.status(), 200);

    let updated: Value = response.json().await.unwrap();
    assert_eq!(updated["status"], "paid");
    assert_eq!(updated["items"].as_array().unwrap().len(), 1);
    assert_eq!(updated["taxes"].as_array().unwrap().len(), 1);
    assert_eq!(app.product_stock(product_id).await, 5);

    // An explicit empty list deletes every member and releases the stock.
    let response = app
        .put(
            &format!("/invoices/{}", invoice_id),
            &json!({ "items": [], "taxes": [] }),
        )
        .await;
    assert_eq!(response.status(), 200);

    let cleared: Value = response.json().await.unwrap();
    assert!(cleared["items"].as_array().unwrap().is_empty());
    assert!(cleared["taxes"].as_array().unwrap().is_empty());
    assert_eq!(app.product_stock(product_id).await, 10);

    app.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn mid_sync_shortfall_rolls_back_every_staged_change() {
    let app = TestApp::spawn().await;
    let (client, product) = setup(&app).await;
    let product_id = product["product_id"].as_str().unwrap();
    let scarce = app.create_product("Rare Part", "99.00", 1).await;
    let scarce_id = scarce["product_id"].as_str().unwrap();

    let invoice = create_invoice(
        &app,
        &json!({
            "client_id": client["client_id"],
            "due_date": "2026-09-01",
            "items": [{ "product_id": product_id, "quantity": 5 }]
        }),
    )
    .await;
    let invoice_id = invoice["invoice_id"].as_str().unwrap();
    let item_id = invoice["items"][0]["item_id"].as_str().unwrap();

    // The quantity bump would succeed alone; the scarce item cannot.
    let response = app
        .put(
            &format!("/invoices/{}", invoice_id),
            &json!({
                "title": "Renamed",
                "items": [
                    { "id": item_id, "product_id": product_id, "quantity": 8 },
                    { "product_id": scarce_id, "quantity": 3 }
                ]
            }),
        )
        .await;
    assert_eq!(response.status(), 409);

    // Nothing moved: not the first item's stock, not the header.
    assert_eq!(app.product_stock(product_id).await, 5);
    assert_eq!(app.product_stock(scarce_id).await, 1);

    let current: Value = app
        .get(&format!("/invoices/{}", invoice_id))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(current["title"], "");
    assert_eq!(current["items"][0]["quantity"], 5);

    app.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn tax_sync_follows_the_same_id_semantics() {
    let app = TestApp::spawn().await;
    let (client, product) = setup(&app).await;

    let invoice = create_invoice(
        &app,
        &json!({
            "client_id": client["client_id"],
            "due_date": "2026-09-01",
            "items": [{ "product_id": product["product_id"], "quantity": 1 }],
            "taxes": [
                { "name": "VAT", "rate": "20" },
                { "name": "City", "rate": "2" }
            ]
        }),
    )
    .await;
    let invoice_id = invoice["invoice_id"].as_str().unwrap();
    let vat_id = invoice["taxes"][0]["tax_id"].as_str().unwrap();

    let response = app
        .put(
            &format!("/invoices/{}", invoice_id),
            &json!({
                "taxes": [
                    { "id": vat_id, "name": "VAT", "rate": "19" },
                    { "name": "Eco", "rate": "1" }
                ]
            }),
        )
        .await;
    assert_eq!(response.status(), 200);

    let updated: Value = response.json().await.unwrap();
    let taxes = updated["taxes"].as_array().unwrap();
    assert_eq!(taxes.len(), 2);

    let names: Vec<&str> = taxes.iter().map(|t| t["name"].as_str().unwrap()).collect();
    assert!(names.contains(&"VAT"));
    assert!(names.contains(&"Eco"));
    assert!(!names.contains(&"City"));

    app.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn invalid_invoice_input_is_rejected_before_any_change() {
    let app = TestApp::spawn().await;
    let (client, product) = setup(&app).await;
    let product_id = product["product_id"].as_str().unwrap();

    // Negative quantity never reaches the ledger.
    let response = app
        .post(
            "/invoices",
            &json!({
                "client_id": client["client_id"],
                "due_date": "2026-09-01",
                "items": [{ "product_id": product_id, "quantity": -1 }]
            }),
        )
        .await;
    assert_eq!(response.status(), 422);

    // Discount outside [0, 100].
    let response = app
        .post(
            "/invoices",
            &json!({
                "client_id": client["client_id"],
                "due_date": "2026-09-01",
                "discount_percentage": "120"
            }),
        )
        .await;
    assert_eq!(response.status(), 400);

    // Unknown status.
    let response = app
        .post(
            "/invoices",
            &json!({
                "client_id": client["client_id"],
                "due_date": "2026-09-01",
                "status": "overdue"
            }),
        )
        .await;
    assert_eq!(response.status(), 400);

    assert_eq!(app.product_stock(product_id).await, 10);
    assert!(app.stock_history(product_id).await.is_empty());

    app.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn zero_quantity_item_is_legal_and_reserves_nothing() {
    let app = TestApp::spawn().await;
    let (client, product) = setup(&app).await;
    let product_id = product["product_id"].as_str().unwrap();

    let invoice = create_invoice(
        &app,
        &json!({
            "client_id": client["client_id"],
            "due_date": "2026-09-01",
            "items": [{ "product_id": product_id, "quantity": 0 }]
        }),
    )
    .await;

    assert_eq!(invoice["items"].as_array().unwrap().len(), 1);
    assert_eq!(app.product_stock(product_id).await, 10);

    let history = app.stock_history(product_id).await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["adjustment"], 0);

    app.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn unknown_client_is_not_found() {
    let app = TestApp::spawn().await;

    let response = app
        .post(
            "/invoices",
            &json!({
                "client_id": "33333333-3333-3333-3333-333333333333",
                "due_date": "2026-09-01"
            }),
        )
        .await;
    assert_eq!(response.status(), 404);

    app.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn list_invoices_filters_by_status() {
    let app = TestApp::spawn().await;
    let (client, product) = setup(&app).await;
    let product_id = product["product_id"].as_str().unwrap();

    create_invoice(
        &app,
        &json!({
            "client_id": client["client_id"],
            "due_date": "2026-09-01",
            "status": "draft",
            "items": [{ "product_id": product_id, "quantity": 1 }]
        }),
    )
    .await;
    create_invoice(
        &app,
        &json!({
            "client_id": client["client_id"],
            "due_date": "2026-09-01",
            "status": "paid",
            "items": [{ "product_id": product_id, "quantity": 1 }]
        }),
    )
    .await;

    let response = app.get("/invoices?status=draft").await;
    let page: Value = response.json().await.unwrap();
    let items = page["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["status"], "draft");

    let response = app.get("/invoices?status=overdue").await;
    assert_eq!(response.status(), 400);

    app.cleanup().await;
}
