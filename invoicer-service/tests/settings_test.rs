//! Per-user settings integration tests.
//!
//! Requires PostgreSQL via TEST_DATABASE_URL; run with: cargo test -- --ignored

mod common;

use common::{TestApp, OTHER_USER_ID};
use serde_json::{json, Value};

#[tokio::test]
#[ignore]
async fn settings_fall_back_to_defaults_before_first_save() {
    let app = TestApp::spawn().await;

    let response = app.get("/settings").await;
    assert_eq!(response.status(), 200);

    let settings: Value = response.json().await.unwrap();
    assert_eq!(settings["theme"], "light");
    assert_eq!(settings["currency"], "USD");
    assert_eq!(settings["locale"], "en_US");
    assert!(settings["tax_profiles"].as_array().unwrap().is_empty());

    app.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn update_settings_upserts_and_merges() {
    let app = TestApp::spawn().await;

    let response = app
        .put(
            "/settings",
            &json!({ "currency": "EUR", "company_name": "Acme GmbH" }),
        )
        .await;
    assert_eq!(response.status(), 200);

    let settings: Value = response.json().await.unwrap();
    assert_eq!(settings["currency"], "EUR");
    assert_eq!(settings["company_name"], "Acme GmbH");
    // Untouched fields keep their defaults.
    assert_eq!(settings["theme"], "light");

    // A second partial update leaves the first one intact.
    let response = app.put("/settings", &json!({ "theme": "dark" })).await;
    assert_eq!(response.status(), 200);

    let settings: Value = response.json().await.unwrap();
    assert_eq!(settings["theme"], "dark");
    assert_eq!(settings["currency"], "EUR");

    app.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn tax_profile_presets_round_trip() {
    let app = TestApp::spawn().await;

    let presets = json!([
        { "name": "VAT", "rate": "20.00" },
        { "name": "Reduced", "rate": "7.00" }
    ]);

    let response = app
        .put("/settings", &json!({ "tax_profiles": presets.clone() }))
        .await;
    assert_eq!(response.status(), 200);

    let settings: Value = app.get("/settings").await.json().await.unwrap();
    assert_eq!(settings["tax_profiles"], presets);

    // Presets must be a list.
    let response = app
        .put("/settings", &json!({ "tax_profiles": { "name": "VAT" } }))
        .await;
    assert_eq!(response.status(), 400);

    app.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn settings_are_scoped_per_user() {
    let app = TestApp::spawn().await;

    let response = app.put("/settings", &json!({ "currency": "EUR" })).await;
    assert_eq!(response.status(), 200);

    let other: Value = app
        .get_as(OTHER_USER_ID, "/settings")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(other["currency"], "USD");

    app.cleanup().await;
}
