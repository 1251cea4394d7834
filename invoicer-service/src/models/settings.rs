//! Per-user account settings used when rendering invoices.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// One settings row per user. Reads fall back to defaults until the user
/// saves something.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserSettings {
    pub user_id: Uuid,
    pub theme: String,
    pub currency: String,
    pub locale: String,
    pub invoice_footer: String,
    pub company_name: Option<String>,
    pub brand_color: String,
    pub account_number: String,
    pub account_name: String,
    pub issuer_name: Option<String>,
    pub issuer_title: Option<String>,
    /// Named tax presets offered when composing an invoice,
    /// e.g. `[{"name": "VAT", "rate": "20.00"}]`.
    pub tax_profiles: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

impl UserSettings {
    /// Defaults served before the user has stored anything.
    pub fn defaults(user_id: Uuid) -> Self {
        Self {
            user_id,
            theme: "light".to_string(),
            currency: "USD".to_string(),
            locale: "en_US".to_string(),
            invoice_footer: String::new(),
            company_name: None,
            brand_color: "#263238".to_string(),
            account_number: String::new(),
            account_name: String::new(),
            issuer_name: None,
            issuer_title: None,
            tax_profiles: serde_json::Value::Array(Vec::new()),
            updated_at: Utc::now(),
        }
    }
}

/// Input for updating settings; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateUserSettings {
    #[validate(length(max = 20))]
    pub theme: Option<String>,
    #[validate(length(min = 1, max = 10))]
    pub currency: Option<String>,
    #[validate(length(min = 2, max = 10))]
    pub locale: Option<String>,
    pub invoice_footer: Option<String>,
    #[validate(length(max = 255))]
    pub company_name: Option<String>,
    #[validate(length(min = 4, max = 9))]
    pub brand_color: Option<String>,
    #[validate(length(max = 50))]
    pub account_number: Option<String>,
    #[validate(length(max = 100))]
    pub account_name: Option<String>,
    #[validate(length(max = 100))]
    pub issuer_name: Option<String>,
    #[validate(length(max = 100))]
    pub issuer_title: Option<String>,
    pub tax_profiles: Option<serde_json::Value>,
}
