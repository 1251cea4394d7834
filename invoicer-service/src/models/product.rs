//! Product and stock ledger models.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Product owned by a user, with quantity-on-hand tracking.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Product {
    pub product_id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub stock: i32,
    pub initial_stock: i32,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a product.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateProduct {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub stock: i32,
    /// Baseline for fill-rate reporting; defaults to `stock` when omitted.
    pub initial_stock: Option<i32>,
}

/// Input for updating a product.
///
/// `stock` is intentionally absent: after creation, stock changes only
/// through the stock ledger so every movement is audited.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateProduct {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
}

/// Filter parameters for listing products.
#[derive(Debug, Clone, Default)]
pub struct ListProductsFilter {
    pub search: Option<String>,
    pub page_size: i32,
    pub page_token: Option<Uuid>,
}

/// Immutable stock ledger row. Rows are only ever appended; the bigint id
/// doubles as the ledger sequence for newest-first paging.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StockHistory {
    pub history_id: i64,
    pub product_id: Uuid,
    pub user_id: Uuid,
    pub adjustment: i32,
    pub new_stock: i32,
    pub reason: String,
    pub created_utc: DateTime<Utc>,
}

/// Input for a manual stock adjustment.
#[derive(Debug, Clone, Deserialize)]
pub struct AdjustStock {
    pub adjustment: i32,
    pub reason: Option<String>,
}
