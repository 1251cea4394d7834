//! Product CRUD, manual stock adjustment, and ledger history handlers.

use crate::handlers::{ActingUser, Page, DEFAULT_PAGE_SIZE};
use crate::models::{
    AdjustStock, CreateProduct, ListProductsFilter, Product, StockHistory, UpdateProduct,
};
use crate::startup::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use invoicer_core::error::AppError;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize)]
pub struct ListProductsQuery {
    pub search: Option<String>,
    pub page_size: Option<i32>,
    pub page_token: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct StockHistoryQuery {
    pub page_size: Option<i32>,
    pub page_token: Option<i64>,
}

pub async fn create_product(
    State(state): State<AppState>,
    actor: ActingUser,
    Json(input): Json<CreateProduct>,
) -> Result<(StatusCode, Json<Product>), AppError> {
    input.validate()?;
    let product = state.db.create_product(actor.user_id, &input).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn list_products(
    State(state): State<AppState>,
    actor: ActingUser,
    Query(query): Query<ListProductsQuery>,
) -> Result<Json<Page<Product, Uuid>>, AppError> {
    let page_size = query.page_size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, 100);
    let filter = ListProductsFilter {
        search: query.search,
        page_size,
        page_token: query.page_token,
    };
    let products = state.db.list_products(actor.user_id, &filter).await?;
    Ok(Json(Page::new(products, page_size, |p| p.product_id)))
}

pub async fn get_product(
    State(state): State<AppState>,
    actor: ActingUser,
    Path(product_id): Path<Uuid>,
) -> Result<Json<Product>, AppError> {
    let product = state
        .db
        .get_product(actor.user_id, product_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Product not found")))?;
    Ok(Json(product))
}

pub async fn update_product(
    State(state): State<AppState>,
    actor: ActingUser,
    Path(product_id): Path<Uuid>,
    Json(input): Json<UpdateProduct>,
) -> Result<Json<Product>, AppError> {
    input.validate()?;
    let product = state
        .db
        .update_product(actor.user_id, product_id, &input)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Product not found")))?;
    Ok(Json(product))
}

pub async fn delete_product(
    State(state): State<AppState>,
    actor: ActingUser,
    Path(product_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let deleted = state.db.delete_product(actor.user_id, product_id).await?;
    if !deleted {
        return Err(AppError::NotFound(anyhow::anyhow!("Product not found")));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Manual stock adjustment: one ledger row per call, rejected when the
/// result would be negative.
pub async fn adjust_stock(
    State(state): State<AppState>,
    actor: ActingUser,
    Path(product_id): Path<Uuid>,
    Json(input): Json<AdjustStock>,
) -> Result<Json<Product>, AppError> {
    let reason = input.reason.as_deref().unwrap_or("manual adjustment");
    let product = state
        .db
        .adjust_stock(actor.user_id, product_id, input.adjustment, reason)
        .await?;
    Ok(Json(product))
}

pub async fn list_stock_history(
    State(state): State<AppState>,
    actor: ActingUser,
    Path(product_id): Path<Uuid>,
    Query(query): Query<StockHistoryQuery>,
) -> Result<Json<Page<StockHistory, i64>>, AppError> {
    let page_size = query.page_size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, 100);
    let history = state
        .db
        .list_stock_history(actor.user_id, product_id, page_size, query.page_token)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Product not found")))?;
    Ok(Json(Page::new(history, page_size, |h| h.history_id)))
}
