//! Invoice handlers: CRUD with nested item/tax sync and computed totals.

use crate::handlers::{ActingUser, Page, DEFAULT_PAGE_SIZE};
use crate::models::{
    CreateInvoice, InvoiceDetail, InvoiceStatus, ListInvoicesFilter, UpdateInvoice,
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
pub struct ListInvoicesQuery {
    pub status: Option<String>,
    pub search: Option<String>,
    pub page_size: Option<i32>,
    pub page_token: Option<Uuid>,
}

pub async fn create_invoice(
    State(state): State<AppState>,
    actor: ActingUser,
    Json(input): Json<CreateInvoice>,
) -> Result<(StatusCode, Json<InvoiceDetail>), AppError> {
    input.validate()?;
    let detail = state.db.create_invoice(actor.user_id, &input).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

pub async fn list_invoices(
    State(state): State<AppState>,
    actor: ActingUser,
    Query(query): Query<ListInvoicesQuery>,
) -> Result<Json<Page<InvoiceDetail, Uuid>>, AppError> {
    let status = match query.status.as_deref() {
        Some(raw) => Some(InvoiceStatus::parse(raw).ok_or_else(|| {
            AppError::BadRequest(anyhow::anyhow!("Unknown invoice status '{}'", raw))
        })?),
        None => None,
    };

    let page_size = query.page_size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, 100);
    let filter = ListInvoicesFilter {
        status,
        search: query.search,
        page_size,
        page_token: query.page_token,
    };
    let invoices = state.db.list_invoices(actor.user_id, &filter).await?;
    Ok(Json(Page::new(invoices, page_size, |d| d.invoice.invoice_id)))
}

pub async fn get_invoice(
    State(state): State<AppState>,
    actor: ActingUser,
    Path(invoice_id): Path<Uuid>,
) -> Result<Json<InvoiceDetail>, AppError> {
    let detail = state
        .db
        .get_invoice(actor.user_id, invoice_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;
    Ok(Json(detail))
}

pub async fn update_invoice(
    State(state): State<AppState>,
    actor: ActingUser,
    Path(invoice_id): Path<Uuid>,
    Json(input): Json<UpdateInvoice>,
) -> Result<Json<InvoiceDetail>, AppError> {
    input.validate()?;
    let detail = state
        .db
        .update_invoice(actor.user_id, invoice_id, &input)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;
    Ok(Json(detail))
}

pub async fn delete_invoice(
    State(state): State<AppState>,
    actor: ActingUser,
    Path(invoice_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let deleted = state.db.delete_invoice(actor.user_id, invoice_id).await?;
    if !deleted {
        return Err(AppError::NotFound(anyhow::anyhow!("Invoice not found")));
    }
    Ok(StatusCode::NO_CONTENT)
}
