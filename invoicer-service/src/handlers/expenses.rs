//! Expense CRUD handlers.

use crate::handlers::{ActingUser, Page, DEFAULT_PAGE_SIZE};
use crate::models::{CreateExpense, Expense, ExpenseCategory, ListExpensesFilter, UpdateExpense};
use crate::startup::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::NaiveDate;
use invoicer_core::error::AppError;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize)]
pub struct ListExpensesQuery {
    pub category: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub page_size: Option<i32>,
    pub page_token: Option<Uuid>,
}

pub async fn create_expense(
    State(state): State<AppState>,
    actor: ActingUser,
    Json(input): Json<CreateExpense>,
) -> Result<(StatusCode, Json<Expense>), AppError> {
    input.validate()?;
    let expense = state.db.create_expense(actor.user_id, &input).await?;
    Ok((StatusCode::CREATED, Json(expense)))
}

pub async fn list_expenses(
    State(state): State<AppState>,
    actor: ActingUser,
    Query(query): Query<ListExpensesQuery>,
) -> Result<Json<Page<Expense, Uuid>>, AppError> {
    let category = match query.category.as_deref() {
        Some(raw) => Some(ExpenseCategory::parse(raw).ok_or_else(|| {
            AppError::BadRequest(anyhow::anyhow!("Unknown expense category '{}'", raw))
        })?),
        None => None,
    };

    let page_size = query.page_size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, 100);
    let filter = ListExpensesFilter {
        category,
        start_date: query.start_date,
        end_date: query.end_date,
        page_size,
        page_token: query.page_token,
    };
    let expenses = state.db.list_expenses(actor.user_id, &filter).await?;
    Ok(Json(Page::new(expenses, page_size, |e| e.expense_id)))
}

pub async fn get_expense(
    State(state): State<AppState>,
    actor: ActingUser,
    Path(expense_id): Path<Uuid>,
) -> Result<Json<Expense>, AppError> {
    let expense = state
        .db
        .get_expense(actor.user_id, expense_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Expense not found")))?;
    Ok(Json(expense))
}

pub async fn update_expense(
    State(state): State<AppState>,
    actor: ActingUser,
    Path(expense_id): Path<Uuid>,
    Json(input): Json<UpdateExpense>,
) -> Result<Json<Expense>, AppError> {
    input.validate()?;
    let expense = state
        .db
        .update_expense(actor.user_id, expense_id, &input)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Expense not found")))?;
    Ok(Json(expense))
}

pub async fn delete_expense(
    State(state): State<AppState>,
    actor: ActingUser,
    Path(expense_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let deleted = state.db.delete_expense(actor.user_id, expense_id).await?;
    if !deleted {
        return Err(AppError::NotFound(anyhow::anyhow!("Expense not found")));
    }
    Ok(StatusCode::NO_CONTENT)
}
