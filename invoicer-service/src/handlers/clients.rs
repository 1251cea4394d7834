//! Client CRUD handlers.

use crate::handlers::{ActingUser, Page, DEFAULT_PAGE_SIZE};
use crate::models::{Client, CreateClient, ListClientsFilter, UpdateClient};
use crate::startup::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use invoicer_core::error::AppError;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize)]
pub struct ListClientsQuery {
    pub search: Option<String>,
    pub page_size: Option<i32>,
    pub page_token: Option<Uuid>,
}

pub async fn create_client(
    State(state): State<AppState>,
    actor: ActingUser,
    Json(input): Json<CreateClient>,
) -> Result<(StatusCode, Json<Client>), AppError> {
    input.validate()?;
    let client = state.db.create_client(actor.user_id, &input).await?;
    Ok((StatusCode::CREATED, Json(client)))
}

pub async fn list_clients(
    State(state): State<AppState>,
    actor: ActingUser,
    Query(query): Query<ListClientsQuery>,
) -> Result<Json<Page<Client, Uuid>>, AppError> {
    let page_size = query.page_size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, 100);
    let filter = ListClientsFilter {
        search: query.search,
        page_size,
        page_token: query.page_token,
    };
    let clients = state.db.list_clients(actor.user_id, &filter).await?;
    Ok(Json(Page::new(clients, page_size, |c| c.client_id)))
}

pub async fn get_client(
    State(state): State<AppState>,
    actor: ActingUser,
    Path(client_id): Path<Uuid>,
) -> Result<Json<Client>, AppError> {
    let client = state
        .db
        .get_client(actor.user_id, client_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Client not found")))?;
    Ok(Json(client))
}

pub async fn update_client(
    State(state): State<AppState>,
    actor: ActingUser,
    Path(client_id): Path<Uuid>,
    Json(input): Json<UpdateClient>,
) -> Result<Json<Client>, AppError> {
    input.validate()?;
    let client = state
        .db
        .update_client(actor.user_id, client_id, &input)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Client not found")))?;
    Ok(Json(client))
}

pub async fn delete_client(
    State(state): State<AppState>,
    actor: ActingUser,
    Path(client_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let deleted = state.db.delete_client(actor.user_id, client_id).await?;
    if !deleted {
        return Err(AppError::NotFound(anyhow::anyhow!("Client not found")));
    }
    Ok(StatusCode::NO_CONTENT)
}
