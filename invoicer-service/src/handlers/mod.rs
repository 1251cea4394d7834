//! HTTP handlers for invoicer-service.

pub mod clients;
pub mod expenses;
pub mod invoices;
pub mod products;
pub mod settings;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use invoicer_core::error::AppError;
use serde::Serialize;
use uuid::Uuid;

/// Header carrying the authenticated user id, injected by the upstream
/// gateway. The service never authenticates; it scopes everything to this id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Records returned by list endpoints when no page size is requested.
pub const DEFAULT_PAGE_SIZE: i32 = 20;

/// The acting user on whose behalf a request runs.
#[derive(Debug, Clone, Copy)]
pub struct ActingUser {
    pub user_id: Uuid,
}

#[async_trait]
impl<S> FromRequestParts<S> for ActingUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                AppError::Unauthorized(anyhow::anyhow!("Missing {} header", USER_ID_HEADER))
            })?;

        let user_id = Uuid::parse_str(raw).map_err(|_| {
            AppError::Unauthorized(anyhow::anyhow!("Invalid {} header", USER_ID_HEADER))
        })?;

        Ok(ActingUser { user_id })
    }
}

/// One page of a keyset-paginated list.
#[derive(Debug, Serialize)]
pub struct Page<T, C> {
    pub items: Vec<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<C>,
}

impl<T, C> Page<T, C> {
    /// Wrap one page of results. A full page carries the last member's key
    /// as the token for the next request; a short page is the final one.
    pub fn new(items: Vec<T>, page_size: i32, key: impl Fn(&T) -> C) -> Self {
        let next_page_token = (items.len() as i32 >= page_size)
            .then(|| items.last().map(&key))
            .flatten();
        Self {
            items,
            next_page_token,
        }
    }
}
