use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Bad request: {0}")]
    BadRequest(anyhow::Error),

    #[error("Not found: {0}")]
    NotFound(anyhow::Error),

    #[error("Unauthorized: {0}")]
    Unauthorized(anyhow::Error),

    #[error("Conflict: {0}")]
    Conflict(anyhow::Error),

    #[error("Insufficient stock for product {product_id}: short by {shortfall}")]
    OutOfStock { product_id: Uuid, shortfall: i64 },

    #[error("Internal server error: {0}")]
    InternalError(#[from] anyhow::Error),

    #[error("Database error: {0}")]
    DatabaseError(anyhow::Error),

    #[error("Configuration error: {0}")]
    ConfigError(anyhow::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(anyhow::Error::new(err))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(anyhow::Error::new(err))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: String,
            #[serde(skip_serializing_if = "Option::is_none")]
            details: Option<String>,
            #[serde(skip_serializing_if = "Option::is_none")]
            product_id: Option<Uuid>,
            #[serde(skip_serializing_if = "Option::is_none")]
            shortfall: Option<i64>,
        }

        let (status, body) = match self {
            AppError::ValidationError(err) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorResponse {
                    error: "Validation error".to_string(),
                    details: Some(err.to_string()),
                    product_id: None,
                    shortfall: None,
                },
            ),
            AppError::BadRequest(err) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse {
                    error: err.to_string(),
                    details: None,
                    product_id: None,
                    shortfall: None,
                },
            ),
            AppError::NotFound(err) => (
                StatusCode::NOT_FOUND,
                ErrorResponse {
                    error: err.to_string(),
                    details: None,
                    product_id: None,
                    shortfall: None,
                },
            ),
            AppError::Unauthorized(err) => (
                StatusCode::UNAUTHORIZED,
                ErrorResponse {
                    error: err.to_string(),
                    details: None,
                    product_id: None,
                    shortfall: None,
                },
            ),
            AppError::Conflict(err) => (
                StatusCode::CONFLICT,
                ErrorResponse {
                    error: err.to_string(),
                    details: None,
                    product_id: None,
                    shortfall: None,
                },
            ),
            AppError::OutOfStock {
                product_id,
                shortfall,
            } => (
                StatusCode::CONFLICT,
                ErrorResponse {
                    error: "Insufficient stock".to_string(),
                    details: None,
                    product_id: Some(product_id),
                    shortfall: Some(shortfall),
                },
            ),
            AppError::InternalError(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse {
                    error: "Internal server error".to_string(),
                    details: Some(format!("{:#?}", err)),
                    product_id: None,
                    shortfall: None,
                },
            ),
            AppError::DatabaseError(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse {
                    error: "Database error".to_string(),
                    details: Some(err.to_string()),
                    product_id: None,
                    shortfall: None,
                },
            ),
            AppError::ConfigError(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse {
                    error: "Configuration error".to_string(),
                    details: Some(err.to_string()),
                    product_id: None,
                    shortfall: None,
                },
            ),
        };

        (status, Json(body)).into_response()
    }
}
