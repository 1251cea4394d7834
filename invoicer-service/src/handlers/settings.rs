//! Per-user settings handlers.

use crate::handlers::ActingUser;
use crate::models::{UpdateUserSettings, UserSettings};
use crate::startup::AppState;
use axum::extract::State;
use axum::Json;
use invoicer_core::error::AppError;
use validator::Validate;

/// Serves stored settings, or defaults before the first save.
pub async fn get_settings(
    State(state): State<AppState>,
    actor: ActingUser,
) -> Result<Json<UserSettings>, AppError> {
    let settings = state.db.get_settings(actor.user_id).await?;
    Ok(Json(settings))
}

pub async fn update_settings(
    State(state): State<AppState>,
    actor: ActingUser,
    Json(input): Json<UpdateUserSettings>,
) -> Result<Json<UserSettings>, AppError> {
    input.validate()?;
    let settings = state.db.update_settings(actor.user_id, &input).await?;
    Ok(Json(settings))
}
