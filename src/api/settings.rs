//! /settings エンドポイント

use axum::{
    extract::{Path, State},
    Json,
};

use super::error::ApiError;
use super::state::AppState;
use crate::db::{NewSettings, SettingsUpdate, UserSettings};

/// GET /settings/:user_id
pub async fn get_settings(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<UserSettings>, ApiError> {
    state
        .db
        .get_settings(user_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("User settings not found"))
}

/// POST /settings
pub async fn create_settings(
    State(state): State<AppState>,
    Json(new): Json<NewSettings>,
) -> Result<Json<UserSettings>, ApiError> {
    Ok(Json(state.db.create_settings(&new).await?))
}

/// PUT /settings/:user_id
pub async fn update_settings(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Json(update): Json<SettingsUpdate>,
) -> Result<Json<UserSettings>, ApiError> {
    Ok(Json(state.db.update_settings(user_id, &update).await?))
}
