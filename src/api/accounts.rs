//! /auth エンドポイント

use axum::{extract::State, Json};

use super::error::ApiError;
use super::state::AppState;
use crate::auth::{AccountProfile, LoginRequest, SignupRequest};

/// POST /auth/signup
pub async fn signup(
    State(state): State<AppState>,
    Json(request): Json<SignupRequest>,
) -> Result<Json<AccountProfile>, ApiError> {
    Ok(Json(state.accounts.signup(request).await?))
}

/// POST /auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<AccountProfile>, ApiError> {
    Ok(Json(state.accounts.login(request).await?))
}
