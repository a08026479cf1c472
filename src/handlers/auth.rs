//! 认证相关的 HTTP 处理器

use crate::{
    auth::middleware::AuthContext,
    error::AppError,
    middleware::AppState,
    models::user::{LoginRequest, RegisterRequest},
};
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use std::sync::Arc;

use super::validate_request;

/// 用户注册
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_request(&req)?;

    let user = state.auth_service.register(req).await?;

    Ok((StatusCode::CREATED, Json(user)))
}

/// 用户登录
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let response = state.auth_service.login(req).await?;

    Ok(Json(response))
}

/// 当前用户信息
pub async fn get_current_user(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
) -> Result<impl IntoResponse, AppError> {
    let user = state.auth_service.current_user(&auth_context.user_id).await?;

    Ok(Json(user))
}
