//! 历史记录的 HTTP 处理器

use crate::{
    auth::middleware::AuthContext,
    error::AppError,
    middleware::AppState,
    models::history::{CreateHistoryRequest, HistoriesQuery, UpdateHistoryRequest},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use super::validate_request;

/// 创建历史记录
pub async fn create_history(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Json(req): Json<CreateHistoryRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_request(&req)?;

    let history = state
        .history_service
        .create(&auth_context.user_id, req)
        .await?;

    Ok((StatusCode::CREATED, Json(history)))
}

/// 分页列出历史记录
pub async fn list_histories(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Query(query): Query<HistoriesQuery>,
) -> Result<impl IntoResponse, AppError> {
    validate_request(&query)?;

    let response = state
        .history_service
        .list(&auth_context.user_id, query)
        .await?;

    Ok(Json(response))
}

/// 获取单条历史记录
pub async fn get_history(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let history = state.history_service.get(&auth_context.user_id, &id).await?;

    Ok(Json(history))
}

/// 更新历史记录
pub async fn update_history(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateHistoryRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_request(&req)?;

    let history = state
        .history_service
        .update(&auth_context.user_id, &id, req)
        .await?;

    Ok(Json(history))
}

/// 删除历史记录
pub async fn delete_history(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    state
        .history_service
        .delete(&auth_context.user_id, &id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
