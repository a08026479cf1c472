//! 历史记录服务：按用户隔离的增删改查

use crate::{
    error::AppError,
    models::history::{
        CreateHistoryRequest, HistoriesQuery, History, HistoryListResponse, UpdateHistoryRequest,
    },
    repository::history_repo::HistoryRepository,
};
use sqlx::PgPool;
use uuid::Uuid;

pub struct HistoryService {
    db: PgPool,
}

impl HistoryService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// 创建历史记录
    pub async fn create(
        &self,
        user_id: &Uuid,
        req: CreateHistoryRequest,
    ) -> Result<History, AppError> {
        let repo = HistoryRepository::new(self.db.clone());
        let history = repo.create(user_id, &req).await?;

        tracing::debug!(user_id = %user_id, history_id = %history.id, "History created");

        Ok(history)
    }

    /// 查询单条记录；不存在或属于他人均返回 404
    pub async fn get(&self, user_id: &Uuid, id: &Uuid) -> Result<History, AppError> {
        let repo = HistoryRepository::new(self.db.clone());

        repo.find_by_id(user_id, id)
            .await?
            .ok_or_else(|| AppError::not_found("history entry"))
    }

    /// 分页列出记录
    pub async fn list(
        &self,
        user_id: &Uuid,
        query: HistoriesQuery,
    ) -> Result<HistoryListResponse, AppError> {
        let repo = HistoryRepository::new(self.db.clone());

        let items = repo.list(user_id, query.limit, query.offset()).await?;
        let total = repo.count(user_id).await?;

        Ok(HistoryListResponse {
            items,
            page: query.page,
            limit: query.limit,
            total,
        })
    }

    /// 更新记录
    pub async fn update(
        &self,
        user_id: &Uuid,
        id: &Uuid,
        req: UpdateHistoryRequest,
    ) -> Result<History, AppError> {
        if req.is_empty() {
            return Err(AppError::validation("no fields to update"));
        }

        let repo = HistoryRepository::new(self.db.clone());

        repo.update(user_id, id, &req)
            .await?
            .ok_or_else(|| AppError::not_found("history entry"))
    }

    /// 删除记录
    pub async fn delete(&self, user_id: &Uuid, id: &Uuid) -> Result<(), AppError> {
        let repo = HistoryRepository::new(self.db.clone());

        if repo.delete(user_id, id).await? {
            tracing::debug!(user_id = %user_id, history_id = %id, "History deleted");
            Ok(())
        } else {
            Err(AppError::not_found("history entry"))
        }
    }
}
