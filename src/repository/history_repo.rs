//! History repository (数据库访问层)
//!
//! 所有查询都按 user_id 限定，调用方无法读写他人的记录。

use crate::{
    error::AppError,
    models::history::{CreateHistoryRequest, History, UpdateHistoryRequest},
};
use sqlx::PgPool;
use uuid::Uuid;

pub struct HistoryRepository {
    db: PgPool,
}

impl HistoryRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// 创建历史记录
    pub async fn create(
        &self,
        user_id: &Uuid,
        req: &CreateHistoryRequest,
    ) -> Result<History, AppError> {
        let history = sqlx::query_as::<_, History>(
            r#"
            INSERT INTO histories (id, user_id, text, voice, rate, pitch, volume)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(user_id)
        .bind(&req.text)
        .bind(&req.voice)
        .bind(req.rate)
        .bind(req.pitch)
        .bind(req.volume)
        .fetch_one(&self.db)
        .await?;

        Ok(history)
    }

    /// 根据 ID 查找属于指定用户的记录
    pub async fn find_by_id(
        &self,
        user_id: &Uuid,
        id: &Uuid,
    ) -> Result<Option<History>, AppError> {
        let history = sqlx::query_as::<_, History>(
            "SELECT * FROM histories WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(history)
    }

    /// 分页列出用户的历史记录，按创建时间倒序
    pub async fn list(
        &self,
        user_id: &Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<History>, AppError> {
        let items = sqlx::query_as::<_, History>(
            r#"
            SELECT * FROM histories
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await?;

        Ok(items)
    }

    /// 用户的记录总数
    pub async fn count(&self, user_id: &Uuid) -> Result<i64, AppError> {
        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM histories WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.db)
            .await?;

        Ok(total.0)
    }

    /// 更新记录；缺省字段保持原值
    pub async fn update(
        &self,
        user_id: &Uuid,
        id: &Uuid,
        req: &UpdateHistoryRequest,
    ) -> Result<Option<History>, AppError> {
        let history = sqlx::query_as::<_, History>(
            r#"
            UPDATE histories
            SET
                text = COALESCE($3, text),
                voice = COALESCE($4, voice),
                rate = COALESCE($5, rate),
                pitch = COALESCE($6, pitch),
                volume = COALESCE($7, volume),
                updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(&req.text)
        .bind(&req.voice)
        .bind(req.rate)
        .bind(req.pitch)
        .bind(req.volume)
        .fetch_optional(&self.db)
        .await?;

        Ok(history)
    }

    /// 删除记录，返回是否存在
    pub async fn delete(&self, user_id: &Uuid, id: &Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM histories WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
