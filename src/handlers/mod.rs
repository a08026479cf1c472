//! HTTP 处理器模块

pub mod auth;
pub mod health;
pub mod history;

use crate::error::AppError;
use validator::Validate;

/// 校验请求体，错误时拼接字段消息
pub(crate) fn validate_request<T: Validate>(req: &T) -> Result<(), AppError> {
    req.validate().map_err(|e| {
        let detail = e
            .field_errors()
            .into_iter()
            .flat_map(|(_, errors)| errors.iter())
            .filter_map(|err| err.message.as_ref().map(|m| m.to_string()))
            .collect::<Vec<_>>()
            .join("; ");

        if detail.is_empty() {
            AppError::validation("request validation failed")
        } else {
            AppError::validation(detail)
        }
    })
}
