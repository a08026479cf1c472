//! 认证服务：注册、登录、当前用户

use crate::{
    auth::password::{compare_password, hash_password},
    auth::token::TokenService,
    config::AppConfig,
    error::AppError,
    models::user::{LoginRequest, LoginResponse, RegisterRequest, User, UserResponse},
    repository::user_repo::UserRepository,
};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

pub struct AuthService {
    db: PgPool,
    token_service: Arc<TokenService>,
    config: Arc<AppConfig>,
}

impl AuthService {
    pub fn new(db: PgPool, token_service: Arc<TokenService>, config: Arc<AppConfig>) -> Self {
        Self {
            db,
            token_service,
            config,
        }
    }

    /// 用户注册
    pub async fn register(&self, req: RegisterRequest) -> Result<UserResponse, AppError> {
        let min_len = self.config.security.password_min_length;
        if req.password.chars().count() < min_len {
            return Err(AppError::validation(format!(
                "password must be at least {} characters",
                min_len
            )));
        }

        let password_hash = hash_password(&req.password).map_err(|e| {
            tracing::error!("Password hashing failed: {}", e);
            AppError::internal_error("failed to process registration")
        })?;

        let user_repo = UserRepository::new(self.db.clone());
        let user = user_repo
            .create(&req.name, &req.email, &password_hash)
            .await?;

        tracing::info!(user_id = %user.id, "User registered");

        Ok(UserResponse::from(user))
    }

    /// 用户登录
    ///
    /// 用户不存在与口令错误对客户端不可区分，统一返回 401。
    pub async fn login(&self, req: LoginRequest) -> Result<LoginResponse, AppError> {
        let user_repo = UserRepository::new(self.db.clone());

        let user: User = user_repo.find_by_email(&req.email).await?.ok_or_else(|| {
            tracing::debug!("Login failed: unknown email");
            AppError::Unauthorized
        })?;

        compare_password(&req.password, &user.password_hash).map_err(|e| {
            tracing::debug!(user_id = %user.id, "Login failed: {}", e);
            AppError::Unauthorized
        })?;

        let access_token = self
            .token_service
            .issue(&user.id, &user.email)
            .map_err(|e| {
                tracing::error!("Token issuance failed: {}", e);
                AppError::internal_error("failed to issue token")
            })?;

        tracing::info!(user_id = %user.id, "User logged in");

        Ok(LoginResponse {
            access_token,
            expires_in: self.config.security.token_exp_secs,
            user: UserResponse::from(user),
        })
    }

    /// 当前用户信息
    pub async fn current_user(&self, user_id: &Uuid) -> Result<UserResponse, AppError> {
        let user_repo = UserRepository::new(self.db.clone());

        let user = user_repo
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::not_found("user"))?;

        Ok(UserResponse::from(user))
    }
}
