//! 路由注册
//! 创建所有 API 路由并应用中间件

use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    limit::RequestBodyLimitLayer,
};

use crate::{
    auth::token::TokenService,
    config::AppConfig,
    handlers,
    middleware::{AppState, IpRateLimiter, RateLimitConfig},
    services::{AuthService, HistoryService},
};

/// 创建应用路由
pub fn create_router(config: AppConfig, db: sqlx::PgPool) -> Router {
    // 创建所有服务
    let token_service = Arc::new(TokenService::from_config(&config));

    let auth_service = Arc::new(AuthService::new(
        db.clone(),
        token_service.clone(),
        Arc::new(config.clone()),
    ));

    let history_service = Arc::new(HistoryService::new(db.clone()));

    let rate_limiter = Arc::new(IpRateLimiter::new(RateLimitConfig::from_config(&config)));

    let cors = cors_layer(&config);

    let state = Arc::new(AppState {
        config,
        db,
        token_service: token_service.clone(),
        auth_service,
        history_service,
        rate_limiter,
    });

    // 公开端点（健康检查）
    let public_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness_check));

    // 认证路由（无需令牌，应用登录限流）
    let auth_routes = Router::new()
        .route("/api/v1/auth/register", post(handlers::auth::register))
        .route("/api/v1/auth/login", post(handlers::auth::login))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            crate::middleware::login_rate_limit_middleware,
        ));

    // 需要认证的路由
    let authenticated_routes = Router::new()
        .route("/api/v1/auth/me", get(handlers::auth::get_current_user))
        .route(
            "/api/v1/histories",
            get(handlers::history::list_histories).post(handlers::history::create_history),
        )
        .route(
            "/api/v1/histories/{id}",
            get(handlers::history::get_history)
                .put(handlers::history::update_history)
                .delete(handlers::history::delete_history),
        )
        .layer(axum::middleware::from_fn_with_state(
            token_service,
            crate::auth::middleware::token_auth_middleware,
        ));

    // 组合所有路由
    Router::new()
        .merge(public_routes)
        .merge(auth_routes)
        .merge(authenticated_routes)
        .layer(cors)
        .layer(CompressionLayer::new())
        // 请求体上限 1 MiB，足够容纳最长的合成文本
        .layer(RequestBodyLimitLayer::new(1024 * 1024))
        .layer(axum::middleware::from_fn(
            crate::middleware::request_tracking_middleware,
        ))
        .with_state(state)
}

/// CORS 层；未配置来源时放开（开发模式）
fn cors_layer(config: &AppConfig) -> CorsLayer {
    match &config.server.allowed_origins {
        Some(origins) => {
            let origins: Vec<HeaderValue> =
                origins.iter().filter_map(|o| o.parse().ok()).collect();
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PUT,
                    Method::DELETE,
                    Method::OPTIONS,
                ])
                .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        }
        None => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    }
}
