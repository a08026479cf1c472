//! HTTP 中间件
//! 请求追踪、登录限流

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;
use std::collections::VecDeque;
use std::net::IpAddr;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Instrument;
use uuid::Uuid;

/// 应用状态
///
/// AppState 内部使用 Arc 包装服务,这样:
/// 1. 多个请求可以共享服务实例
/// 2. 服务可以包含内部的可变状态(如果需要)
/// 3. Clone 成本低廉(Arc 是指针拷贝)
///
#[derive(Clone)]
pub struct AppState {
    pub config: crate::config::AppConfig,
    pub db: sqlx::PgPool,
    // 服务使用 Arc 包装,因为服务内部可能包含 Arc 或其他共享状态
    pub token_service: Arc<crate::auth::token::TokenService>,
    pub auth_service: Arc<crate::services::AuthService>,
    pub history_service: Arc<crate::services::HistoryService>,
    /// 登录接口 IP 限流器
    pub rate_limiter: Arc<IpRateLimiter>,
}

/// 请求追踪中间件
/// 为每个请求生成 trace_id 和 request_id，并记录指标
pub async fn request_tracking_middleware(req: Request, next: Next) -> Response {
    let trace_id = extract_or_generate_trace_id(req.headers());
    let request_id = Uuid::new_v4().to_string();

    let method = req.method().to_string();
    let uri = req.uri().to_string();

    let span = tracing::info_span!(
        "http_request",
        trace_id = %trace_id,
        request_id = %request_id,
        method = %method,
        uri = %uri,
    );

    async move {
        let start = Instant::now();

        let response = next.run(req).await;

        let elapsed = start.elapsed();
        let status = response.status().as_u16();

        let method_name = match method.as_str() {
            "GET" => "GET",
            "POST" => "POST",
            "PUT" => "PUT",
            "DELETE" => "DELETE",
            "PATCH" => "PATCH",
            _ => "UNKNOWN",
        };
        let status_code = match status {
            200 => "200",
            201 => "201",
            204 => "204",
            400 => "400",
            401 => "401",
            404 => "404",
            409 => "409",
            429 => "429",
            500 => "500",
            _ => "other",
        };

        metrics::counter!("http_requests_total", "method" => method_name, "status" => status_code)
            .increment(1);
        metrics::histogram!("http_request_duration_seconds").record(elapsed.as_secs_f64());

        tracing::info!(
            method = %method,
            uri = %uri,
            status = status,
            elapsed_ms = elapsed.as_millis(),
            "Request completed"
        );

        let mut response = response;
        if let Ok(value) = trace_id.parse() {
            response.headers_mut().insert("x-trace-id", value);
        }
        if let Ok(value) = request_id.parse() {
            response.headers_mut().insert("x-request-id", value);
        }

        response
    }
    .instrument(span)
    .await
}

/// 从请求头中提取或生成 trace_id
fn extract_or_generate_trace_id(headers: &HeaderMap) -> String {
    headers
        .get("x-trace-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// 登录限流中间件，仅挂在认证路由上
pub async fn login_rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, crate::error::AppError> {
    let client_ip = get_client_ip(&req, state.config.security.trust_proxy);

    state.rate_limiter.cleanup_expired();

    if !state.rate_limiter.check_login_rate_limit(&client_ip) {
        tracing::warn!(client_ip = %client_ip, "Login rate limit exceeded");
        return Err(crate::error::AppError::RateLimitExceeded);
    }

    Ok(next.run(req).await)
}

/// 获取客户端 IP 地址
fn get_client_ip(req: &Request, trust_proxy: bool) -> IpAddr {
    let headers = req.headers();

    // 如果信任代理，从 X-Forwarded-For 取第一个 IP
    if trust_proxy {
        if let Some(ip) = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next())
            .and_then(|s| s.trim().parse().ok())
        {
            return ip;
        }

        if let Some(ip) = headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok())
        {
            return ip;
        }
    }

    if let Some(ip) = req.extensions().get::<IpAddr>() {
        return *ip;
    }

    // 无法获取真实 IP，回退到回环地址
    IpAddr::V4(std::net::Ipv4Addr::new(127, 0, 0, 1))
}

// ==================== 限流服务 ====================

/// 限流配置
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// 登录接口：时间窗口内的最大请求数
    pub login_max_requests: NonZeroU32,
    /// 登录接口：时间窗口（秒）
    pub login_window_secs: NonZeroU32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            login_max_requests: NonZeroU32::new(10).unwrap(), // 10请求/5分钟
            login_window_secs: NonZeroU32::new(300).unwrap(),
        }
    }
}

impl RateLimitConfig {
    /// 从应用配置构造；配置校验已保证取值非零
    pub fn from_config(config: &crate::config::AppConfig) -> Self {
        Self {
            login_max_requests: NonZeroU32::new(config.security.login_rate_limit_max)
                .unwrap_or(NonZeroU32::MIN),
            login_window_secs: NonZeroU32::new(config.security.login_rate_limit_window_secs)
                .unwrap_or(NonZeroU32::MIN),
        }
    }
}

/// IP 级别的速率限制器
/// 使用滑动窗口算法实现
#[derive(Clone)]
pub struct IpRateLimiter {
    /// 每个 IP 地址的请求记录
    limiters: Arc<DashMap<IpAddr, Arc<IpLimiterState>>>,
    config: RateLimitConfig,
}

/// 单个 IP 的限流状态
struct IpLimiterState {
    /// 请求时间戳队列（滑动窗口）
    requests: std::sync::Mutex<VecDeque<Instant>>,
    window_duration: Duration,
    max_requests: usize,
}

impl IpRateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            limiters: Arc::new(DashMap::new()),
            config,
        }
    }

    /// 检查登录请求是否在限流窗口内
    pub fn check_login_rate_limit(&self, ip: &IpAddr) -> bool {
        let limiter = self.get_or_create_limiter(
            ip,
            self.config.login_max_requests.get() as usize,
            self.config.login_window_secs.get() as u64,
        );
        limiter.check()
    }

    fn get_or_create_limiter(
        &self,
        ip: &IpAddr,
        max_requests: usize,
        window_secs: u64,
    ) -> Arc<IpLimiterState> {
        self.limiters
            .entry(*ip)
            .or_insert_with(|| {
                Arc::new(IpLimiterState {
                    requests: std::sync::Mutex::new(VecDeque::new()),
                    window_duration: Duration::from_secs(window_secs),
                    max_requests,
                })
            })
            .clone()
    }

    /// 有界清理，防止长期运行时无限增长
    pub fn cleanup_expired(&self) {
        if self.limiters.len() > 10000 {
            let keys: Vec<_> = self.limiters.iter().take(5000).map(|e| *e.key()).collect();
            for key in keys {
                self.limiters.remove(&key);
            }
        }
    }
}

impl IpLimiterState {
    fn check(&self) -> bool {
        let mut requests = self.requests.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();

        // 清理过期的请求记录
        while let Some(&front) = requests.front() {
            if now.duration_since(front) < self.window_duration {
                break;
            }
            requests.pop_front();
        }

        if requests.len() < self.max_requests {
            requests.push_back(now);
            true
        } else {
            false
        }
    }
}
