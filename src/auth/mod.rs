//! 认证模块：令牌、口令散列与请求中间件

pub mod middleware;
pub mod password;
pub mod token;

pub use middleware::{extract_token, token_auth_middleware, AuthContext};
pub use password::{compare_password, hash_password, PasswordError};
pub use token::{TokenError, TokenService, UserIdentity};
