//! 业务服务层

pub mod auth_service;
pub mod history_service;

pub use auth_service::AuthService;
pub use history_service::HistoryService;
