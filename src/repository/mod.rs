//! 数据访问层

pub mod history_repo;
pub mod user_repo;

pub use history_repo::HistoryRepository;
pub use user_repo::UserRepository;
