//! 数据模型模块

pub mod history;
pub mod user;
