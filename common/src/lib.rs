//! 数据库巡检服务公共模块
//!
//! 提供所有服务共享的组件：
//! - 数据模型（后端配置、表结构、查询结果）
//! - 统一错误类型
//! - 服务运行配置
//! - 统一响应格式
//! - 请求 ID 中间件
//! - 查询安全闸门

pub mod config;
pub mod errors;
pub mod middleware;
pub mod models;
pub mod response;
pub mod utils;
