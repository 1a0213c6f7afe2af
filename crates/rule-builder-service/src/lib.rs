//! 规则构建服务
//!
//! 接收可视化查询构建器提交的规则树，编译成表达式并对上下文求值。
//!
//! ## 模块结构
//!
//! - `dto`: 响应数据结构
//! - `error`: 错误类型与 HTTP 映射
//! - `handlers`: HTTP 请求处理器
//! - `routes`: 路由与中间件
//! - `state`: 应用状态（启动时按配置构建一次）

pub mod dto;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::{Result, ServiceError};
pub use state::AppState;
