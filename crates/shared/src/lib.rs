//! 共享库
//!
//! 包含各服务共用的分层配置加载与可观测性（日志、指标、HTTP 中间件）基础设施。

pub mod config;
pub mod observability;
