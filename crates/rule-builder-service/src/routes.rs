//! 路由配置模块

use axum::{
    Router, middleware,
    routing::{get, post},
};
use rule_builder_shared::observability::middleware as obs_middleware;
use tower_http::cors::{Any, CorsLayer};

use crate::{handlers, state::AppState};

/// 构建 API 路由
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/process-rules", post(handlers::process_rules))
        .route("/health", get(handlers::health))
}

/// 构建完整应用：路由 + 跨域 + 可观测性中间件
pub fn app(state: AppState) -> Router {
    // 查询构建器页面可能与服务不同源
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    api_routes()
        .layer(cors)
        .layer(middleware::from_fn(obs_middleware::http_tracing))
        .layer(middleware::from_fn(obs_middleware::request_id))
        .with_state(state)
}
