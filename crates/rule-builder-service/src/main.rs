//! 规则构建服务
//!
//! 提供 `POST /process-rules`：编译查询构建器规则树并对上下文求值。

use rule_builder_service::{routes, state::AppState};
use rule_builder_shared::{config::AppConfig, observability};
use tokio::net::TcpListener;
use tracing::info;

const SERVICE_NAME: &str = "rule-builder";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load(SERVICE_NAME).unwrap_or_else(|e| {
        eprintln!("Failed to load config, using defaults: {}", e);
        AppConfig {
            service_name: SERVICE_NAME.to_string(),
            ..Default::default()
        }
    });

    let _guard = observability::init(&config.service_name, &config.observability).await?;

    info!(
        environment = %config.environment,
        typed_literals = config.compiler.typed_literals,
        escape_strings = config.compiler.escape_strings,
        "Starting {} on {}",
        config.service_name,
        config.server_addr()
    );

    let state = AppState::from_config(&config);
    let app = routes::app(state);

    let listener = TcpListener::bind(config.server_addr()).await?;
    info!("Listening on {}", config.server_addr());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");

    Ok(())
}

/// 监听关闭信号
///
/// 收到 SIGTERM 或 Ctrl+C 后返回，触发 axum 的优雅关闭流程。
/// 信号处理器注册失败时该分支永不完成。
async fn shutdown_signal() {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, initiating graceful shutdown..."),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown..."),
    }
}
