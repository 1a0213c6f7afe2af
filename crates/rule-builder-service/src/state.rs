//! 应用状态定义

use std::sync::Arc;

use rule_builder_shared::config::{AppConfig, CompilerConfig, ContextConfig};
use rule_engine::{
    CompilerOptions, ContextProvider, KeyedContextProvider, LiteralStyle, PredicateRegistry,
    RuleCompiler, RuleProcessor, StaticContextProvider, sample_context,
};
use tracing::info;

/// Axum 应用共享状态
///
/// 规则处理器在启动时按配置构建一次，通过 Arc 在 handler 间共享
#[derive(Clone)]
pub struct AppState {
    pub processor: Arc<RuleProcessor>,
}

impl AppState {
    pub fn new(processor: RuleProcessor) -> Self {
        Self {
            processor: Arc::new(processor),
        }
    }

    /// 按应用配置构建处理器
    pub fn from_config(config: &AppConfig) -> Self {
        let processor = RuleProcessor::new(
            RuleCompiler::with_options(compiler_options(&config.compiler)),
            Arc::new(PredicateRegistry::language()),
            context_provider(&config.context),
        );
        Self::new(processor)
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

pub fn compiler_options(config: &CompilerConfig) -> CompilerOptions {
    CompilerOptions {
        literal_style: if config.typed_literals {
            LiteralStyle::Typed
        } else {
            LiteralStyle::Quoted
        },
        escape_strings: config.escape_strings,
    }
}

/// 未配置主体记录时使用固定上下文，否则按主体键查找
pub fn context_provider(config: &ContextConfig) -> Arc<dyn ContextProvider> {
    let default = config.default.clone().unwrap_or_else(sample_context);

    if config.subjects.is_empty() {
        info!("Using static evaluation context");
        return Arc::new(StaticContextProvider::new(default));
    }

    info!(
        subjects = config.subjects.len(),
        fallback = config.fallback,
        "Using keyed evaluation context"
    );
    let fallback = config.fallback.then_some(default);
    Arc::new(KeyedContextProvider::new(config.subjects.clone(), fallback))
}
