//! 规则引擎错误类型

use expression_language::ExpressionError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("Invalid rules payload.")]
    InvalidPayload,

    #[error("规则结构错误 ({path}): {reason}")]
    MalformedRule { path: String, reason: String },

    #[error("表达式求值失败: {0}")]
    Evaluation(#[from] ExpressionError),

    #[error("上下文不存在: {0}")]
    ContextUnavailable(String),

    #[error("JSON 序列化错误: {0}")]
    Json(#[from] serde_json::Error),
}

impl RuleError {
    pub(crate) fn malformed(path: &str, reason: impl Into<String>) -> Self {
        Self::MalformedRule {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RuleError>;
