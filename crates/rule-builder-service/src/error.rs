//! 服务错误类型定义

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use rule_engine::RuleError;

use crate::dto::ErrorResponse;

/// 服务错误类型
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("请求体不是合法的 JSON 对象: {0}")]
    InvalidJson(String),
    #[error("Invalid rules payload.")]
    InvalidPayload,
    #[error("规则结构错误 ({path}): {reason}")]
    MalformedRule { path: String, reason: String },
    #[error("表达式求值失败: {0}")]
    Evaluation(String),
    #[error("上下文不存在: {0}")]
    ContextNotFound(String),
    #[error("内部错误: {0}")]
    Internal(String),
}

impl ServiceError {
    /// 返回对应的 HTTP 状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidJson(_) | Self::InvalidPayload => StatusCode::BAD_REQUEST,
            Self::MalformedRule { .. } | Self::Evaluation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::ContextNotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 返回错误码（用于 API 响应）
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidJson(_) => "INVALID_JSON",
            Self::InvalidPayload => "INVALID_PAYLOAD",
            Self::MalformedRule { .. } => "MALFORMED_RULE",
            Self::Evaluation(_) => "EVALUATION_FAILED",
            Self::ContextNotFound(_) => "CONTEXT_NOT_FOUND",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // 内部错误只返回通用提示，详细信息仅记录日志
        let message = match &self {
            Self::Internal(e) => {
                tracing::error!(error = %e, "内部错误");
                "服务内部错误，请稍后重试".to_string()
            }
            other => other.to_string(),
        };

        (status, axum::Json(ErrorResponse::new(self.error_code(), message))).into_response()
    }
}

impl From<RuleError> for ServiceError {
    fn from(err: RuleError) -> Self {
        match err {
            RuleError::InvalidPayload => Self::InvalidPayload,
            RuleError::MalformedRule { path, reason } => Self::MalformedRule { path, reason },
            RuleError::Evaluation(e) => Self::Evaluation(e.to_string()),
            RuleError::ContextUnavailable(key) => Self::ContextNotFound(key),
            RuleError::Json(e) => Self::InvalidJson(e.to_string()),
        }
    }
}

/// 服务层 Result 类型别名
pub type Result<T> = std::result::Result<T, ServiceError>;
