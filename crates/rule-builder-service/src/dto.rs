//! 响应数据结构

use rule_engine::{Context, Expression, ProcessOutcome};
use serde::Serialize;
use serde_json::Value;

/// `POST /process-rules` 成功响应
#[derive(Debug, Clone, Serialize)]
pub struct ProcessRulesResponse {
    pub result: bool,
    pub expression: Expression,
    pub context: Context,
}

impl From<ProcessOutcome> for ProcessRulesResponse {
    fn from(outcome: ProcessOutcome) -> Self {
        Self {
            result: outcome.result,
            expression: outcome.expression,
            context: outcome.context,
        }
    }
}

/// 错误响应
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub code: &'static str,
    pub message: String,
    pub data: Value,
}

impl ErrorResponse {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            success: false,
            code,
            message: message.into(),
            data: Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_response_shape() {
        let body = serde_json::to_value(ErrorResponse::new("INVALID_PAYLOAD", "Invalid rules payload."))
            .unwrap();
        assert_eq!(
            body,
            json!({
                "success": false,
                "code": "INVALID_PAYLOAD",
                "message": "Invalid rules payload.",
                "data": null
            })
        );
    }

    #[test]
    fn test_process_response_keys() {
        let response = ProcessRulesResponse::from(ProcessOutcome {
            result: true,
            expression: Expression::new("age > \"18\""),
            context: rule_engine::sample_context(),
        });
        let body = serde_json::to_value(response).unwrap();
        assert_eq!(body["result"], json!(true));
        assert_eq!(body["expression"], json!("age > \"18\""));
        assert_eq!(body["context"]["name"], json!("John Doe"));
    }
}
