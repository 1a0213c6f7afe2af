//! HTTP 请求处理器

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::HeaderMap,
};
use rule_engine::ContextRequest;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::dto::ProcessRulesResponse;
use crate::error::{Result, ServiceError};
use crate::state::AppState;

/// 选择上下文记录的请求头
pub const CONTEXT_KEY_HEADER: &str = "x-context-key";

/// 编译并求值规则树
///
/// POST /process-rules
#[instrument(skip_all)]
pub async fn process_rules(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ProcessRulesResponse>> {
    let payload: Value =
        serde_json::from_slice(&body).map_err(|e| ServiceError::InvalidJson(e.to_string()))?;
    if !payload.is_object() {
        return Err(ServiceError::InvalidJson("顶层必须是对象".to_string()));
    }

    let request = context_request(&headers);
    debug!(subject = ?request.subject, "处理规则请求");

    let outcome = state.processor.process(&payload, &request).await?;
    Ok(Json(outcome.into()))
}

/// 存活探针
///
/// GET /health
pub async fn health() -> &'static str {
    "OK"
}

fn context_request(headers: &HeaderMap) -> ContextRequest {
    headers
        .get(CONTEXT_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ContextRequest::for_subject)
        .unwrap_or_default()
}
