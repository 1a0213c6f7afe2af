//! 求值上下文来源
//!
//! 上下文按请求解析，请求可通过主体键（如 `x-context-key` 请求头）选择记录。

use crate::error::{Result, RuleError};
use crate::models::Context;
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::HashMap;

/// 上下文请求
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextRequest {
    pub subject: Option<String>,
}

impl ContextRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_subject(subject: impl Into<String>) -> Self {
        Self {
            subject: Some(subject.into()),
        }
    }
}

/// 上下文提供者
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContextProvider: Send + Sync {
    async fn resolve(&self, request: &ContextRequest) -> Result<Context>;
}

/// 示例记录：`{name: "John Doe", age: 30, birthday: "1990-01-01"}`
pub fn sample_context() -> Context {
    let mut context = Context::new();
    context.insert("name".to_string(), json!("John Doe"));
    context.insert("age".to_string(), json!(30));
    context.insert("birthday".to_string(), json!("1990-01-01"));
    context
}

/// 固定上下文：忽略请求，总是返回同一条记录
#[derive(Debug, Clone)]
pub struct StaticContextProvider {
    context: Context,
}

impl StaticContextProvider {
    pub fn new(context: Context) -> Self {
        Self { context }
    }
}

impl Default for StaticContextProvider {
    fn default() -> Self {
        Self::new(sample_context())
    }
}

#[async_trait]
impl ContextProvider for StaticContextProvider {
    async fn resolve(&self, _request: &ContextRequest) -> Result<Context> {
        Ok(self.context.clone())
    }
}

/// 按主体键查找上下文，未命中时使用默认记录
///
/// 记录在启动时由配置给出，之后只读。
#[derive(Debug, Clone, Default)]
pub struct KeyedContextProvider {
    subjects: HashMap<String, Context>,
    fallback: Option<Context>,
}

impl KeyedContextProvider {
    pub fn new(subjects: HashMap<String, Context>, fallback: Option<Context>) -> Self {
        Self { subjects, fallback }
    }

    pub fn len(&self) -> usize {
        self.subjects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }
}

#[async_trait]
impl ContextProvider for KeyedContextProvider {
    async fn resolve(&self, request: &ContextRequest) -> Result<Context> {
        if let Some(subject) = &request.subject {
            if let Some(context) = self.subjects.get(subject) {
                return Ok(context.clone());
            }
        }

        match (&self.fallback, &request.subject) {
            (Some(fallback), _) => Ok(fallback.clone()),
            (None, Some(subject)) => Err(RuleError::ContextUnavailable(subject.clone())),
            (None, None) => Err(RuleError::ContextUnavailable("<default>".to_string())),
        }
    }
}

/// 把 JSON 对象转换为上下文
pub fn context_from_value(value: Value) -> Result<Context> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(RuleError::malformed(
            "context",
            format!("上下文必须是 JSON 对象，实际为 {}", other),
        )),
    }
}
