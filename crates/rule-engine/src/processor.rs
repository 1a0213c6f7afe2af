//! 规则处理流程
//!
//! 信封检查 → 解析规则树 → 编译 → 获取上下文 → 求值。

use crate::compiler::RuleCompiler;
use crate::context::{ContextProvider, ContextRequest};
use crate::error::{Result, RuleError};
use crate::models::{Context, Expression, RuleGroup, has_rules};
use crate::predicates::PredicateRegistry;
use expression_language::{ExpressionLanguage, is_truthy};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// 处理结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessOutcome {
    pub result: bool,
    pub expression: Expression,
    pub context: Context,
}

/// 规则处理器
///
/// 启动时构建一次，所有请求共享。
#[derive(Clone)]
pub struct RuleProcessor {
    compiler: RuleCompiler,
    language: Arc<ExpressionLanguage>,
    contexts: Arc<dyn ContextProvider>,
}

impl RuleProcessor {
    pub fn new(
        compiler: RuleCompiler,
        language: Arc<ExpressionLanguage>,
        contexts: Arc<dyn ContextProvider>,
    ) -> Self {
        Self {
            compiler,
            language,
            contexts,
        }
    }

    /// 使用默认编译选项和内置谓词
    pub fn with_contexts(contexts: Arc<dyn ContextProvider>) -> Self {
        Self::new(
            RuleCompiler::new(),
            Arc::new(PredicateRegistry::language()),
            contexts,
        )
    }

    pub fn compiler(&self) -> &RuleCompiler {
        &self.compiler
    }

    pub fn language(&self) -> &ExpressionLanguage {
        &self.language
    }

    /// 处理一次规则请求
    #[instrument(skip_all, fields(subject = request.subject.as_deref()))]
    pub async fn process(&self, payload: &Value, request: &ContextRequest) -> Result<ProcessOutcome> {
        if !has_rules(payload) {
            warn!("请求体缺少 rules");
            return Err(RuleError::InvalidPayload);
        }

        let group = RuleGroup::from_value(payload)?;
        let expression = self.compiler.compile(&group)?;
        let context = self.contexts.resolve(request).await?;

        debug!(
            fields = ?RuleCompiler::referenced_fields(&group),
            "规则引用的字段"
        );

        let result = self.evaluate(&expression, &context)?;
        info!(expression = %expression, result, "规则处理完成");

        Ok(ProcessOutcome {
            result,
            expression,
            context,
        })
    }

    /// 对编译后的表达式求值，结果按真值规则转换为布尔值
    pub fn evaluate(&self, expression: &Expression, context: &Context) -> Result<bool> {
        let start = Instant::now();
        let outcome = self.language.evaluate(expression.as_str(), context);
        metrics::histogram!("rule_evaluation_duration_seconds")
            .record(start.elapsed().as_secs_f64());

        match outcome {
            Ok(value) => {
                let result = is_truthy(&value);
                metrics::counter!("rule_evaluations_total", "result" => result.to_string())
                    .increment(1);
                Ok(result)
            }
            Err(e) => {
                metrics::counter!("rule_evaluations_total", "result" => "error").increment(1);
                warn!(expression = %expression, error = %e, "表达式求值失败");
                Err(RuleError::Evaluation(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{MockContextProvider, StaticContextProvider};
    use expression_language::ExpressionError;
    use serde_json::json;

    fn processor() -> RuleProcessor {
        RuleProcessor::with_contexts(Arc::new(StaticContextProvider::default()))
    }

    #[tokio::test]
    async fn test_process_returns_expression_and_context() {
        let outcome = processor()
            .process(
                &json!({
                    "condition": "AND",
                    "rules": [
                        {"field": "age", "operator": "greater", "value": 18},
                        {"field": "name", "operator": "begins_with", "value": "Jo"}
                    ]
                }),
                &ContextRequest::new(),
            )
            .await
            .unwrap();

        assert!(outcome.result);
        assert_eq!(
            outcome.expression.as_str(),
            r#"age > "18" && str_starts_with(name, "Jo")"#
        );
        assert_eq!(outcome.context["name"], json!("John Doe"));
    }

    #[tokio::test]
    async fn test_missing_rules_key_is_invalid_payload() {
        let err = processor()
            .process(&json!({"condition": "AND"}), &ContextRequest::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RuleError::InvalidPayload));

        let err = processor()
            .process(&json!({"condition": "AND", "rules": null}), &ContextRequest::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RuleError::InvalidPayload));
    }

    #[tokio::test]
    async fn test_unknown_field_fails_evaluation() {
        let err = processor()
            .process(
                &json!({"condition": "AND", "rules": [{"field": "height", "operator": "greater", "value": 1}]}),
                &ContextRequest::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RuleError::Evaluation(ExpressionError::UndefinedVariable { ref name }) if name == "height"
        ));
    }

    #[tokio::test]
    async fn test_context_not_resolved_for_malformed_tree() {
        let mut contexts = MockContextProvider::new();
        contexts.expect_resolve().times(0);
        let processor = RuleProcessor::with_contexts(Arc::new(contexts));

        let err = processor
            .process(&json!({"condition": "AND", "rules": []}), &ContextRequest::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RuleError::MalformedRule { .. }));
    }

    #[tokio::test]
    async fn test_subject_is_passed_to_provider() {
        let mut contexts = MockContextProvider::new();
        contexts
            .expect_resolve()
            .withf(|request| request.subject.as_deref() == Some("jane"))
            .times(1)
            .returning(|_| Ok(crate::context::sample_context()));
        let processor = RuleProcessor::with_contexts(Arc::new(contexts));

        let outcome = processor
            .process(
                &json!({"condition": "OR", "rules": [{"field": "age", "operator": "equal", "value": "30"}]}),
                &ContextRequest::for_subject("jane"),
            )
            .await
            .unwrap();
        assert!(outcome.result);
    }

    #[tokio::test]
    async fn test_provider_failure_is_propagated() {
        let mut contexts = MockContextProvider::new();
        contexts
            .expect_resolve()
            .returning(|_| Err(RuleError::ContextUnavailable("bob".to_string())));
        let processor = RuleProcessor::with_contexts(Arc::new(contexts));

        let err = processor
            .process(
                &json!({"condition": "AND", "rules": [{"field": "age", "operator": "is_null", "value": null}]}),
                &ContextRequest::for_subject("bob"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RuleError::ContextUnavailable(ref key) if key == "bob"));
    }

    #[test]
    fn test_evaluate_loose_equality() {
        let processor = processor();
        let context = crate::context::sample_context();
        assert!(processor
            .evaluate(&Expression::new(r#"age == "30""#), &context)
            .unwrap());
        assert!(!processor
            .evaluate(&Expression::new(r#"age === "30""#), &context)
            .unwrap());
    }
}
