//! 表达式引擎入口

use crate::cache::{InMemoryParserCache, ParserCache};
use crate::compiler::Compiler;
use crate::error::{ExpressionError, Result};
use crate::evaluator::Evaluator;
use crate::function::{ExpressionFunction, ExpressionFunctionProvider, FunctionRegistry, Variables};
use crate::node::ParsedExpression;
use crate::parser;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// 表达式引擎
///
/// 持有函数表和解析缓存，可在线程间共享（`Send + Sync`）。
/// 共享同一个缓存的多个引擎实例应注册相同的函数集合。
pub struct ExpressionLanguage {
    functions: FunctionRegistry,
    cache: Arc<dyn ParserCache>,
}

impl ExpressionLanguage {
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> ExpressionLanguageBuilder {
        ExpressionLanguageBuilder::default()
    }

    /// 注册函数，同名函数会被替换
    pub fn register(&mut self, function: ExpressionFunction) {
        self.functions.insert(function.name().to_string(), function);
    }

    pub fn register_provider(&mut self, provider: &dyn ExpressionFunctionProvider) {
        for function in provider.functions() {
            self.register(function);
        }
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// 已注册的函数名（按字母序）
    pub fn function_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// 解析表达式，结果写入缓存
    pub fn parse(&self, expression: &str) -> Result<Arc<ParsedExpression>> {
        if let Some(parsed) = self.cache.get(expression) {
            trace!(expression, "解析缓存命中");
            return Ok(parsed);
        }

        let parsed = Arc::new(parser::parse(expression, &self.functions)?);
        self.cache.insert(expression.to_string(), Arc::clone(&parsed));
        trace!(expression, "表达式已解析");
        Ok(parsed)
    }

    /// 解析并求值
    pub fn evaluate(&self, expression: &str, variables: &Variables) -> Result<Value> {
        let parsed = self.parse(expression)?;
        self.evaluate_parsed(&parsed, variables)
    }

    pub fn evaluate_parsed(&self, parsed: &ParsedExpression, variables: &Variables) -> Result<Value> {
        Evaluator::new(&self.functions, variables).evaluate(parsed.root())
    }

    /// 输出规范化的表达式源码
    pub fn compile(&self, expression: &str) -> Result<String> {
        let parsed = self.parse(expression)?;
        Compiler::new(&self.functions).compile(parsed.root())
    }

    /// 检查语法，并确认引用的变量都在 `names` 中
    pub fn lint(&self, expression: &str, names: &[&str]) -> Result<()> {
        let parsed = self.parse(expression)?;
        match parsed
            .variables()
            .into_iter()
            .find(|variable| !names.contains(&variable.as_str()))
        {
            Some(name) => Err(ExpressionError::UndefinedVariable { name }),
            None => Ok(()),
        }
    }

    /// 缓存中的表达式数量
    pub fn cached_expressions(&self) -> usize {
        self.cache.len()
    }
}

impl Default for ExpressionLanguage {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ExpressionLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpressionLanguage")
            .field("functions", &self.function_names())
            .field("cached_expressions", &self.cache.len())
            .finish()
    }
}

/// 表达式引擎构建器
#[derive(Default)]
pub struct ExpressionLanguageBuilder {
    functions: FunctionRegistry,
    cache: Option<Arc<dyn ParserCache>>,
}

impl ExpressionLanguageBuilder {
    pub fn function(mut self, function: ExpressionFunction) -> Self {
        self.functions.insert(function.name().to_string(), function);
        self
    }

    pub fn provider(mut self, provider: impl ExpressionFunctionProvider) -> Self {
        for function in provider.functions() {
            self = self.function(function);
        }
        self
    }

    pub fn cache(mut self, cache: Arc<dyn ParserCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn build(self) -> ExpressionLanguage {
        ExpressionLanguage {
            functions: self.functions,
            cache: self
                .cache
                .unwrap_or_else(|| Arc::new(InMemoryParserCache::default())),
        }
    }
}
