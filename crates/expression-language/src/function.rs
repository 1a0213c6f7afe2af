//! 自定义函数注册
//!
//! 每个函数由两部分组成：编译期表示（把参数源码渲染成调用源码）
//! 和运行期实现（对求值后的参数计算结果）。

use crate::error::Result;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// 求值时可见的变量
pub type Variables = Map<String, Value>;

/// 按名称索引的函数表
pub type FunctionRegistry = HashMap<String, ExpressionFunction>;

type CompilerFn = dyn Fn(&[String]) -> String + Send + Sync;
type EvaluatorFn = dyn Fn(&Variables, &[Value]) -> Result<Value> + Send + Sync;

/// 表达式函数
#[derive(Clone)]
pub struct ExpressionFunction {
    name: String,
    compiler: Arc<CompilerFn>,
    evaluator: Arc<EvaluatorFn>,
}

impl ExpressionFunction {
    pub fn new<C, E>(name: impl Into<String>, compiler: C, evaluator: E) -> Self
    where
        C: Fn(&[String]) -> String + Send + Sync + 'static,
        E: Fn(&Variables, &[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            compiler: Arc::new(compiler),
            evaluator: Arc::new(evaluator),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 渲染调用的源码形式
    pub fn compile(&self, arguments: &[String]) -> String {
        (self.compiler)(arguments)
    }

    /// 执行函数
    pub fn call(&self, variables: &Variables, arguments: &[Value]) -> Result<Value> {
        (self.evaluator)(variables, arguments)
    }
}

impl fmt::Debug for ExpressionFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpressionFunction")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// 函数提供者：批量向表达式引擎注册函数
pub trait ExpressionFunctionProvider {
    fn functions(&self) -> Vec<ExpressionFunction>;
}
