//! 查询构建器规则引擎
//!
//! 把可视化查询构建器产出的规则树编译成表达式并求值：
//! - 规则树解析与结构校验
//! - 规则编译（兼容模式 / 类型化字面量）
//! - 谓词函数注册
//! - 可注入的上下文来源

pub mod compiler;
pub mod context;
pub mod error;
pub mod models;
pub mod operators;
pub mod predicates;
pub mod processor;

pub use compiler::{CompilerOptions, LiteralStyle, RuleCompiler};
pub use context::{
    ContextProvider, ContextRequest, KeyedContextProvider, StaticContextProvider,
    context_from_value, sample_context,
};
pub use error::{Result, RuleError};
pub use models::{Context, Expression, RuleGroup, RuleLeaf, RuleNode};
pub use operators::{LogicalCondition, QueryOperator};
pub use predicates::PredicateRegistry;
pub use processor::{ProcessOutcome, RuleProcessor};
