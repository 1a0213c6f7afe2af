//! 表达式语言
//!
//! 轻量的表达式解析与求值引擎：
//! - 逻辑、比较、算术、字符串与成员访问操作符
//! - 可注册的自定义函数（编译期表示 + 运行期实现）
//! - 线程安全的解析缓存
//!
//! ```
//! use expression_language::{ExpressionLanguage, Variables};
//! use serde_json::json;
//!
//! let language = ExpressionLanguage::new();
//! let variables: Variables = json!({"age": 30}).as_object().cloned().unwrap();
//! assert_eq!(language.evaluate("age >= 18", &variables).unwrap(), json!(true));
//! ```

pub mod cache;
pub mod compiler;
pub mod error;
pub mod evaluator;
pub mod function;
pub mod language;
pub mod lexer;
pub mod node;
pub mod parser;
pub mod value;

pub use cache::{InMemoryParserCache, NoopParserCache, ParserCache};
pub use compiler::{literal, quote_string};
pub use error::{ExpressionError, Result};
pub use function::{ExpressionFunction, ExpressionFunctionProvider, FunctionRegistry, Variables};
pub use language::{ExpressionLanguage, ExpressionLanguageBuilder};
pub use node::{Node, ParsedExpression};
pub use value::{is_truthy, to_string_lossy};
