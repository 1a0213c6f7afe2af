//! 语法树渲染
//!
//! 将语法树还原为规范化的表达式源码：二元与一元运算全部加括号，
//! 字符串统一使用双引号，函数调用交给各函数自己的编译器渲染。

use crate::error::{ExpressionError, Result};
use crate::function::FunctionRegistry;
use crate::node::{AccessKind, Node};
use serde_json::Value;

pub struct Compiler<'a> {
    functions: &'a FunctionRegistry,
}

impl<'a> Compiler<'a> {
    pub fn new(functions: &'a FunctionRegistry) -> Self {
        Self { functions }
    }

    pub fn compile(&self, node: &Node) -> Result<String> {
        let source = match node {
            Node::Constant(value) => literal(value),
            Node::Name(name) => name.clone(),
            Node::Array(items) => format!("[{}]", self.compile_list(items)?.join(", ")),
            Node::Hash(entries) => {
                let entries = entries
                    .iter()
                    .map(|(key, value)| Ok(format!("{}: {}", quote_string(key), self.compile(value)?)))
                    .collect::<Result<Vec<_>>>()?;
                format!("{{{}}}", entries.join(", "))
            }
            Node::Unary { operator, node } => {
                format!("({}{})", operator.symbol(), self.compile(node)?)
            }
            Node::Binary {
                operator,
                left,
                right,
            } => format!(
                "({} {} {})",
                self.compile(left)?,
                operator.symbol(),
                self.compile(right)?
            ),
            Node::Logical { operator, operands } => {
                let separator = format!(" {} ", operator.symbol());
                format!("({})", self.compile_list(operands)?.join(&separator))
            }
            Node::Conditional {
                condition,
                then,
                otherwise,
            } => format!(
                "({} ? {} : {})",
                self.compile(condition)?,
                self.compile(then)?,
                self.compile(otherwise)?
            ),
            Node::Function { name, arguments } => {
                let function = self
                    .functions
                    .get(name)
                    .ok_or_else(|| ExpressionError::UndefinedFunction { name: name.clone() })?;
                function.compile(&self.compile_list(arguments)?)
            }
            Node::GetAttr {
                node,
                attribute,
                kind,
            } => match (kind, attribute.as_ref()) {
                (AccessKind::Property, Node::Constant(Value::String(name))) => {
                    format!("{}.{}", self.compile(node)?, name)
                }
                _ => format!("{}[{}]", self.compile(node)?, self.compile(attribute)?),
            },
        };
        Ok(source)
    }

    fn compile_list(&self, nodes: &[Node]) -> Result<Vec<String>> {
        nodes.iter().map(|node| self.compile(node)).collect()
    }
}

/// 渲染常量
pub fn literal(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => quote_string(s),
        Value::Array(items) => format!(
            "[{}]",
            items.iter().map(literal).collect::<Vec<_>>().join(", ")
        ),
        Value::Object(map) => format!(
            "{{{}}}",
            map.iter()
                .map(|(k, v)| format!("{}: {}", quote_string(k), literal(v)))
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}

/// 双引号字符串字面量，转义结果可被词法分析器还原
pub fn quote_string(s: &str) -> String {
    let mut quoted = String::with_capacity(s.len() + 2);
    quoted.push('"');
    for c in s.chars() {
        match c {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            '\t' => quoted.push_str("\\t"),
            '\r' => quoted.push_str("\\r"),
            '\0' => quoted.push_str("\\0"),
            other => quoted.push(other),
        }
    }
    quoted.push('"');
    quoted
}
