//! 语法树求值

use crate::error::{ExpressionError, Result};
use crate::function::{FunctionRegistry, Variables};
use crate::node::{AccessKind, BinaryOperator, Node, UnaryOperator};
use crate::value::{
    Numeric, as_numeric, compare, is_truthy, loose_eq, strict_eq, to_arithmetic, to_string_lossy,
    type_name,
};
use regex::Regex;
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::cmp::Ordering;

/// 区间操作符 `..` 允许生成的最大元素个数
pub const MAX_RANGE_SIZE: i128 = 100_000;

/// 求值器
///
/// 借用函数表与变量，对同一棵语法树可以重复求值。
pub struct Evaluator<'a> {
    functions: &'a FunctionRegistry,
    variables: &'a Variables,
}

impl<'a> Evaluator<'a> {
    pub fn new(functions: &'a FunctionRegistry, variables: &'a Variables) -> Self {
        Self {
            functions,
            variables,
        }
    }

    pub fn evaluate(&self, node: &Node) -> Result<Value> {
        match node {
            Node::Constant(value) => Ok(value.clone()),
            Node::Name(name) => {
                self.variables
                    .get(name)
                    .cloned()
                    .ok_or_else(|| ExpressionError::UndefinedVariable { name: name.clone() })
            }
            Node::Array(items) => items
                .iter()
                .map(|item| self.evaluate(item))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            Node::Hash(entries) => {
                let mut map = Map::new();
                for (key, value) in entries {
                    map.insert(key.clone(), self.evaluate(value)?);
                }
                Ok(Value::Object(map))
            }
            Node::Unary { operator, node } => self.unary(*operator, node),
            Node::Binary {
                operator,
                left,
                right,
            } => self.binary(*operator, left, right),
            Node::Logical { operator, operands } => self.logical(*operator, operands),
            Node::Conditional {
                condition,
                then,
                otherwise,
            } => {
                if is_truthy(&self.evaluate(condition)?) {
                    self.evaluate(then)
                } else {
                    self.evaluate(otherwise)
                }
            }
            Node::Function { name, arguments } => {
                let function = self
                    .functions
                    .get(name)
                    .ok_or_else(|| ExpressionError::UndefinedFunction { name: name.clone() })?;
                let arguments = arguments
                    .iter()
                    .map(|arg| self.evaluate(arg))
                    .collect::<Result<Vec<_>>>()?;
                function.call(self.variables, &arguments)
            }
            Node::GetAttr {
                node,
                attribute,
                kind,
            } => self.get_attr(node, attribute, *kind),
        }
    }

    fn unary(&self, operator: UnaryOperator, node: &Node) -> Result<Value> {
        let value = self.evaluate(node)?;
        if operator == UnaryOperator::Not {
            return Ok(Value::Bool(!is_truthy(&value)));
        }

        let Some(number) = to_arithmetic(&value) else {
            return Err(ExpressionError::TypeMismatch {
                operator: operator.symbol().to_string(),
                left: type_name(&value).to_string(),
                right: "number".to_string(),
            });
        };

        let result = match (operator, number) {
            (UnaryOperator::Negate, Numeric::Int(i)) => i
                .checked_neg()
                .map(Numeric::Int)
                .unwrap_or(Numeric::Float(-(i as f64))),
            (UnaryOperator::Negate, Numeric::Float(f)) => Numeric::Float(-f),
            (_, n) => n,
        };
        Ok(result.into_value())
    }

    fn binary(&self, operator: BinaryOperator, left: &Node, right: &Node) -> Result<Value> {
        match operator {
            BinaryOperator::Or => {
                if is_truthy(&self.evaluate(left)?) {
                    return Ok(Value::Bool(true));
                }
                Ok(Value::Bool(is_truthy(&self.evaluate(right)?)))
            }
            BinaryOperator::And => {
                if !is_truthy(&self.evaluate(left)?) {
                    return Ok(Value::Bool(false));
                }
                Ok(Value::Bool(is_truthy(&self.evaluate(right)?)))
            }
            BinaryOperator::Coalesce => match self.evaluate(left) {
                Ok(Value::Null)
                | Err(ExpressionError::UndefinedVariable { .. })
                | Err(ExpressionError::NotIndexable { .. }) => self.evaluate(right),
                other => other,
            },
            _ => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                apply(operator, &left, &right)
            }
        }
    }

    /// 逐个求值，`&&` 遇假、`||` 遇真即停止
    fn logical(&self, operator: BinaryOperator, operands: &[Node]) -> Result<Value> {
        let stop_on = operator == BinaryOperator::Or;
        for operand in operands {
            if is_truthy(&self.evaluate(operand)?) == stop_on {
                return Ok(Value::Bool(stop_on));
            }
        }
        Ok(Value::Bool(!stop_on))
    }

    fn get_attr(&self, node: &Node, attribute: &Node, kind: AccessKind) -> Result<Value> {
        let target = self.evaluate(node)?;
        let key = self.evaluate(attribute)?;

        match (&target, kind) {
            (Value::Object(map), _) => {
                let Some(key) = to_string_lossy(&key) else {
                    return Err(not_indexable(&target, &key));
                };
                Ok(map.get(&key).cloned().unwrap_or(Value::Null))
            }
            (Value::Array(items), AccessKind::Index) => match as_numeric(&key) {
                Some(Numeric::Int(index)) => Ok(usize::try_from(index)
                    .ok()
                    .and_then(|i| items.get(i))
                    .cloned()
                    .unwrap_or(Value::Null)),
                _ => Err(not_indexable(&target, &key)),
            },
            _ => Err(not_indexable(&target, &key)),
        }
    }
}

fn not_indexable(target: &Value, key: &Value) -> ExpressionError {
    ExpressionError::NotIndexable {
        target: type_name(target).to_string(),
        member: to_string_lossy(key).unwrap_or_else(|| type_name(key).to_string()),
    }
}

/// 对两个已求值的操作数执行二元运算（不含短路操作符）
fn apply(operator: BinaryOperator, left: &Value, right: &Value) -> Result<Value> {
    let symbol = operator.symbol();
    let value = match operator {
        BinaryOperator::Equal => Value::Bool(loose_eq(left, right)),
        BinaryOperator::NotEqual => Value::Bool(!loose_eq(left, right)),
        BinaryOperator::Identical => Value::Bool(strict_eq(left, right)),
        BinaryOperator::NotIdentical => Value::Bool(!strict_eq(left, right)),
        BinaryOperator::Less => Value::Bool(compare(symbol, left, right)? == Ordering::Less),
        BinaryOperator::Greater => Value::Bool(compare(symbol, left, right)? == Ordering::Greater),
        BinaryOperator::LessOrEqual => {
            Value::Bool(compare(symbol, left, right)? != Ordering::Greater)
        }
        BinaryOperator::GreaterOrEqual => {
            Value::Bool(compare(symbol, left, right)? != Ordering::Less)
        }
        BinaryOperator::In => Value::Bool(contains_strict(symbol, left, right)?),
        BinaryOperator::NotIn => Value::Bool(!contains_strict(symbol, left, right)?),
        BinaryOperator::Matches => {
            let (subject, pattern) = string_operands(symbol, left, right)?;
            Value::Bool(build_regex(&pattern)?.is_match(&subject))
        }
        BinaryOperator::Contains => {
            let (haystack, needle) = string_operands(symbol, left, right)?;
            Value::Bool(haystack.contains(needle.as_str()))
        }
        BinaryOperator::StartsWith => {
            let (haystack, needle) = string_operands(symbol, left, right)?;
            Value::Bool(haystack.starts_with(needle.as_str()))
        }
        BinaryOperator::EndsWith => {
            let (haystack, needle) = string_operands(symbol, left, right)?;
            Value::Bool(haystack.ends_with(needle.as_str()))
        }
        BinaryOperator::Concat => {
            let (a, b) = string_operands(symbol, left, right)?;
            Value::String(a + &b)
        }
        BinaryOperator::Range => range(left, right)?,
        BinaryOperator::BitOr | BinaryOperator::BitXor | BinaryOperator::BitAnd => {
            let (Some(a), Some(b)) = (to_arithmetic(left), to_arithmetic(right)) else {
                return Err(ExpressionError::type_mismatch(symbol, left, right));
            };
            let (a, b) = (truncate(a), truncate(b));
            Value::from(match operator {
                BinaryOperator::BitOr => a | b,
                BinaryOperator::BitXor => a ^ b,
                _ => a & b,
            })
        }
        _ => arithmetic(operator, left, right)?,
    };
    Ok(value)
}

fn truncate(n: Numeric) -> i64 {
    match n {
        Numeric::Int(i) => i,
        Numeric::Float(f) => f as i64,
    }
}

fn arithmetic(operator: BinaryOperator, left: &Value, right: &Value) -> Result<Value> {
    let (Some(a), Some(b)) = (to_arithmetic(left), to_arithmetic(right)) else {
        return Err(ExpressionError::type_mismatch(operator.symbol(), left, right));
    };

    let result = match (operator, a, b) {
        (BinaryOperator::Add, Numeric::Int(x), Numeric::Int(y)) => checked(x.checked_add(y), || {
            x as f64 + y as f64
        }),
        (BinaryOperator::Subtract, Numeric::Int(x), Numeric::Int(y)) => {
            checked(x.checked_sub(y), || x as f64 - y as f64)
        }
        (BinaryOperator::Multiply, Numeric::Int(x), Numeric::Int(y)) => {
            checked(x.checked_mul(y), || x as f64 * y as f64)
        }
        (BinaryOperator::Add, x, y) => Numeric::Float(x.as_f64() + y.as_f64()),
        (BinaryOperator::Subtract, x, y) => Numeric::Float(x.as_f64() - y.as_f64()),
        (BinaryOperator::Multiply, x, y) => Numeric::Float(x.as_f64() * y.as_f64()),
        (BinaryOperator::Divide, _, y) if y.as_f64() == 0.0 => {
            return Err(ExpressionError::DivisionByZero);
        }
        (BinaryOperator::Divide, Numeric::Int(x), Numeric::Int(y))
            if x.checked_rem(y) == Some(0) =>
        {
            checked(x.checked_div(y), || x as f64 / y as f64)
        }
        (BinaryOperator::Divide, x, y) => Numeric::Float(x.as_f64() / y.as_f64()),
        (BinaryOperator::Modulo, x, y) => {
            let (x, y) = (truncate(x), truncate(y));
            if y == 0 {
                return Err(ExpressionError::DivisionByZero);
            }
            Numeric::Int(x.checked_rem(y).unwrap_or(0))
        }
        (BinaryOperator::Power, Numeric::Int(x), Numeric::Int(y)) if y >= 0 => checked(
            u32::try_from(y).ok().and_then(|exp| x.checked_pow(exp)),
            || (x as f64).powf(y as f64),
        ),
        (BinaryOperator::Power, x, y) => Numeric::Float(x.as_f64().powf(y.as_f64())),
        _ => return Err(ExpressionError::type_mismatch(operator.symbol(), left, right)),
    };

    Ok(result.into_value())
}

/// 整数运算溢出时退化为浮点数
fn checked(result: Option<i64>, fallback: impl FnOnce() -> f64) -> Numeric {
    match result {
        Some(i) => Numeric::Int(i),
        None => Numeric::Float(fallback()),
    }
}

fn string_operands(operator: &str, left: &Value, right: &Value) -> Result<(String, String)> {
    match (to_string_lossy(left), to_string_lossy(right)) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => Err(ExpressionError::type_mismatch(operator, left, right)),
    }
}

fn contains_strict(operator: &str, needle: &Value, haystack: &Value) -> Result<bool> {
    match haystack {
        Value::Array(items) => Ok(items.iter().any(|item| strict_eq(needle, item))),
        Value::Object(map) => Ok(map.values().any(|item| strict_eq(needle, item))),
        _ => Err(ExpressionError::type_mismatch(operator, needle, haystack)),
    }
}

fn range(left: &Value, right: &Value) -> Result<Value> {
    let (Some(Numeric::Int(start)), Some(Numeric::Int(end))) = (as_numeric(left), as_numeric(right))
    else {
        return Err(ExpressionError::type_mismatch("..", left, right));
    };

    let size = (i128::from(end) - i128::from(start)).abs() + 1;
    if size > MAX_RANGE_SIZE {
        return Err(ExpressionError::InvalidArgument {
            function: "..".to_string(),
            message: format!("区间包含 {} 个元素，超过上限 {}", size, MAX_RANGE_SIZE),
        });
    }

    let items: Vec<Value> = if start <= end {
        (start..=end).map(Value::from).collect()
    } else {
        (end..=start).rev().map(Value::from).collect()
    };
    Ok(Value::Array(items))
}

/// 编译正则，兼容 `/pattern/flags` 形式的定界符写法
fn build_regex(pattern: &str) -> Result<Regex> {
    Regex::new(&strip_delimiters(pattern))
        .map_err(|e| ExpressionError::InvalidRegex(e.to_string()))
}

fn strip_delimiters(pattern: &str) -> Cow<'_, str> {
    let Some(delimiter) = pattern.chars().next().filter(|c| matches!(c, '/' | '#' | '~')) else {
        return Cow::Borrowed(pattern);
    };
    let Some(end) = pattern.rfind(delimiter).filter(|end| *end > 0) else {
        return Cow::Borrowed(pattern);
    };

    let body = &pattern[1..end];
    let flags = &pattern[end + 1..];
    if !flags.chars().all(|c| matches!(c, 'i' | 'm' | 's' | 'x' | 'u' | 'U')) {
        return Cow::Borrowed(pattern);
    }

    // Rust 正则默认支持 Unicode，忽略 `u`
    let flags: String = flags.chars().filter(|c| *c != 'u').collect();
    if flags.is_empty() {
        Cow::Borrowed(body)
    } else {
        Cow::Owned(format!("(?{}){}", flags, body))
    }
}
