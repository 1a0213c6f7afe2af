//! 规则树领域模型
//!
//! 规则树来自查询构建器的 JSON 输出：
//!
//! ```json
//! {"condition": "AND", "rules": [
//!     {"id": "age", "field": "age", "type": "integer", "operator": "greater", "value": 18},
//!     {"condition": "OR", "rules": [...]}
//! ]}
//! ```
//!
//! 含有 `rules` 键的条目是规则组，其余为叶子规则。组件附带的 `id`、`type`、
//! `input`、`valid` 等键会被忽略。

use crate::error::{Result, RuleError};
use crate::operators::{LogicalCondition, QueryOperator};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// 求值上下文：字段名到值的平铺映射
pub type Context = Map<String, Value>;

/// 规则组
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value")]
pub struct RuleGroup {
    pub condition: LogicalCondition,
    pub rules: Vec<RuleNode>,
}

impl RuleGroup {
    pub fn new(condition: LogicalCondition, rules: Vec<RuleNode>) -> Self {
        Self { condition, rules }
    }

    pub fn and(rules: Vec<RuleNode>) -> Self {
        Self::new(LogicalCondition::And, rules)
    }

    pub fn or(rules: Vec<RuleNode>) -> Self {
        Self::new(LogicalCondition::Or, rules)
    }

    /// 从查询构建器输出解析规则组，错误信息附带出错位置
    pub fn from_value(value: &Value) -> Result<Self> {
        parse_group(value, ROOT_PATH)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_value(&value)
    }
}

impl TryFrom<Value> for RuleGroup {
    type Error = RuleError;

    fn try_from(value: Value) -> Result<Self> {
        Self::from_value(&value)
    }
}

/// 叶子规则
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleLeaf {
    pub field: String,
    pub operator: QueryOperator,
    pub value: Value,
}

impl RuleLeaf {
    pub fn new(field: impl Into<String>, operator: QueryOperator, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }
}

/// 规则节点（叶子规则或嵌套规则组）
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RuleNode {
    Group(RuleGroup),
    Leaf(RuleLeaf),
}

impl From<RuleGroup> for RuleNode {
    fn from(group: RuleGroup) -> Self {
        Self::Group(group)
    }
}

impl From<RuleLeaf> for RuleNode {
    fn from(leaf: RuleLeaf) -> Self {
        Self::Leaf(leaf)
    }
}

/// 编译后的表达式字符串
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Expression(String);

impl Expression {
    pub fn new(expression: impl Into<String>) -> Self {
        Self(expression.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Expression> for String {
    fn from(expression: Expression) -> Self {
        expression.0
    }
}

impl AsRef<str> for Expression {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

pub(crate) const ROOT_PATH: &str = "root";

/// 子节点路径，如 `rules[1].rules[0]`
pub(crate) fn child_path(parent: &str, index: usize) -> String {
    if parent == ROOT_PATH {
        format!("rules[{}]", index)
    } else {
        format!("{}.rules[{}]", parent, index)
    }
}

/// 条目带有非 null 的 `rules` 键即视为规则组
pub fn has_rules(value: &Value) -> bool {
    !matches!(value.get("rules"), None | Some(Value::Null))
}

fn parse_group(value: &Value, path: &str) -> Result<RuleGroup> {
    let Some(object) = value.as_object() else {
        return Err(RuleError::malformed(path, "规则组必须是 JSON 对象"));
    };

    let condition = match object.get("condition") {
        None => return Err(RuleError::malformed(path, "缺少 condition")),
        Some(Value::String(s)) => s
            .parse::<LogicalCondition>()
            .map_err(|reason| RuleError::malformed(path, reason))?,
        Some(_) => return Err(RuleError::malformed(path, "condition 必须是字符串")),
    };

    let entries = match object.get("rules") {
        None => return Err(RuleError::malformed(path, "缺少 rules")),
        Some(Value::Array(entries)) => entries,
        Some(_) => return Err(RuleError::malformed(path, "rules 必须是数组")),
    };

    let rules = entries
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let entry_path = child_path(path, i);
            if has_rules(entry) {
                parse_group(entry, &entry_path).map(RuleNode::Group)
            } else {
                parse_leaf(entry, &entry_path).map(RuleNode::Leaf)
            }
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(RuleGroup { condition, rules })
}

fn parse_leaf(value: &Value, path: &str) -> Result<RuleLeaf> {
    let Some(object) = value.as_object() else {
        return Err(RuleError::malformed(path, "规则必须是 JSON 对象"));
    };

    let field = match object.get("field") {
        None => return Err(RuleError::malformed(path, "缺少 field")),
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::String(_)) => return Err(RuleError::malformed(path, "field 不能为空")),
        Some(_) => return Err(RuleError::malformed(path, "field 必须是字符串")),
    };

    let operator = match object.get("operator") {
        None => return Err(RuleError::malformed(path, "缺少 operator")),
        Some(Value::String(s)) => QueryOperator::parse(s),
        Some(_) => return Err(RuleError::malformed(path, "operator 必须是字符串")),
    };

    // value 可以为 null（is_null 等操作符），但键必须存在
    let Some(value) = object.get("value") else {
        return Err(RuleError::malformed(path, "缺少 value"));
    };

    Ok(RuleLeaf {
        field,
        operator,
        value: value.clone(),
    })
}
