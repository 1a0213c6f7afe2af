//! 规则操作符定义

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 查询构建器的条件操作符
///
/// 未知操作符保存在 `Custom` 中，编译时原样输出。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum QueryOperator {
    // 通用比较
    Equal,
    NotEqual,

    // 数值比较
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,

    // 包含检查
    In,
    NotIn,

    // 字符串操作
    BeginsWith,
    NotBeginsWith,
    Contains,
    NotContains,
    EndsWith,
    NotEndsWith,

    // 空值检查
    IsEmpty,
    IsNotEmpty,
    IsNull,
    IsNotNull,

    Custom(String),
}

impl QueryOperator {
    pub fn parse(name: &str) -> Self {
        match name {
            "equal" => Self::Equal,
            "not_equal" => Self::NotEqual,
            "less" => Self::Less,
            "less_or_equal" => Self::LessOrEqual,
            "greater" => Self::Greater,
            "greater_or_equal" => Self::GreaterOrEqual,
            "in" => Self::In,
            "not_in" => Self::NotIn,
            "begins_with" => Self::BeginsWith,
            "not_begins_with" => Self::NotBeginsWith,
            "contains" => Self::Contains,
            "not_contains" => Self::NotContains,
            "ends_with" => Self::EndsWith,
            "not_ends_with" => Self::NotEndsWith,
            "is_empty" => Self::IsEmpty,
            "is_not_empty" => Self::IsNotEmpty,
            "is_null" => Self::IsNull,
            "is_not_null" => Self::IsNotNull,
            other => Self::Custom(other.to_string()),
        }
    }

    /// 查询构建器中的名称
    pub fn name(&self) -> &str {
        match self {
            Self::Equal => "equal",
            Self::NotEqual => "not_equal",
            Self::Less => "less",
            Self::LessOrEqual => "less_or_equal",
            Self::Greater => "greater",
            Self::GreaterOrEqual => "greater_or_equal",
            Self::In => "in",
            Self::NotIn => "not_in",
            Self::BeginsWith => "begins_with",
            Self::NotBeginsWith => "not_begins_with",
            Self::Contains => "contains",
            Self::NotContains => "not_contains",
            Self::EndsWith => "ends_with",
            Self::NotEndsWith => "not_ends_with",
            Self::IsEmpty => "is_empty",
            Self::IsNotEmpty => "is_not_empty",
            Self::IsNull => "is_null",
            Self::IsNotNull => "is_not_null",
            Self::Custom(name) => name,
        }
    }

    /// 值为列表的操作符
    pub fn is_list(&self) -> bool {
        matches!(self, Self::In | Self::NotIn)
    }

    /// 不使用值的操作符
    pub fn ignores_value(&self) -> bool {
        matches!(
            self,
            Self::IsEmpty | Self::IsNotEmpty | Self::IsNull | Self::IsNotNull
        )
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, Self::Custom(_))
    }
}

impl From<String> for QueryOperator {
    fn from(name: String) -> Self {
        match Self::parse(&name) {
            Self::Custom(_) => Self::Custom(name),
            known => known,
        }
    }
}

impl From<QueryOperator> for String {
    fn from(operator: QueryOperator) -> Self {
        match operator {
            QueryOperator::Custom(name) => name,
            known => known.name().to_string(),
        }
    }
}

impl fmt::Display for QueryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 逻辑连接词
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE", try_from = "String")]
pub enum LogicalCondition {
    And,
    Or,
}

impl LogicalCondition {
    /// 表达式中的连接符
    pub fn connective(self) -> &'static str {
        match self {
            Self::And => "&&",
            Self::Or => "||",
        }
    }
}

impl FromStr for LogicalCondition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "AND" => Ok(Self::And),
            "OR" => Ok(Self::Or),
            _ => Err(format!("逻辑条件必须是 AND 或 OR，实际为 \"{}\"", s)),
        }
    }
}

impl TryFrom<String> for LogicalCondition {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for LogicalCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And => write!(f, "AND"),
            Self::Or => write!(f, "OR"),
        }
    }
}
