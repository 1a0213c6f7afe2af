//! 规则编译器
//!
//! 将查询构建器的规则树递归编译成表达式字符串。嵌套规则组总是加括号，
//! 最外层不加括号。

use crate::error::{Result, RuleError};
use crate::models::{Expression, ROOT_PATH, RuleGroup, RuleLeaf, RuleNode, child_path};
use crate::operators::QueryOperator;
use expression_language::to_string_lossy;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument};

/// 叶子规则值的输出方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiteralStyle {
    /// 兼容模式：单值一律加双引号，列表元素原样输出
    #[default]
    Quoted,
    /// 类型化模式：数字、布尔、null 输出字面量，字符串加引号
    Typed,
}

/// 编译选项
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompilerOptions {
    pub literal_style: LiteralStyle,
    /// 转义引号内的 `\` 与 `"`
    pub escape_strings: bool,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            literal_style: LiteralStyle::Quoted,
            escape_strings: true,
        }
    }
}

/// 规则编译器
#[derive(Debug, Clone, Default)]
pub struct RuleCompiler {
    options: CompilerOptions,
}

impl RuleCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: CompilerOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> CompilerOptions {
        self.options
    }

    /// 编译规则组
    #[instrument(skip_all, fields(condition = %group.condition, rules = group.rules.len()))]
    pub fn compile(&self, group: &RuleGroup) -> Result<Expression> {
        let expression = self.compile_group(group, ROOT_PATH)?;
        metrics::counter!("rule_compilations_total").increment(1);
        debug!(expression = %expression, "规则编译完成");
        Ok(Expression::new(expression))
    }

    /// 解析并编译查询构建器输出
    pub fn compile_value(&self, value: &Value) -> Result<Expression> {
        self.compile(&RuleGroup::from_value(value)?)
    }

    pub fn compile_json(&self, json: &str) -> Result<Expression> {
        self.compile(&RuleGroup::from_json(json)?)
    }

    /// 规则树引用的字段（按出现顺序去重）
    pub fn referenced_fields(group: &RuleGroup) -> Vec<String> {
        let mut fields = Vec::new();
        collect_fields(group, &mut fields);
        fields
    }

    fn compile_group(&self, group: &RuleGroup, path: &str) -> Result<String> {
        if group.rules.is_empty() {
            return Err(RuleError::malformed(path, "规则组不能为空"));
        }

        let parts = group
            .rules
            .iter()
            .enumerate()
            .map(|(i, node)| {
                let node_path = child_path(path, i);
                match node {
                    RuleNode::Group(nested) => self
                        .compile_group(nested, &node_path)
                        .map(|inner| format!("({})", inner)),
                    RuleNode::Leaf(leaf) => self.compile_leaf(leaf, &node_path),
                }
            })
            .collect::<Result<Vec<_>>>()?;

        let separator = format!(" {} ", group.condition.connective());
        Ok(parts.join(&separator))
    }

    fn compile_leaf(&self, leaf: &RuleLeaf, path: &str) -> Result<String> {
        let field = &leaf.field;

        let expression = match &leaf.operator {
            QueryOperator::In => format!("{} in [{}]", field, self.list(leaf, path)?),
            QueryOperator::NotIn => format!("{} not in [{}]", field, self.list(leaf, path)?),
            QueryOperator::Equal => format!("{} == {}", field, self.literal(leaf, path)?),
            QueryOperator::NotEqual => format!("{} != {}", field, self.literal(leaf, path)?),
            QueryOperator::Less => format!("{} < {}", field, self.literal(leaf, path)?),
            QueryOperator::LessOrEqual => format!("{} <= {}", field, self.literal(leaf, path)?),
            QueryOperator::Greater => format!("{} > {}", field, self.literal(leaf, path)?),
            QueryOperator::GreaterOrEqual => format!("{} >= {}", field, self.literal(leaf, path)?),
            QueryOperator::BeginsWith => {
                format!("str_starts_with({}, {})", field, self.literal(leaf, path)?)
            }
            QueryOperator::NotBeginsWith => {
                format!("!str_starts_with({}, {})", field, self.literal(leaf, path)?)
            }
            QueryOperator::Contains => {
                format!("str_contains({}, {})", field, self.literal(leaf, path)?)
            }
            QueryOperator::NotContains => {
                format!("!str_contains({}, {})", field, self.literal(leaf, path)?)
            }
            QueryOperator::EndsWith => {
                format!("str_ends_with({}, {})", field, self.literal(leaf, path)?)
            }
            QueryOperator::NotEndsWith => {
                format!("!str_ends_with({}, {})", field, self.literal(leaf, path)?)
            }
            QueryOperator::IsNull => format!("{} === null", field),
            QueryOperator::IsNotNull => format!("{} !== null", field),
            QueryOperator::IsEmpty => format!("empty({})", field),
            QueryOperator::IsNotEmpty => format!("!empty({})", field),
            QueryOperator::Custom(raw) => {
                debug!(path, operator = %raw, "未知操作符，按原样输出");
                format!("{} {} {}", field, raw, self.literal(leaf, path)?)
            }
        };

        Ok(expression)
    }

    /// 单值字面量
    fn literal(&self, leaf: &RuleLeaf, path: &str) -> Result<String> {
        match self.options.literal_style {
            LiteralStyle::Quoted => {
                let text = scalar_text(&leaf.value).ok_or_else(|| {
                    RuleError::malformed(path, format!("{} 操作符需要标量值", leaf.operator))
                })?;
                Ok(self.quote(&text))
            }
            LiteralStyle::Typed => self.typed_literal(&leaf.value).ok_or_else(|| {
                RuleError::malformed(path, format!("{} 操作符需要标量值", leaf.operator))
            }),
        }
    }

    /// `in` / `not_in` 的列表内容
    fn list(&self, leaf: &RuleLeaf, path: &str) -> Result<String> {
        let Value::Array(items) = &leaf.value else {
            return Err(RuleError::malformed(
                path,
                format!("{} 操作符需要数组值", leaf.operator),
            ));
        };

        let rendered = items
            .iter()
            .map(|item| {
                let text = match self.options.literal_style {
                    LiteralStyle::Quoted => scalar_text(item),
                    LiteralStyle::Typed => self.typed_literal(item),
                };
                text.ok_or_else(|| RuleError::malformed(path, "列表元素必须是标量值"))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(rendered.join(", "))
    }

    fn typed_literal(&self, value: &Value) -> Option<String> {
        match value {
            Value::Null => Some("null".to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Number(n) => Some(n.to_string()),
            Value::String(s) => Some(self.quote(s)),
            Value::Array(_) | Value::Object(_) => None,
        }
    }

    fn quote(&self, text: &str) -> String {
        if self.options.escape_strings {
            format!("\"{}\"", escape(text))
        } else {
            format!("\"{}\"", text)
        }
    }
}

/// 标量的文本形式：数字按原样，true 为 "1"，false 与 null 为空串
fn scalar_text(value: &Value) -> Option<String> {
    to_string_lossy(value)
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '"') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn collect_fields(group: &RuleGroup, fields: &mut Vec<String>) {
    for node in &group.rules {
        match node {
            RuleNode::Group(nested) => collect_fields(nested, fields),
            RuleNode::Leaf(leaf) => {
                if !fields.contains(&leaf.field) {
                    fields.push(leaf.field.clone());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn compile(value: Value) -> Result<String> {
        RuleCompiler::new()
            .compile_value(&value)
            .map(Expression::into_inner)
    }

    fn leaf(field: &str, operator: &str, value: Value) -> Value {
        json!({"field": field, "operator": operator, "value": value})
    }

    #[test]
    fn test_and_group_quotes_values() {
        let expression = compile(json!({
            "condition": "AND",
            "rules": [leaf("age", "greater", json!(18)), leaf("name", "equal", json!("John"))]
        }))
        .unwrap();
        assert_eq!(expression, r#"age > "18" && name == "John""#);
    }

    #[test]
    fn test_in_list_is_unquoted() {
        let expression = compile(json!({
            "condition": "OR",
            "rules": [leaf("age", "in", json!([10, 20, 30]))]
        }))
        .unwrap();
        assert_eq!(expression, "age in [10, 20, 30]");
    }

    #[test]
    fn test_string_predicates() {
        let cases = [
            ("begins_with", r#"str_starts_with(name, "Jo")"#),
            ("not_begins_with", r#"!str_starts_with(name, "Jo")"#),
            ("contains", r#"str_contains(name, "Jo")"#),
            ("not_contains", r#"!str_contains(name, "Jo")"#),
            ("ends_with", r#"str_ends_with(name, "Jo")"#),
            ("not_ends_with", r#"!str_ends_with(name, "Jo")"#),
        ];
        for (operator, expected) in cases {
            let expression = compile(json!({
                "condition": "AND",
                "rules": [leaf("name", operator, json!("Jo"))]
            }))
            .unwrap();
            assert_eq!(expression, expected, "operator {}", operator);
        }
    }

    #[test]
    fn test_value_less_operators() {
        let expression = compile(json!({
            "condition": "or",
            "rules": [
                leaf("name", "is_null", Value::Null),
                leaf("name", "is_not_null", Value::Null),
                leaf("name", "is_empty", Value::Null),
                leaf("name", "is_not_empty", Value::Null)
            ]
        }))
        .unwrap();
        assert_eq!(
            expression,
            "name === null || name !== null || empty(name) || !empty(name)"
        );
    }

    #[test]
    fn test_nested_groups_are_parenthesized() {
        let expression = compile(json!({
            "condition": "AND",
            "rules": [
                leaf("age", "greater_or_equal", json!(18)),
                {"condition": "OR", "rules": [
                    leaf("name", "not_equal", json!("Jane")),
                    {"condition": "AND", "rules": [leaf("birthday", "less", json!("2000-01-01"))]}
                ]}
            ]
        }))
        .unwrap();
        assert_eq!(
            expression,
            r#"age >= "18" && (name != "Jane" || (birthday < "2000-01-01"))"#
        );
    }

    #[test]
    fn test_custom_operator_passthrough() {
        let expression = compile(json!({
            "condition": "AND",
            "rules": [leaf("name", "custom_op", json!("value"))]
        }))
        .unwrap();
        assert_eq!(expression, r#"name custom_op "value""#);
    }

    #[test]
    fn test_compat_scalar_text() {
        let expression = compile(json!({
            "condition": "AND",
            "rules": [
                leaf("a", "equal", json!(true)),
                leaf("b", "equal", json!(false)),
                leaf("c", "in", json!(["x", 1.5, true]))
            ]
        }))
        .unwrap();
        assert_eq!(expression, r#"a == "1" && b == "" && c in [x, 1.5, 1]"#);
    }

    #[test]
    fn test_quotes_are_escaped_by_default() {
        let group = json!({
            "condition": "AND",
            "rules": [leaf("name", "equal", json!(r#"say "hi" \o/"#))]
        });
        assert_eq!(
            compile(group.clone()).unwrap(),
            r#"name == "say \"hi\" \\o/""#
        );

        let legacy = RuleCompiler::with_options(CompilerOptions {
            escape_strings: false,
            ..CompilerOptions::default()
        });
        assert_eq!(
            legacy.compile_value(&group).unwrap().as_str(),
            r#"name == "say "hi" \o/""#
        );
    }

    #[test]
    fn test_typed_literals() {
        let compiler = RuleCompiler::with_options(CompilerOptions {
            literal_style: LiteralStyle::Typed,
            escape_strings: true,
        });
        let expression = compiler
            .compile_value(&json!({
                "condition": "AND",
                "rules": [
                    leaf("age", "greater", json!(18)),
                    leaf("name", "in", json!(["John", "Jane"])),
                    leaf("vip", "equal", json!(true)),
                    leaf("nick", "not_equal", Value::Null)
                ]
            }))
            .unwrap();
        assert_eq!(
            expression.as_str(),
            r#"age > 18 && name in ["John", "Jane"] && vip == true && nick != null"#
        );
    }

    #[test]
    fn test_in_requires_array() {
        let err = compile(json!({
            "condition": "AND",
            "rules": [leaf("age", "in", json!(10))]
        }))
        .unwrap_err();
        assert!(matches!(err, RuleError::MalformedRule { ref path, .. } if path == "rules[0]"));
    }

    #[test]
    fn test_scalar_operator_rejects_array() {
        let err = compile(json!({
            "condition": "AND",
            "rules": [leaf("age", "equal", json!([1]))]
        }))
        .unwrap_err();
        assert!(err.to_string().contains("需要标量值"));
    }

    #[test]
    fn test_empty_group_rejected() {
        let err = compile(json!({
            "condition": "AND",
            "rules": [leaf("a", "equal", json!(1)), {"condition": "OR", "rules": []}]
        }))
        .unwrap_err();
        match err {
            RuleError::MalformedRule { path, reason } => {
                assert_eq!(path, "rules[1]");
                assert!(reason.contains("不能为空"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_compile_is_deterministic() {
        let group = json!({
            "condition": "OR",
            "rules": [leaf("b", "less", json!(1)), leaf("a", "contains", json!("x"))]
        });
        assert_eq!(compile(group.clone()).unwrap(), compile(group).unwrap());
    }

    #[test]
    fn test_referenced_fields() {
        let group = RuleGroup::from_value(&json!({
            "condition": "AND",
            "rules": [
                leaf("age", "greater", json!(1)),
                {"condition": "OR", "rules": [leaf("name", "equal", json!("x")), leaf("age", "less", json!(9))]}
            ]
        }))
        .unwrap();
        assert_eq!(RuleCompiler::referenced_fields(&group), vec!["age", "name"]);
    }

    #[test]
    fn test_compile_json_reports_syntax_error() {
        let err = RuleCompiler::new().compile_json("{not json").unwrap_err();
        assert!(matches!(err, RuleError::Json(_)));
    }
}
